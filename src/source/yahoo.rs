use std::sync::Arc;

use chrono::DateTime;
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::SourcesConfig;
use crate::error::SourceError;
use crate::model::{Candle, ForexPair, SourceKind, TimeFrame};
use crate::source::{MarketDataSource, http_client};

const PROVIDER: &str = "yahoo";

/// Yahoo Finance chart API. FX tickers take the form `EURUSD=X`.
pub struct YahooSource {
    client: reqwest::Client,
    base_url: String,
    /// Fixed chart range; derived from the timeframe when unset.
    range: Option<String>,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl YahooSource {
    pub fn new(config: &SourcesConfig) -> Result<Self, Report<SourceError>> {
        // The chart endpoint is unauthenticated and throttles aggressively.
        let quota = Quota::per_second(nonzero!(2u32));
        Ok(Self {
            client: http_client(config, SourceKind::Yahoo)?,
            base_url: config.yahoo_base_url.trim_end_matches('/').to_owned(),
            range: config.yahoo_range.clone(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }
}

impl MarketDataSource for YahooSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Yahoo
    }

    fn fetch_candles(
        &self,
        pair: &ForexPair,
        timeframe: TimeFrame,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Candle>, Report<SourceError>>> {
        let symbol = pair.yahoo_symbol();
        Box::pin(async move {
            self.rate_limiter.until_ready().await;

            let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
            let params = [
                ("interval", timeframe.interval()),
                ("range", self.range.as_deref().unwrap_or(default_range(timeframe))),
            ];

            let response = self
                .client
                .get(&url)
                .query(&params)
                .send()
                .await
                .change_context(SourceError::Request {
                    provider: PROVIDER.into(),
                })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(Report::new(SourceError::RateLimit {
                    provider: PROVIDER.into(),
                }));
            }

            // Unknown tickers come back as 404 with a `chart.error` body, so the
            // body is read before the status is judged.
            let body = response.text().await.change_context(SourceError::Request {
                provider: PROVIDER.into(),
            })?;

            let candles = read_chart(status, &body, &symbol, limit)?;

            info!(
                symbol = %symbol,
                timeframe = %timeframe,
                fetched = candles.len(),
                "yahoo candle fetch complete"
            );

            Ok(candles)
        })
    }
}

/// Chart range wide enough to hold a full candle set at `timeframe`.
fn default_range(timeframe: TimeFrame) -> &'static str {
    match timeframe {
        TimeFrame::Min1 => "1d",
        TimeFrame::Min5 | TimeFrame::Min15 => "5d",
        TimeFrame::Min30 | TimeFrame::Hour1 => "1mo",
        TimeFrame::Day1 => "1y",
    }
}

/// Judge a chart response by its body first and its HTTP status second.
///
/// A `chart.error` payload stays `NoData` whatever the status; an unreadable
/// body on a failed status is reported as a failed request.
fn read_chart(
    status: StatusCode,
    body: &str,
    symbol: &str,
    limit: usize,
) -> Result<Vec<Candle>, Report<SourceError>> {
    match parse_chart(body, symbol, limit) {
        Ok(candles) => Ok(candles),
        Err(report)
            if status.is_success()
                || matches!(report.current_context(), SourceError::NoData { .. }) =>
        {
            Err(report.attach(format!("HTTP status: {status}")))
        }
        Err(report) => Err(report
            .change_context(SourceError::Request {
                provider: PROVIDER.into(),
            })
            .attach(format!("HTTP status: {status}"))),
    }
}

/// Parse a chart response into candles, keeping the newest `limit`.
///
/// Rows with any missing OHLC value are dropped; a missing volume counts as 0.
fn parse_chart(body: &str, symbol: &str, limit: usize) -> Result<Vec<Candle>, Report<SourceError>> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).change_context(SourceError::ResponseParse {
            provider: PROVIDER.into(),
        })?;

    let no_data = || SourceError::NoData {
        provider: PROVIDER.into(),
        symbol: symbol.to_owned(),
    };

    if let Some(error) = envelope.chart.error {
        return Err(Report::new(no_data())
            .attach(format!("{}: {}", error.code, error.description)));
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Err(Report::new(no_data()));
    };
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Err(Report::new(no_data()));
    };

    let mut candles = Vec::with_capacity(result.timestamp.len());
    for (i, &secs) in result.timestamp.iter().enumerate() {
        let at = |series: &[Option<f64>]| series.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) = (
            at(&quote.open),
            at(&quote.high),
            at(&quote.low),
            at(&quote.close),
        ) else {
            continue;
        };
        let Some(time) = DateTime::from_timestamp(secs, 0) else {
            debug!(secs, "skipping yahoo row with out-of-range timestamp");
            continue;
        };
        candles.push(Candle {
            time,
            open,
            high,
            low,
            close,
            volume: at(&quote.volume).unwrap_or(0.0),
        });
    }

    if candles.len() > limit {
        candles.drain(..candles.len() - limit);
    }
    Ok(candles)
}

// ── REST response types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    /// Epoch seconds; absent when the range holds no bars.
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChartQuote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}
