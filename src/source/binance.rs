use std::sync::Arc;

use chrono::DateTime;
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::info;

use crate::config::SourcesConfig;
use crate::error::SourceError;
use crate::model::{Candle, ForexPair, SourceKind, TickerSummary, TimeFrame};
use crate::source::{MarketDataSource, http_client};

const PROVIDER: &str = "binance";
const MAX_CANDLES_PER_REQUEST: usize = 1000;

pub struct BinanceSource {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl BinanceSource {
    pub fn new(config: &SourcesConfig) -> Result<Self, Report<SourceError>> {
        // klines cost weight 2 against a 6000/min budget; 10 req/s stays well inside it
        let quota = Quota::per_second(nonzero!(10u32));
        Ok(Self {
            client: http_client(config, SourceKind::Binance)?,
            base_url: config.binance_base_url.trim_end_matches('/').to_owned(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    /// Last price and 24h percent change for `pair`.
    pub async fn fetch_ticker_24h(
        &self,
        pair: &ForexPair,
    ) -> Result<TickerSummary, Report<SourceError>> {
        self.rate_limiter.until_ready().await;

        let symbol = pair.binance_symbol();
        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await
            .change_context(SourceError::Request {
                provider: PROVIDER.into(),
            })?;

        check_status(response.status(), &symbol)?;

        let raw: BinanceTicker24h =
            response
                .json()
                .await
                .change_context(SourceError::ResponseParse {
                    provider: PROVIDER.into(),
                })?;

        raw.into_summary(pair)
    }
}

impl MarketDataSource for BinanceSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Binance
    }

    fn fetch_candles(
        &self,
        pair: &ForexPair,
        timeframe: TimeFrame,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Candle>, Report<SourceError>>> {
        let symbol = pair.binance_symbol();
        Box::pin(async move {
            self.rate_limiter.until_ready().await;

            let url = format!("{}/api/v3/klines", self.base_url);
            let limit_str = limit.min(MAX_CANDLES_PER_REQUEST).to_string();
            let params = [
                ("symbol", symbol.as_str()),
                ("interval", timeframe.interval()),
                ("limit", limit_str.as_str()),
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

            check_status(response.status(), &symbol)?;

            let raw: Vec<BinanceKlineRow> =
                response
                    .json()
                    .await
                    .change_context(SourceError::ResponseParse {
                        provider: PROVIDER.into(),
                    })?;

            info!(
                symbol = %symbol,
                timeframe = %timeframe,
                fetched = raw.len(),
                "binance candle fetch complete"
            );

            raw.into_iter()
                .map(BinanceKlineRow::into_candle)
                .collect::<Result<Vec<_>, _>>()
        })
    }
}

fn check_status(status: StatusCode, symbol: &str) -> Result<(), Report<SourceError>> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::BAD_REQUEST => Err(Report::new(SourceError::UnknownSymbol {
            provider: PROVIDER.into(),
            symbol: symbol.to_owned(),
        })),
        StatusCode::TOO_MANY_REQUESTS => Err(Report::new(SourceError::RateLimit {
            provider: PROVIDER.into(),
        })),
        other => Err(Report::new(SourceError::Request {
            provider: PROVIDER.into(),
        })
        .attach(format!("HTTP status: {other}"))),
    }
}

fn parse_f64(s: &str) -> Result<f64, Report<SourceError>> {
    s.parse::<f64>()
        .change_context(SourceError::ResponseParse {
            provider: PROVIDER.into(),
        })
        .attach_with(|| format!("value: {s:?}"))
}

// ── REST response types ───────────────────────────────────────────────────────

/// Binance kline row: 12-element array
/// [open_time, open, high, low, close, volume, close_time, ...]
#[derive(Debug, Deserialize)]
struct BinanceKlineRow(
    i64,                        // 0: open_time (ms)
    String,                     // 1: open
    String,                     // 2: high
    String,                     // 3: low
    String,                     // 4: close
    String,                     // 5: volume
    #[allow(dead_code)] i64,    // 6: close_time
    #[allow(dead_code)] String, // 7: quote asset volume
    #[allow(dead_code)] i64,    // 8: number of trades
    #[allow(dead_code)] String, // 9: taker buy base volume
    #[allow(dead_code)] String, // 10: taker buy quote volume
    #[allow(dead_code)] String, // 11: ignore
);

impl BinanceKlineRow {
    fn into_candle(self) -> Result<Candle, Report<SourceError>> {
        let Some(time) = DateTime::from_timestamp_millis(self.0) else {
            return Err(Report::new(SourceError::ResponseParse {
                provider: PROVIDER.into(),
            })
            .attach(format!("open_time out of range: {}", self.0)));
        };

        Ok(Candle {
            time,
            open: parse_f64(&self.1)?,
            high: parse_f64(&self.2)?,
            low: parse_f64(&self.3)?,
            close: parse_f64(&self.4)?,
            volume: parse_f64(&self.5)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker24h {
    last_price: String,
    price_change_percent: String,
}

impl BinanceTicker24h {
    fn into_summary(self, pair: &ForexPair) -> Result<TickerSummary, Report<SourceError>> {
        Ok(TickerSummary {
            pair: pair.to_string(),
            last_price: parse_f64(&self.last_price)?,
            change_pct: parse_f64(&self.price_change_percent)?,
        })
    }
}
