use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Yahoo,
    Binance,
}

impl SourceKind {
    /// Parse a config-format source name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "yahoo" => Some(Self::Yahoo),
            "binance" => Some(Self::Binance),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yahoo => write!(f, "yahoo"),
            Self::Binance => write!(f, "binance"),
        }
    }
}

/// Candle timeframe supported by the application.
///
/// String representations match the CLI and config format (e.g. `"15m"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeFrame {
    Min1,
    Min5,
    Min15,
    Min30,
    Hour1,
    Day1,
}

impl TimeFrame {
    pub const ALL: [TimeFrame; 6] = [
        Self::Min1,
        Self::Min5,
        Self::Min15,
        Self::Min30,
        Self::Hour1,
        Self::Day1,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Self::Min1),
            "5m" => Some(Self::Min5),
            "15m" => Some(Self::Min15),
            "30m" => Some(Self::Min30),
            "1h" => Some(Self::Hour1),
            "1d" => Some(Self::Day1),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min1 => "1m",
            Self::Min5 => "5m",
            Self::Min15 => "15m",
            Self::Min30 => "30m",
            Self::Hour1 => "1h",
            Self::Day1 => "1d",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Min1 => "1 Minute",
            Self::Min5 => "5 Minutes",
            Self::Min15 => "15 Minutes",
            Self::Min30 => "30 Minutes",
            Self::Hour1 => "1 Hour",
            Self::Day1 => "1 Day",
        }
    }

    /// Interval parameter understood by both the Binance klines endpoint and
    /// the Yahoo chart endpoint.
    pub fn interval(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A currency pair written as `BASE/QUOTE` (e.g. `EUR/USD`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForexPair {
    base: String,
    quote: String,
}

impl ForexPair {
    pub fn parse(s: &str) -> Option<Self> {
        let (base, quote) = s.trim().split_once('/')?;
        if !is_currency_code(base) || !is_currency_code(quote) || base == quote {
            return None;
        }
        Some(Self {
            base: base.to_owned(),
            quote: quote.to_owned(),
        })
    }

    /// Yahoo Finance FX ticker, e.g. `EURUSD=X`.
    pub fn yahoo_symbol(&self) -> String {
        format!("{}{}=X", self.base, self.quote)
    }

    /// Binance spot symbol. USD legs trade against USDT on Binance.
    pub fn binance_symbol(&self) -> String {
        if self.quote == "USD" {
            format!("{}USDT", self.base)
        } else {
            format!("{}{}", self.base, self.quote)
        }
    }
}

fn is_currency_code(s: &str) -> bool {
    s.len() == 3 && s.bytes().all(|b| b.is_ascii_uppercase())
}

impl fmt::Display for ForexPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// One OHLCV observation. `time` travels as epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Prices must be finite and strictly positive, volume finite and non-negative.
    pub fn is_valid(&self) -> bool {
        let positive = |p: f64| p.is_finite() && p > 0.0;
        positive(self.open)
            && positive(self.high)
            && positive(self.low)
            && positive(self.close)
            && self.volume.is_finite()
            && self.volume >= 0.0
    }
}

/// Drop invalid candles and any candle that would break time ordering.
pub fn sanitize(candles: &[Candle]) -> Vec<Candle> {
    let mut kept: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        if !candle.is_valid() {
            tracing::debug!(time = %candle.time, "dropping invalid candle");
            continue;
        }
        if kept.last().is_some_and(|prev| candle.time < prev.time) {
            tracing::debug!(time = %candle.time, "dropping out-of-order candle");
            continue;
        }
        kept.push(candle.clone());
    }
    kept
}

/// Summary of a fetched candle set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketMetrics {
    pub current_price: f64,
    /// Percent change of the last close against the previous close.
    pub price_change: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

impl MarketMetrics {
    pub fn from_candles(candles: &[Candle]) -> Option<Self> {
        let last = candles.last()?;
        let price_change = match candles.len().checked_sub(2).map(|i| &candles[i]) {
            Some(prev) if prev.close > 0.0 => (last.close - prev.close) / prev.close * 100.0,
            _ => 0.0,
        };
        Some(Self {
            current_price: last.close,
            price_change,
            high: candles.iter().map(|c| c.high).fold(f64::MIN, f64::max),
            low: candles.iter().map(|c| c.low).fold(f64::MAX, f64::min),
            volume: candles.iter().map(|c| c.volume).sum(),
        })
    }
}

/// Last price and 24h change for one pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerSummary {
    pub pair: String,
    pub last_price: f64,
    pub change_pct: f64,
}


#[cfg(test)]
mod tests {
    use super::fixtures::{candle_at, candles_from_closes};
    use super::*;

    #[test]
    fn timeframe_round_trip() {
        for tf in TimeFrame::ALL {
            assert_eq!(TimeFrame::from_str(tf.as_str()), Some(tf));
        }
    }

    #[test]
    fn timeframe_invalid_string_returns_none() {
        assert_eq!(TimeFrame::from_str("4h"), None);
        assert_eq!(TimeFrame::from_str(""), None);
    }

    #[test]
    fn pair_parses_and_maps_symbols() {
        let pair = ForexPair::parse("EUR/USD").unwrap();
        assert_eq!(pair.to_string(), "EUR/USD");
        assert_eq!(pair.yahoo_symbol(), "EURUSD=X");
        assert_eq!(pair.binance_symbol(), "EURUSDT");

        let cross = ForexPair::parse("EUR/JPY").unwrap();
        assert_eq!(cross.binance_symbol(), "EURJPY");
        assert_eq!(cross.yahoo_symbol(), "EURJPY=X");
    }

    #[test]
    fn pair_rejects_malformed_input() {
        assert!(ForexPair::parse("EURUSD").is_none());
        assert!(ForexPair::parse("eur/usd").is_none());
        assert!(ForexPair::parse("EURO/USD").is_none());
        assert!(ForexPair::parse("USD/USD").is_none());
    }

    #[test]
    fn source_kind_parse_and_display() {
        assert_eq!(SourceKind::from_str("yahoo"), Some(SourceKind::Yahoo));
        assert_eq!(SourceKind::from_str("binance"), Some(SourceKind::Binance));
        assert_eq!(SourceKind::from_str("kraken"), None);
        assert_eq!(SourceKind::Binance.to_string(), "binance");
    }

    #[test]
    fn candle_serializes_time_as_millis() {
        let candle = candle_at(0, 1.1, 10.0);
        let json = serde_json::to_value(&candle).unwrap();
        assert_eq!(json["time"], 1_704_067_200_000_i64);
        assert_eq!(json["close"], 1.1);
    }

    #[test]
    fn sanitize_drops_zero_prices_and_time_regressions() {
        let mut candles = candles_from_closes(&[1.0, 1.1, 1.2, 1.3]);
        candles[1].open = 0.0;
        candles[3].time = candles[0].time;
        let kept = sanitize(&candles);
        let closes: Vec<f64> = kept.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![1.0, 1.2]);
    }

    #[test]
    fn sanitize_drops_nan_and_negative_volume() {
        let mut candles = candles_from_closes(&[1.0, 1.1, 1.2]);
        candles[0].close = f64::NAN;
        candles[2].volume = -1.0;
        assert_eq!(sanitize(&candles).len(), 1);
    }

    #[test]
    fn market_metrics_summarize_candles() {
        let mut candles = candles_from_closes(&[1.0, 2.0, 2.5]);
        candles[1].high = 3.0;
        candles[0].low = 0.5;
        let metrics = MarketMetrics::from_candles(&candles).unwrap();
        assert_eq!(metrics.current_price, 2.5);
        assert!((metrics.price_change - 25.0).abs() < 1e-9);
        assert_eq!(metrics.high, 3.0);
        assert_eq!(metrics.low, 0.5);
        assert_eq!(metrics.volume, 3000.0);
    }

    #[test]
    fn market_metrics_none_for_empty_input() {
        assert!(MarketMetrics::from_candles(&[]).is_none());
    }
}
