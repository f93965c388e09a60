use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::indicator::rsi::NEUTRAL_RSI;
use crate::model::SourceKind;

/// Upper bound on reported confidence; the engine is never certain.
pub const MAX_CONFIDENCE: u32 = 95;
const STRONG_CONFIDENCE: u32 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalAction {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "HOLD")]
    Hold,
    #[serde(rename = "STRONG BUY")]
    StrongBuy,
    #[serde(rename = "STRONG SELL")]
    StrongSell,
}

impl SignalAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
            Self::StrongBuy => "STRONG BUY",
            Self::StrongSell => "STRONG SELL",
        }
    }

    /// `true` for anything other than HOLD.
    pub fn is_actionable(self) -> bool {
        self != Self::Hold
    }

    pub fn strengthened(self) -> Self {
        match self {
            Self::Buy => Self::StrongBuy,
            Self::Sell => Self::StrongSell,
            other => other,
        }
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}

impl Strength {
    pub fn from_confidence(confidence: u32, moderate_threshold: u32) -> Self {
        if confidence >= STRONG_CONFIDENCE {
            Self::Strong
        } else if confidence >= moderate_threshold {
            Self::Moderate
        } else {
            Self::Weak
        }
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weak => write!(f, "WEAK"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::Strong => write!(f, "STRONG"),
        }
    }
}

/// Indicator readings the engine based its decision on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    /// Momentum in percent over the configured lookback.
    pub price_change: f64,
    pub macd_histogram: f64,
    pub fast_ma: Option<f64>,
    pub slow_ma: Option<f64>,
    pub volume_ratio: f64,
    pub trend_strength: f64,
    pub last_price: f64,
}

impl IndicatorSnapshot {
    pub fn neutral() -> Self {
        Self {
            rsi: NEUTRAL_RSI,
            price_change: 0.0,
            macd_histogram: 0.0,
            fast_ma: None,
            slow_ma: None,
            volume_ratio: 1.0,
            trend_strength: 0.5,
            last_price: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    pub action: SignalAction,
    pub confidence: u32,
    pub strength: Strength,
    pub reasons: Vec<String>,
    pub indicators: IndicatorSnapshot,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// HOLD with zero confidence, used whenever there is nothing to analyze.
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self {
            action: SignalAction::Hold,
            confidence: 0,
            strength: Strength::Weak,
            reasons: vec![reason.into()],
            indicators: IndicatorSnapshot::neutral(),
            timestamp: Utc::now(),
        }
    }
}

/// Envelope handed to notifiers: the signal plus where its data came from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalReport {
    pub symbol: String,
    pub timeframe: String,
    pub source: Option<SourceKind>,
    pub signal: Signal,
    pub last_price: Option<f64>,
    pub total_candles: usize,
    pub last_update: DateTime<Utc>,
}
