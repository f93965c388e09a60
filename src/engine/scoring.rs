use chrono::Utc;
use error_stack::Report;
use tracing::{debug, warn};

use crate::engine::{EngineConfig, MaKind, TrendRule};
use crate::error::IndicatorError;
use crate::indicator::ma::{Ema, Sma};
use crate::indicator::macd::{Macd, MacdValue};
use crate::indicator::rsi::Rsi;
use crate::indicator::trend::trend_strength;
use crate::indicator::volume::volume_ratio;
use crate::indicator::{Indicator, close_prices, price_change_pct, volumes};
use crate::model::{Candle, sanitize};
use crate::signal::{IndicatorSnapshot, MAX_CONFIDENCE, Signal, SignalAction, Strength};

const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;
const CONSISTENT_TREND: f64 = 0.7;
const RANGING_TREND: f64 = 0.3;

const INSUFFICIENT_DATA: &str = "Insufficient data";
const MIXED_SIGNALS: &str = "Mixed signals - waiting for confirmation";
const ANALYSIS_FAILED: &str = "Error analyzing market data";

/// Turns a candle sequence into a BUY/SELL/HOLD [`Signal`].
///
/// Evaluation is pure apart from the timestamp; the same candles always yield
/// the same action, confidence and reasons.
pub struct SignalEngine {
    config: EngineConfig,
    rsi: Rsi,
    macd: Macd,
}

enum TrendReading {
    Pair {
        fast: Option<f64>,
        slow: Option<f64>,
    },
    Stack {
        fast: f64,
        mid: f64,
        slow: f64,
    },
}

struct Readings {
    rsi: f64,
    trend: TrendReading,
    macd: MacdValue,
    price_change: f64,
    volume_ratio: f64,
    trend_strength: f64,
    last_price: f64,
}

impl Readings {
    fn snapshot(&self) -> IndicatorSnapshot {
        let (fast_ma, slow_ma) = match self.trend {
            TrendReading::Pair { fast, slow } => (fast, slow),
            TrendReading::Stack { fast, slow, .. } => (Some(fast), Some(slow)),
        };
        IndicatorSnapshot {
            rsi: self.rsi,
            price_change: self.price_change,
            macd_histogram: self.macd.histogram,
            fast_ma,
            slow_ma,
            volume_ratio: self.volume_ratio,
            trend_strength: self.trend_strength,
            last_price: self.last_price,
        }
    }
}

#[derive(Default)]
struct Scorecard {
    buy: u32,
    sell: u32,
    reasons: Vec<String>,
}

impl Scorecard {
    fn bullish(&mut self, weight: u32, reason: impl Into<String>) {
        if weight > 0 {
            self.buy = self.buy.saturating_add(weight);
            self.reasons.push(reason.into());
        }
    }

    fn bearish(&mut self, weight: u32, reason: impl Into<String>) {
        if weight > 0 {
            self.sell = self.sell.saturating_add(weight);
            self.reasons.push(reason.into());
        }
    }
}

impl SignalEngine {
    pub fn new(config: EngineConfig) -> Result<Self, Report<IndicatorError>> {
        let rsi = Rsi::new(config.rsi_period, config.rsi_window)?;
        let macd = Macd::standard(config.macd_mode)?;
        Ok(Self { config, rsi, macd })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Score `candles` (oldest first). Never fails: missing or unusable data
    /// yields a zero-confidence HOLD.
    pub fn evaluate(&self, candles: &[Candle]) -> Signal {
        let candles = sanitize(candles);
        if candles.len() < self.config.min_candles {
            debug!(
                available = candles.len(),
                required = self.config.min_candles,
                "insufficient candles for signal"
            );
            return Signal::neutral(INSUFFICIENT_DATA);
        }

        let prices = close_prices(&candles);
        let volumes = volumes(&candles);
        match self.read_indicators(&prices, &volumes) {
            Ok(readings) => self.score(&readings),
            Err(report) => {
                warn!(error = ?report, "indicator computation failed");
                Signal::neutral(ANALYSIS_FAILED)
            }
        }
    }

    fn read_indicators(
        &self,
        prices: &[f64],
        volumes: &[f64],
    ) -> Result<Readings, Report<IndicatorError>> {
        let price_change = price_change_pct(prices, self.config.momentum_lookback);
        let last_price = prices.last().copied().unwrap_or_default();

        let trend = match self.config.trend {
            TrendRule::Pair {
                average: MaKind::Sma,
                fast,
                slow,
            } => TrendReading::Pair {
                fast: Sma::new(fast)?.compute(prices)?,
                slow: Sma::new(slow)?.compute(prices)?,
            },
            TrendRule::Pair {
                average: MaKind::Ema,
                fast,
                slow,
            } => TrendReading::Pair {
                fast: Some(Ema::new(fast)?.compute(prices)?),
                slow: Some(Ema::new(slow)?.compute(prices)?),
            },
            TrendRule::Stack { fast, mid, slow } => TrendReading::Stack {
                fast: Ema::new(fast)?.compute(prices)?,
                mid: Ema::new(mid)?.compute(prices)?,
                slow: Ema::new(slow)?.compute(prices)?,
            },
        };

        Ok(Readings {
            rsi: self.rsi.compute(prices)?,
            trend,
            macd: self.macd.compute(prices)?,
            price_change,
            volume_ratio: volume_ratio(volumes),
            trend_strength: trend_strength(prices),
            last_price,
        })
    }

    fn score(&self, readings: &Readings) -> Signal {
        let config = &self.config;
        let mut card = Scorecard::default();
        self.apply_rules(readings, &mut card);

        let (action, confidence) =
            if card.buy >= config.action_threshold && card.buy > card.sell {
                (SignalAction::Buy, card.buy.min(MAX_CONFIDENCE))
            } else if card.sell >= config.action_threshold && card.sell > card.buy {
                (SignalAction::Sell, card.sell.min(MAX_CONFIDENCE))
            } else {
                card.reasons.push(MIXED_SIGNALS.into());
                (SignalAction::Hold, 0)
            };

        let action = match config.strong_action_threshold {
            Some(threshold) if confidence >= threshold => action.strengthened(),
            _ => action,
        };

        debug!(
            buy_score = card.buy,
            sell_score = card.sell,
            action = %action,
            confidence,
            "signal scored"
        );

        let mut reasons = card.reasons;
        if let Some(max) = config.max_reasons {
            reasons.truncate(max);
        }

        Signal {
            action,
            confidence,
            strength: Strength::from_confidence(confidence, config.moderate_threshold),
            reasons,
            indicators: readings.snapshot(),
            timestamp: Utc::now(),
        }
    }

    /// Rules are independent and additive; their order fixes the order of reasons.
    fn apply_rules(&self, r: &Readings, card: &mut Scorecard) {
        let config = &self.config;
        let w = &config.weights;
        let price = r.last_price;

        if r.rsi < RSI_OVERSOLD {
            card.bullish(w.rsi, "RSI indicates oversold");
        } else if r.rsi > RSI_OVERBOUGHT {
            card.bearish(w.rsi, "RSI indicates overbought");
        }

        match r.trend {
            TrendReading::Pair {
                fast: Some(fast),
                slow: Some(slow),
            } => {
                if price > fast && price > slow {
                    card.bullish(w.trend, "Bullish MA alignment");
                } else if price < fast && price < slow {
                    card.bearish(w.trend, "Bearish MA alignment");
                }
            }
            TrendReading::Pair { .. } => {}
            TrendReading::Stack { fast, mid, slow } => {
                if fast > mid && mid > slow && price > fast {
                    card.bullish(w.trend, "Strong bullish EMA alignment");
                } else if fast < mid && mid < slow && price < fast {
                    card.bearish(w.trend, "Strong bearish EMA alignment");
                }
            }
        }

        let macd = &r.macd;
        if macd.macd > macd.signal && macd.histogram > 0.0 {
            card.bullish(w.macd, "MACD bullish crossover");
        } else if macd.macd < macd.signal && macd.histogram < 0.0 {
            card.bearish(w.macd, "MACD bearish crossover");
        }

        let change = r.price_change;
        let threshold = config.momentum_threshold_pct;
        if change > threshold {
            card.bullish(
                w.momentum,
                format!("Positive price momentum ({change:.2}%)"),
            );
        } else if change < -threshold {
            card.bearish(
                w.momentum,
                format!("Negative price momentum ({:.2}%)", change.abs()),
            );
        }

        if r.volume_ratio > config.volume_spike_ratio {
            let ratio = r.volume_ratio;
            if change > 0.0 {
                card.bullish(
                    w.volume,
                    format!("High volume with upward movement ({ratio:.1}x average)"),
                );
            } else if change < 0.0 {
                card.bearish(
                    w.volume,
                    format!("High volume with downward movement ({ratio:.1}x average)"),
                );
            }
        }

        if r.trend_strength > CONSISTENT_TREND {
            card.bullish(w.trend_consistency, "Consistent upward trend");
        } else if r.trend_strength < RANGING_TREND {
            card.bearish(w.ranging, "Weak trend strength, market may be ranging");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Preset;
    use crate::indicator::macd::MacdMode;
    use crate::model::fixtures::candle_at;

    fn series(closes: &[f64], volumes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&c, &v))| candle_at(i, c, v))
            .collect()
    }

    fn with_spike(len: usize) -> Vec<f64> {
        let mut volumes = vec![1000.0; len - 1];
        volumes.push(5000.0);
        volumes
    }

    fn rising_20() -> Vec<Candle> {
        let closes: Vec<f64> = (0..20).map(|i| 1.0 + 0.02 * i as f64 / 19.0).collect();
        series(&closes, &with_spike(20))
    }

    fn declining_30() -> Vec<Candle> {
        let closes: Vec<f64> = (0..30).map(|i| 1.1 - 0.03 * i as f64 / 29.0).collect();
        series(&closes, &with_spike(30))
    }

    fn engine(config: EngineConfig) -> SignalEngine {
        SignalEngine::new(config).unwrap()
    }

    #[test]
    fn too_few_candles_is_insufficient_data() {
        let candles = rising_20();
        let signal = engine(EngineConfig::default()).evaluate(&candles[..19]);
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.confidence, 0);
        assert_eq!(signal.reasons, vec![INSUFFICIENT_DATA.to_string()]);
    }

    #[test]
    fn invalid_candles_do_not_count_toward_minimum() {
        let mut candles = rising_20();
        candles[3].close = 0.0;
        let signal = engine(EngineConfig::default()).evaluate(&candles);
        assert_eq!(signal.reasons, vec![INSUFFICIENT_DATA.to_string()]);
    }

    #[test]
    fn flat_market_holds_with_zero_confidence() {
        let candles = series(&[1.1; 20], &[1000.0; 20]);
        let signal = engine(EngineConfig::default()).evaluate(&candles);
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.confidence, 0);
        assert_eq!(signal.strength, Strength::Weak);
        assert_eq!(signal.indicators.rsi, 50.0);
        assert!(signal.reasons.iter().any(|r| r.starts_with("Mixed signals")));
    }

    #[test]
    fn rising_market_with_volume_spike_buys() {
        let signal = engine(EngineConfig::default()).evaluate(&rising_20());
        // MA alignment 20 + momentum 10 + volume 15 + trend consistency 10
        assert_eq!(signal.action, SignalAction::Buy);
        assert_eq!(signal.confidence, 55);
        assert_eq!(signal.strength, Strength::Moderate);
        assert_eq!(
            signal.reasons,
            vec![
                "Bullish MA alignment".to_string(),
                "Positive price momentum (0.52%)".to_string(),
                "High volume with upward movement (4.2x average)".to_string(),
            ]
        );
        assert!(signal.indicators.rsi > 30.0 && signal.indicators.rsi < 70.0);
        assert_eq!(signal.indicators.trend_strength, 1.0);
    }

    #[test]
    fn declining_market_sells_despite_oversold_rsi() {
        let signal = engine(EngineConfig::default()).evaluate(&declining_30());
        // sell: MA 20 + momentum 10 + volume 15 + ranging 5 = 50, buy: RSI 25
        assert_eq!(signal.action, SignalAction::Sell);
        assert_eq!(signal.confidence, 50);
        assert!(signal.indicators.rsi.abs() < 1e-9);
        assert!(signal.indicators.price_change < 0.0);
        assert_eq!(signal.reasons[0], "RSI indicates oversold");
        assert_eq!(signal.reasons[1], "Bearish MA alignment");
        assert_eq!(signal.reasons.len(), 3);
    }

    #[test]
    fn scoring_is_deterministic() {
        let engine = engine(EngineConfig::default());
        let candles = declining_30();
        let first = engine.evaluate(&candles);
        for _ in 0..5 {
            let again = engine.evaluate(&candles);
            assert_eq!(again.action, first.action);
            assert_eq!(again.confidence, first.confidence);
            assert_eq!(again.reasons, first.reasons);
            assert_eq!(again.indicators, first.indicators);
        }
    }

    #[test]
    fn confidence_is_capped() {
        let mut config = EngineConfig::default();
        config.weights.trend = 100;
        config.weights.momentum = 100;
        let signal = engine(config).evaluate(&rising_20());
        assert_eq!(signal.action, SignalAction::Buy);
        assert_eq!(signal.confidence, 95);
        assert_eq!(signal.strength, Strength::Strong);
    }

    #[test]
    fn strong_action_prefix_when_enabled() {
        let mut config = EngineConfig::default();
        config.strong_action_threshold = Some(55);
        let signal = engine(config).evaluate(&rising_20());
        assert_eq!(signal.action, SignalAction::StrongBuy);
    }

    #[test]
    fn untruncated_reasons_keep_every_rule() {
        let mut config = EngineConfig::default();
        config.max_reasons = None;
        let signal = engine(config).evaluate(&rising_20());
        assert_eq!(signal.reasons.len(), 4);
        assert_eq!(signal.reasons[3], "Consistent upward trend");
    }

    #[test]
    fn below_threshold_holds_and_notes_mixed_signals() {
        let mut config = EngineConfig::default();
        config.action_threshold = 60;
        config.max_reasons = None;
        let signal = engine(config).evaluate(&rising_20());
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.confidence, 0);
        assert_eq!(signal.reasons.last().unwrap(), MIXED_SIGNALS);
    }

    #[test]
    fn sma_pair_skips_rule_when_slow_average_unavailable() {
        let mut config = EngineConfig::default();
        config.trend = TrendRule::Pair {
            average: MaKind::Sma,
            fast: 20,
            slow: 50,
        };
        config.max_reasons = None;
        let signal = engine(config).evaluate(&rising_20());
        assert!(signal.indicators.slow_ma.is_none());
        assert!(!signal.reasons.iter().any(|r| r.contains("MA alignment")));
        // momentum 10 + volume 15 + consistency 10 = 35
        assert_eq!(signal.action, SignalAction::Hold);
    }

    #[test]
    fn ema_stack_preset_reports_strong_buy() {
        // Steep rally, one sharp drop, then a slow recovery on heavy volume:
        // RSI dips below 30 while the EMA stack stays bullish.
        let mut closes: Vec<f64> = (0..60).map(|i| 1.0 + 0.01 * i as f64).collect();
        closes.push(closes[59] - 0.07);
        for _ in 0..13 {
            let last = *closes.last().unwrap();
            closes.push(last + 0.002);
        }
        let candles = series(&closes, &with_spike(closes.len()));

        let signal = engine(Preset::EmaStack.config()).evaluate(&candles);
        assert_eq!(signal.action, SignalAction::StrongBuy);
        assert_eq!(signal.confidence, 80);
        assert_eq!(signal.strength, Strength::Strong);
        assert_eq!(signal.reasons[1], "Strong bullish EMA alignment");
    }

    #[test]
    fn full_macd_adds_bearish_crossover_on_decline() {
        let mut config = EngineConfig::default();
        config.macd_mode = MacdMode::Full;
        config.max_reasons = None;
        let signal = engine(config).evaluate(&declining_30());
        assert!(signal.indicators.macd_histogram < 0.0);
        assert!(signal.reasons.iter().any(|r| r == "MACD bearish crossover"));
        assert_eq!(signal.confidence, 65);
    }

    #[test]
    fn collapsed_macd_never_fires() {
        let mut config = EngineConfig::default();
        config.max_reasons = None;
        let signal = engine(config).evaluate(&declining_30());
        assert_eq!(signal.indicators.macd_histogram, 0.0);
        assert!(!signal.reasons.iter().any(|r| r.contains("MACD")));
    }

    #[test]
    fn huge_weights_saturate_instead_of_overflowing() {
        let mut config = EngineConfig::default();
        config.weights.trend = 4_000_000_000;
        config.weights.momentum = 4_000_000_000;
        let signal = engine(config).evaluate(&rising_20());
        assert_eq!(signal.action, SignalAction::Buy);
        assert_eq!(signal.confidence, MAX_CONFIDENCE);
    }

    #[test]
    fn declining_market_reports_every_bearish_reason() {
        let mut config = EngineConfig::default();
        config.max_reasons = None;
        let signal = engine(config).evaluate(&declining_30());
        assert_eq!(signal.action, SignalAction::Sell);
        assert_eq!(signal.confidence, 50);
        assert_eq!(
            signal.reasons,
            vec![
                "RSI indicates oversold".to_string(),
                "Bearish MA alignment".to_string(),
                "Negative price momentum (0.48%)".to_string(),
                "High volume with downward movement (4.4x average)".to_string(),
                "Weak trend strength, market may be ranging".to_string(),
            ]
        );
        assert_eq!(signal.indicators.trend_strength, 0.0);
    }

    #[test]
    fn volume_spike_without_momentum_adds_nothing() {
        let engine = engine(EngineConfig::default());
        let card_for = |volumes: &[f64]| {
            let candles = series(&[1.1; 20], volumes);
            let readings = engine
                .read_indicators(&close_prices(&candles), &super::volumes(&candles))
                .unwrap();
            let mut card = Scorecard::default();
            engine.apply_rules(&readings, &mut card);
            (readings.volume_ratio, card)
        };

        let (quiet_ratio, quiet) = card_for(&[1000.0; 20]);
        let (spike_ratio, spiked) = card_for(&with_spike(20));

        assert_eq!(quiet_ratio, 1.0);
        assert!(spike_ratio > 1.5);
        assert_eq!(spiked.buy, quiet.buy);
        assert_eq!(spiked.sell, quiet.sell);
        assert_eq!(spiked.reasons, quiet.reasons);
        assert!(!spiked.reasons.iter().any(|r| r.starts_with("High volume")));
        assert!(
            spiked
                .reasons
                .iter()
                .any(|r| r == "Weak trend strength, market may be ranging")
        );
    }
}
