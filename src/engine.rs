pub mod scoring;

use error_stack::{Report, bail};
use serde::Deserialize;

use crate::config::EngineSettings;
use crate::error::ConfigError;
use crate::indicator::macd::MacdMode;
use crate::indicator::rsi::RsiWindow;
use crate::signal::MAX_CONFIDENCE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaKind {
    Sma,
    Ema,
}

/// Moving-average trend rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TrendRule {
    /// Price strictly above (below) both a fast and a slow average.
    Pair {
        average: MaKind,
        fast: usize,
        slow: usize,
    },
    /// Three EMAs strictly ordered with price beyond the fastest.
    Stack { fast: usize, mid: usize, slow: usize },
}

/// Points each rule adds to the buy or sell score. A zero weight disables the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weights {
    pub rsi: u32,
    pub trend: u32,
    pub macd: u32,
    pub momentum: u32,
    pub volume: u32,
    pub trend_consistency: u32,
    pub ranging: u32,
}

impl Weights {
    fn max(&self) -> u32 {
        [
            self.rsi,
            self.trend,
            self.macd,
            self.momentum,
            self.volume,
            self.trend_consistency,
            self.ranging,
        ]
        .into_iter()
        .max()
        .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub rsi_period: usize,
    pub rsi_window: RsiWindow,
    pub min_candles: usize,
    pub trend: TrendRule,
    pub macd_mode: MacdMode,
    pub momentum_lookback: usize,
    pub momentum_threshold_pct: f64,
    pub volume_spike_ratio: f64,
    pub action_threshold: u32,
    pub moderate_threshold: u32,
    pub strong_action_threshold: Option<u32>,
    pub max_reasons: Option<usize>,
    pub weights: Weights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// RSI, EMA 20/50 alignment, MACD, momentum, volume and trend consistency;
    /// top three reasons.
    Balanced,
    /// RSI, EMA 9/21/50 stack, momentum and volume with a higher action bar
    /// and STRONG actions at 80.
    EmaStack,
}

impl Preset {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "balanced" => Some(Self::Balanced),
            "ema_stack" => Some(Self::EmaStack),
            _ => None,
        }
    }

    pub fn config(self) -> EngineConfig {
        match self {
            Self::Balanced => EngineConfig {
                rsi_period: 14,
                rsi_window: RsiWindow::Trailing,
                min_candles: 20,
                trend: TrendRule::Pair {
                    average: MaKind::Ema,
                    fast: 20,
                    slow: 50,
                },
                macd_mode: MacdMode::Collapsed,
                momentum_lookback: 5,
                momentum_threshold_pct: 0.1,
                volume_spike_ratio: 1.5,
                action_threshold: 50,
                moderate_threshold: 50,
                strong_action_threshold: None,
                max_reasons: Some(3),
                weights: Weights {
                    rsi: 25,
                    trend: 20,
                    macd: 15,
                    momentum: 10,
                    volume: 15,
                    trend_consistency: 10,
                    ranging: 5,
                },
            },
            Self::EmaStack => EngineConfig {
                rsi_period: 14,
                rsi_window: RsiWindow::Trailing,
                min_candles: 10,
                trend: TrendRule::Stack {
                    fast: 9,
                    mid: 21,
                    slow: 50,
                },
                macd_mode: MacdMode::Collapsed,
                momentum_lookback: 5,
                momentum_threshold_pct: 0.2,
                volume_spike_ratio: 1.5,
                action_threshold: 60,
                moderate_threshold: 60,
                strong_action_threshold: Some(80),
                max_reasons: None,
                weights: Weights {
                    rsi: 25,
                    trend: 30,
                    macd: 0,
                    momentum: 10,
                    volume: 15,
                    trend_consistency: 0,
                    ranging: 0,
                },
            },
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Preset::Balanced.config()
    }
}

impl EngineConfig {
    /// Resolve the `[engine]` section: start from the named preset, then apply overrides.
    pub fn from_settings(settings: &EngineSettings) -> Result<Self, Report<ConfigError>> {
        let Some(preset) = Preset::from_str(&settings.preset) else {
            bail!(ConfigError::Validation {
                field: format!("engine.preset \"{}\" is not known", settings.preset),
            });
        };

        let mut config = preset.config();
        if let Some(v) = settings.rsi_period {
            config.rsi_period = v;
        }
        if let Some(v) = settings.rsi_window {
            config.rsi_window = v;
        }
        if let Some(v) = settings.min_candles {
            config.min_candles = v;
        }
        if let Some(v) = settings.trend {
            config.trend = v;
        }
        if let Some(v) = settings.macd_mode {
            config.macd_mode = v;
        }
        if let Some(v) = settings.momentum_lookback {
            config.momentum_lookback = v;
        }
        if let Some(v) = settings.momentum_threshold_pct {
            config.momentum_threshold_pct = v;
        }
        if let Some(v) = settings.volume_spike_ratio {
            config.volume_spike_ratio = v;
        }
        if let Some(v) = settings.action_threshold {
            config.action_threshold = v;
        }
        if let Some(v) = settings.moderate_threshold {
            config.moderate_threshold = v;
        }
        // 0 turns the optional behaviours off
        if let Some(v) = settings.strong_action_threshold {
            config.strong_action_threshold = (v > 0).then_some(v);
        }
        if let Some(v) = settings.max_reasons {
            config.max_reasons = (v > 0).then_some(v);
        }

        let w = &settings.weights;
        let weights = &mut config.weights;
        weights.rsi = w.rsi.unwrap_or(weights.rsi);
        weights.trend = w.trend.unwrap_or(weights.trend);
        weights.macd = w.macd.unwrap_or(weights.macd);
        weights.momentum = w.momentum.unwrap_or(weights.momentum);
        weights.volume = w.volume.unwrap_or(weights.volume);
        weights.trend_consistency = w.trend_consistency.unwrap_or(weights.trend_consistency);
        weights.ranging = w.ranging.unwrap_or(weights.ranging);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Report<ConfigError>> {
        let invalid = |field: &str| {
            Report::new(ConfigError::Validation {
                field: format!("engine.{field}"),
            })
        };

        if self.rsi_period == 0 {
            return Err(invalid("rsi_period must be > 0"));
        }
        if self.min_candles < 2 {
            return Err(invalid("min_candles must be >= 2"));
        }
        if self.momentum_lookback == 0 {
            return Err(invalid("momentum_lookback must be > 0"));
        }
        if !self.momentum_threshold_pct.is_finite() || self.momentum_threshold_pct < 0.0 {
            return Err(invalid("momentum_threshold_pct must be a non-negative number"));
        }
        if !self.volume_spike_ratio.is_finite() || self.volume_spike_ratio <= 0.0 {
            return Err(invalid("volume_spike_ratio must be > 0"));
        }
        if self.action_threshold > MAX_CONFIDENCE {
            return Err(invalid("action_threshold must be <= 95"));
        }
        if self.moderate_threshold == 0 || self.moderate_threshold > 70 {
            return Err(invalid("moderate_threshold must be in 1..=70"));
        }
        if self.weights.max() > MAX_CONFIDENCE {
            return Err(invalid("weights must each be <= 95"));
        }
        match self.trend {
            TrendRule::Pair { fast, slow, .. } if fast == 0 || fast >= slow => {
                Err(invalid("trend periods must satisfy 0 < fast < slow"))
            }
            TrendRule::Stack { fast, mid, slow } if fast == 0 || fast >= mid || mid >= slow => {
                Err(invalid("trend periods must satisfy 0 < fast < mid < slow"))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(toml: &str) -> EngineSettings {
        toml::from_str(toml).expect("parse failed")
    }

    #[test]
    fn presets_are_valid() {
        assert!(Preset::Balanced.config().validate().is_ok());
        assert!(Preset::EmaStack.config().validate().is_ok());
    }

    #[test]
    fn default_settings_resolve_to_balanced() {
        let config = EngineConfig::from_settings(&EngineSettings::default()).unwrap();
        assert_eq!(config, Preset::Balanced.config());
    }

    #[test]
    fn overrides_apply_on_top_of_preset() {
        let config = EngineConfig::from_settings(&settings(
            r#"
preset = "ema_stack"
min_candles = 30
macd_mode = "full"
strong_action_threshold = 0
max_reasons = 4

[trend]
kind = "pair"
average = "sma"
fast = 10
slow = 30

[weights]
macd = 20
"#,
        ))
        .unwrap();
        assert_eq!(config.min_candles, 30);
        assert_eq!(config.macd_mode, MacdMode::Full);
        assert_eq!(config.strong_action_threshold, None);
        assert_eq!(config.max_reasons, Some(4));
        assert_eq!(
            config.trend,
            TrendRule::Pair {
                average: MaKind::Sma,
                fast: 10,
                slow: 30
            }
        );
        assert_eq!(config.weights.macd, 20);
        assert_eq!(config.weights.trend, 30);
        assert_eq!(config.action_threshold, 60);
    }

    #[test]
    fn unknown_preset_rejected() {
        assert!(EngineConfig::from_settings(&settings(r#"preset = "turbo""#)).is_err());
    }

    #[test]
    fn invalid_overrides_rejected() {
        assert!(EngineConfig::from_settings(&settings("min_candles = 1")).is_err());
        assert!(EngineConfig::from_settings(&settings("rsi_period = 0")).is_err());
        assert!(EngineConfig::from_settings(&settings("action_threshold = 96")).is_err());
        assert!(EngineConfig::from_settings(&settings("moderate_threshold = 0")).is_err());
        assert!(
            EngineConfig::from_settings(&settings(
                r#"
[trend]
kind = "stack"
fast = 21
mid = 9
slow = 50
"#
            ))
            .is_err()
        );
    }

    #[test]
    fn oversized_weights_rejected() {
        let huge = settings(
            r#"
[weights]
trend = 4000000000
momentum = 4000000000
"#,
        );
        assert!(EngineConfig::from_settings(&huge).is_err());
        assert!(EngineConfig::from_settings(&settings("[weights]\nrsi = 95")).is_ok());
        assert!(EngineConfig::from_settings(&settings("[weights]\nranging = 96")).is_err());
    }
}
