use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::engine::{EngineConfig, TrendRule};
use crate::error::ConfigError;
use crate::indicator::macd::MacdMode;
use crate::indicator::rsi::RsiWindow;
use crate::model::{ForexPair, SourceKind};

const DEFAULT_PAIRS: &[&str] = &[
    "GBP/CHF", "EUR/JPY", "EUR/GBP", "USD/CHF", "USD/CAD", "GBP/AUD", "EUR/USD", "EUR/CHF",
    "EUR/CAD", "EUR/AUD", "CAD/JPY", "AUD/CAD", "GBP/NZD", "GBP/USD", "GBP/CAD", "AUD/JPY",
    "AUD/USD", "EUR/NZD", "USD/INR", "USD/COP", "USD/BDT", "NZD/CAD", "USD/BRL", "USD/MXN",
    "NZD/JPY", "USD/JPY", "USD/DZD", "USD/ZAR", "NZD/USD", "USD/PKR", "USD/NGN", "USD/IDR",
    "USD/TRY", "USD/PHP", "USD/EGP", "USD/ARS", "NZD/CHF", "AUD/NZD",
];

const DEFAULT_OVERVIEW_PAIRS: &[&str] =
    &["EUR/USD", "GBP/USD", "USD/JPY", "AUD/USD", "USD/CAD", "USD/CHF"];

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_candle_limit() -> usize {
    100
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_pairs() -> Vec<String> {
    DEFAULT_PAIRS.iter().map(|p| (*p).to_owned()).collect()
}

fn default_overview_pairs() -> Vec<String> {
    DEFAULT_OVERVIEW_PAIRS.iter().map(|p| (*p).to_owned()).collect()
}

fn default_source_order() -> Vec<String> {
    vec!["yahoo".into(), "binance".into()]
}

fn default_request_timeout_secs() -> u64 {
    8
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into()
}

fn default_yahoo_base_url() -> String {
    "https://query1.finance.yahoo.com".into()
}

fn default_binance_base_url() -> String {
    "https://api.binance.com".into()
}

fn default_preset() -> String {
    "balanced".into()
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub engine: EngineSettings,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_pairs")]
    pub pairs: Vec<String>,
    #[serde(default = "default_overview_pairs")]
    pub overview_pairs: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SourcesConfig {
    /// Fallback order; the first source returning candles wins.
    #[serde(default = "default_source_order")]
    pub order: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_yahoo_base_url")]
    pub yahoo_base_url: String,
    /// Yahoo chart `range` parameter, e.g. `"5d"`. Unset picks a range that
    /// fits the requested timeframe.
    #[serde(default)]
    pub yahoo_range: Option<String>,
    #[serde(default = "default_binance_base_url")]
    pub binance_base_url: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            order: default_source_order(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            yahoo_base_url: default_yahoo_base_url(),
            yahoo_range: None,
            binance_base_url: default_binance_base_url(),
        }
    }
}

/// `[engine]` section: a preset name plus optional per-field overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub preset: String,
    pub rsi_period: Option<usize>,
    pub rsi_window: Option<RsiWindow>,
    pub min_candles: Option<usize>,
    pub trend: Option<TrendRule>,
    pub macd_mode: Option<MacdMode>,
    pub momentum_lookback: Option<usize>,
    pub momentum_threshold_pct: Option<f64>,
    pub volume_spike_ratio: Option<f64>,
    pub action_threshold: Option<u32>,
    pub moderate_threshold: Option<u32>,
    /// 0 disables STRONG BUY / STRONG SELL.
    pub strong_action_threshold: Option<u32>,
    /// 0 keeps every reason.
    pub max_reasons: Option<usize>,
    pub weights: WeightOverrides,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            rsi_period: None,
            rsi_window: None,
            min_candles: None,
            trend: None,
            macd_mode: None,
            momentum_lookback: None,
            momentum_threshold_pct: None,
            volume_spike_ratio: None,
            action_threshold: None,
            moderate_threshold: None,
            strong_action_threshold: None,
            max_reasons: None,
            weights: WeightOverrides::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WeightOverrides {
    pub rsi: Option<u32>,
    pub trend: Option<u32>,
    pub macd: Option<u32>,
    pub momentum: Option<u32>,
    pub volume: Option<u32>,
    pub trend_consistency: Option<u32>,
    pub ranging: Option<u32>,
}

impl AppConfig {
    /// Configured source order. Only valid after [`load`] has validated it.
    pub fn source_order(&self) -> Vec<SourceKind> {
        self.sources
            .order
            .iter()
            .filter_map(|name| SourceKind::from_str(name))
            .collect()
    }

    pub fn pairs(&self) -> Vec<ForexPair> {
        self.general
            .pairs
            .iter()
            .filter_map(|p| ForexPair::parse(p))
            .collect()
    }

    pub fn overview_pairs(&self) -> Vec<ForexPair> {
        self.general
            .overview_pairs
            .iter()
            .filter_map(|p| ForexPair::parse(p))
            .collect()
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_pairs(config)?;
    validate_sources(config)?;
    EngineConfig::from_settings(&config.engine)?;
    Ok(())
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let general = &config.general;
    if !VALID_LOG_FORMATS.contains(&general.log_format.as_str()) {
        return Err(Report::new(ConfigError::Validation {
            field: format!("general.log_format \"{}\" is not valid", general.log_format),
        }));
    }
    if general.candle_limit == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "general.candle_limit must be > 0".into(),
        }));
    }
    if general.poll_interval_secs == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "general.poll_interval_secs must be > 0".into(),
        }));
    }
    Ok(())
}

fn validate_pairs(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let lists = [
        ("general.pairs", &config.general.pairs),
        ("general.overview_pairs", &config.general.overview_pairs),
    ];
    for (field, pairs) in lists {
        for pair in pairs {
            if ForexPair::parse(pair).is_none() {
                return Err(Report::new(ConfigError::Validation {
                    field: format!("{field}: \"{pair}\" is not a BASE/QUOTE currency pair"),
                }));
            }
        }
    }
    Ok(())
}

fn validate_sources(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let sources = &config.sources;
    if sources.order.is_empty() {
        return Err(Report::new(ConfigError::Validation {
            field: "sources.order must name at least one source".into(),
        }));
    }

    let mut seen = std::collections::HashSet::new();
    for name in &sources.order {
        if SourceKind::from_str(name).is_none() {
            return Err(Report::new(ConfigError::Validation {
                field: format!("sources.order: unknown source \"{name}\""),
            }));
        }
        if !seen.insert(name.as_str()) {
            return Err(Report::new(ConfigError::Validation {
                field: format!("sources.order: duplicate source \"{name}\""),
            }));
        }
    }

    if sources.request_timeout_secs == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "sources.request_timeout_secs must be > 0".into(),
        }));
    }
    Ok(())
}
