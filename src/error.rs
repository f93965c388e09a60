use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum SourceError {
    #[display("failed to build HTTP client for {provider}")]
    Client { provider: String },
    #[display("request to {provider} failed")]
    Request { provider: String },
    #[display("failed to parse response from {provider}")]
    ResponseParse { provider: String },
    #[display("{provider} does not list symbol {symbol}")]
    UnknownSymbol { provider: String, symbol: String },
    #[display("rate limit exceeded for {provider}")]
    RateLimit { provider: String },
    #[display("{provider} returned no data for {symbol}")]
    NoData { provider: String, symbol: String },
    #[display("all market data sources failed for {symbol}")]
    Exhausted { symbol: String },
}

#[derive(Debug, Display, Error)]
pub enum IndicatorError {
    #[display("{indicator} requires a non-empty price series")]
    EmptySeries { indicator: String },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
}
