pub mod binance;
pub mod chain;
pub mod yahoo;

use std::time::Duration;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;

use crate::config::SourcesConfig;
use crate::error::SourceError;
use crate::model::{Candle, ForexPair, SourceKind, TimeFrame};

/// A provider of historical candles for forex pairs.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn MarketDataSource`).
pub trait MarketDataSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch up to `limit` candles, oldest first.
    fn fetch_candles(
        &self,
        pair: &ForexPair,
        timeframe: TimeFrame,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<Candle>, Report<SourceError>>>;
}

/// HTTP client shared by the REST sources: configured timeout and user agent.
fn http_client(
    config: &SourcesConfig,
    kind: SourceKind,
) -> Result<reqwest::Client, Report<SourceError>> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(config.user_agent.as_str())
        .build()
        .change_context(SourceError::Client {
            provider: kind.to_string(),
        })
}
