use std::sync::Arc;

use error_stack::Report;
use tracing::{info, warn};

use crate::error::SourceError;
use crate::model::{self, Candle, ForexPair, SourceKind, TimeFrame};
use crate::source::MarketDataSource;

/// Ordered list of sources; the first one to return usable candles wins.
pub struct FallbackChain {
    sources: Vec<Arc<dyn MarketDataSource>>,
}

impl FallbackChain {
    pub fn new(sources: Vec<Arc<dyn MarketDataSource>>) -> Self {
        Self { sources }
    }

    /// Fetch sanitized candles from the first source that yields any.
    pub async fn fetch(
        &self,
        pair: &ForexPair,
        timeframe: TimeFrame,
        limit: usize,
    ) -> Result<(SourceKind, Vec<Candle>), Report<SourceError>> {
        let mut failures = Vec::new();

        for source in &self.sources {
            let kind = source.kind();
            match source.fetch_candles(pair, timeframe, limit).await {
                Ok(raw) => {
                    let candles = model::sanitize(&raw);
                    if candles.is_empty() {
                        warn!(source = %kind, symbol = %pair, "source returned no usable candles");
                        failures.push(format!("{kind}: no usable candles"));
                        continue;
                    }
                    info!(
                        source = %kind,
                        symbol = %pair,
                        timeframe = %timeframe,
                        candles = candles.len(),
                        "market data fetched"
                    );
                    return Ok((kind, candles));
                }
                Err(report) => {
                    warn!(source = %kind, symbol = %pair, error = ?report, "source failed, trying next");
                    failures.push(format!("{kind}: {}", report.current_context()));
                }
            }
        }

        let mut report = Report::new(SourceError::Exhausted {
            symbol: pair.to_string(),
        });
        for failure in failures {
            report = report.attach(failure);
        }
        Err(report)
    }
}
