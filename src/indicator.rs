pub mod ma;
pub mod macd;
pub mod rsi;
pub mod trend;
pub mod volume;

use error_stack::Report;

use crate::error::IndicatorError;
use crate::model::Candle;

/// A technical indicator evaluated over a price series.
///
/// Prices must be in ascending chronological order (oldest first). Every
/// indicator reads the trailing end of the series and produces one value.
pub trait Indicator {
    type Output;

    /// Unique name of this indicator (e.g., "rsi", "sma").
    fn name(&self) -> &str;

    /// Number of prices needed for a real reading. Shorter series yield the
    /// indicator's neutral output instead of an error.
    fn required_len(&self) -> usize;

    fn compute(&self, prices: &[f64]) -> Result<Self::Output, Report<IndicatorError>>;
}

/// Extract close prices from a slice of candles.
pub fn close_prices(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Extract volumes from a slice of candles.
pub fn volumes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.volume).collect()
}

/// Percent change between the last close and the close `lookback` bars earlier.
///
/// Returns 0 when the series is too short or the reference price is not positive.
pub fn price_change_pct(prices: &[f64], lookback: usize) -> f64 {
    let Some(last) = prices.last().copied() else {
        return 0.0;
    };
    let Some(past) = prices.len().checked_sub(lookback + 1).map(|i| prices[i]) else {
        return 0.0;
    };
    if past <= 0.0 {
        return 0.0;
    }
    (last - past) / past * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_change_uses_lookback() {
        let prices = [100.0, 101.0, 102.0, 103.0, 104.0, 110.0];
        assert!((price_change_pct(&prices, 5) - 10.0).abs() < 1e-9);
        assert!((price_change_pct(&prices, 1) - (6.0 / 104.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn price_change_short_series_is_zero() {
        assert_eq!(price_change_pct(&[1.0, 2.0], 5), 0.0);
        assert_eq!(price_change_pct(&[], 1), 0.0);
    }
}
