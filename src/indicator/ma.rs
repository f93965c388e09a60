use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::Indicator;

/// Simple Moving Average of the trailing `period` prices.
///
/// Yields `None` when the series is shorter than the period, so callers skip
/// any rule that depends on it.
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "sma period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }
}

impl Indicator for Sma {
    type Output = Option<f64>;

    fn name(&self) -> &str {
        "sma"
    }

    fn required_len(&self) -> usize {
        self.period
    }

    fn compute(&self, prices: &[f64]) -> Result<Option<f64>, Report<IndicatorError>> {
        if prices.len() < self.period {
            return Ok(None);
        }
        let window = &prices[prices.len() - self.period..];
        Ok(Some(window.iter().sum::<f64>() / self.period as f64))
    }
}

/// Exponential Moving Average seeded with the first price of the series.
pub struct Ema {
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "ema period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }

    fn smoothing(&self) -> f64 {
        2.0 / (self.period as f64 + 1.0)
    }

    /// Running EMA at every index of `prices`.
    pub fn series(&self, prices: &[f64]) -> Result<Vec<f64>, Report<IndicatorError>> {
        let Some((&seed, rest)) = prices.split_first() else {
            bail!(IndicatorError::EmptySeries {
                indicator: self.name().into(),
            });
        };

        let k = self.smoothing();
        let mut ema = seed;
        let mut results = Vec::with_capacity(prices.len());
        results.push(ema);
        for &price in rest {
            ema = price * k + ema * (1.0 - k);
            results.push(ema);
        }
        Ok(results)
    }
}

impl Indicator for Ema {
    type Output = f64;

    fn name(&self) -> &str {
        "ema"
    }

    /// The seed makes any non-empty series usable.
    fn required_len(&self) -> usize {
        1
    }

    fn compute(&self, prices: &[f64]) -> Result<f64, Report<IndicatorError>> {
        let Some((&seed, rest)) = prices.split_first() else {
            bail!(IndicatorError::EmptySeries {
                indicator: self.name().into(),
            });
        };

        let k = self.smoothing();
        Ok(rest
            .iter()
            .fold(seed, |ema, &price| price * k + ema * (1.0 - k)))
    }
}
