use error_stack::{Report, bail};
use serde::Deserialize;

use crate::error::IndicatorError;
use crate::indicator::Indicator;
use crate::indicator::ma::Ema;

/// How the MACD signal line is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacdMode {
    /// EMAs over the trailing fast/slow windows; the signal line is the EMA of
    /// the single latest MACD value, so it equals the MACD and the histogram is 0.
    #[default]
    Collapsed,
    /// Conventional MACD: running EMAs over the whole series and a signal EMA
    /// over the MACD line.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
    mode: MacdMode,
}

impl Macd {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
        mode: MacdMode,
    ) -> Result<Self, Report<IndicatorError>> {
        if fast_period == 0 || slow_period == 0 || signal_period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "all macd periods must be > 0".into(),
            });
        }
        if fast_period >= slow_period {
            bail!(IndicatorError::InvalidParameter {
                name: "fast_period must be < slow_period".into(),
            });
        }
        Ok(Self {
            fast_period,
            slow_period,
            signal_period,
            mode,
        })
    }

    /// 12/26/9 MACD.
    pub fn standard(mode: MacdMode) -> Result<Self, Report<IndicatorError>> {
        Self::new(12, 26, 9, mode)
    }

    fn collapsed(&self, prices: &[f64]) -> Result<MacdValue, Report<IndicatorError>> {
        let len = prices.len();
        let fast = Ema::new(self.fast_period)?.compute(&prices[len - self.fast_period..])?;
        let slow = Ema::new(self.slow_period)?.compute(&prices[len - self.slow_period..])?;
        let macd = fast - slow;
        let signal = Ema::new(self.signal_period)?.compute(&[macd])?;
        Ok(MacdValue {
            macd,
            signal,
            histogram: macd - signal,
        })
    }

    fn full(&self, prices: &[f64]) -> Result<MacdValue, Report<IndicatorError>> {
        let fast = Ema::new(self.fast_period)?.series(prices)?;
        let slow = Ema::new(self.slow_period)?.series(prices)?;

        // The line starts once the slow EMA has seen a full window.
        let macd_line: Vec<f64> = fast
            .iter()
            .zip(slow.iter())
            .skip(self.slow_period - 1)
            .map(|(f, s)| f - s)
            .collect();

        let Some(&macd) = macd_line.last() else {
            bail!(IndicatorError::EmptySeries {
                indicator: self.name().into(),
            });
        };
        let signal = Ema::new(self.signal_period)?.compute(&macd_line)?;
        Ok(MacdValue {
            macd,
            signal,
            histogram: macd - signal,
        })
    }
}

impl Indicator for Macd {
    type Output = MacdValue;

    fn name(&self) -> &str {
        "macd"
    }

    fn required_len(&self) -> usize {
        self.slow_period
    }

    fn compute(&self, prices: &[f64]) -> Result<MacdValue, Report<IndicatorError>> {
        if prices.len() < self.required_len() {
            return Ok(MacdValue::default());
        }
        match self.mode {
            MacdMode::Collapsed => self.collapsed(prices),
            MacdMode::Full => self.full(prices),
        }
    }
}
