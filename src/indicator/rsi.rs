use error_stack::{Report, bail};
use serde::Deserialize;

use crate::error::IndicatorError;
use crate::indicator::Indicator;

/// Reading returned when RSI has no opinion (short or flat series).
pub const NEUTRAL_RSI: f64 = 50.0;
/// Stand-in average loss when the window has no losing bar.
const LOSS_EPSILON: f64 = 0.001;

/// Which `period + 1` samples the RSI window covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsiWindow {
    /// The most recent samples, walked oldest to newest.
    #[default]
    Trailing,
    /// The first samples of the series.
    Leading,
}

/// RSI over a single window of simple-averaged gains and losses.
pub struct Rsi {
    period: usize,
    window: RsiWindow,
}

impl Rsi {
    pub fn new(period: usize, window: RsiWindow) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "rsi period must be > 0".into(),
            });
        }
        Ok(Self { period, window })
    }
}

impl Indicator for Rsi {
    type Output = f64;

    fn name(&self) -> &str {
        "rsi"
    }

    fn required_len(&self) -> usize {
        self.period + 1
    }

    fn compute(&self, prices: &[f64]) -> Result<f64, Report<IndicatorError>> {
        let needed = self.required_len();
        if prices.len() < needed {
            return Ok(NEUTRAL_RSI);
        }

        let window = match self.window {
            RsiWindow::Trailing => &prices[prices.len() - needed..],
            RsiWindow::Leading => &prices[..needed],
        };

        let (gains, losses) = window.windows(2).fold((0.0, 0.0), |(g, l), w| {
            let change = w[1] - w[0];
            if change > 0.0 { (g + change, l) } else { (g, l - change) }
        });

        if gains == 0.0 && losses == 0.0 {
            return Ok(NEUTRAL_RSI);
        }

        let period = self.period as f64;
        let avg_gain = gains / period;
        let avg_loss = if losses == 0.0 {
            LOSS_EPSILON
        } else {
            losses / period
        };

        let rs = avg_gain / avg_loss;
        Ok(100.0 - 100.0 / (1.0 + rs))
    }
}
