/// Number of trailing closes inspected by [`trend_strength`].
pub const TREND_WINDOW: usize = 10;
const NEUTRAL_TREND: f64 = 0.5;

/// Fraction of rising bars among the trailing [`TREND_WINDOW`] closes.
///
/// A value near 1 means nearly every bar closed higher, near 0 means no bar
/// did (falling or flat market). Short series are neutral.
pub fn trend_strength(prices: &[f64]) -> f64 {
    if prices.len() < TREND_WINDOW {
        return NEUTRAL_TREND;
    }
    let window = &prices[prices.len() - TREND_WINDOW..];
    let rising = window.windows(2).filter(|w| w[1] > w[0]).count();
    rising as f64 / (TREND_WINDOW - 1) as f64
}
