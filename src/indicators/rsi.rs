// =============================================================================
// Relative Strength Index (RSI) — Wilder's smoothing
// =============================================================================
//
// Bounded [0, 100] momentum oscillator over close-to-close changes:
//
//   avg_gain_t = (avg_gain_{t-1} * (period - 1) + gain_t) / period
//   avg_loss_t = (avg_loss_{t-1} * (period - 1) + loss_t) / period
//   RSI        = 100 - 100 / (1 + avg_gain / avg_loss)
//
// Averages seed with the SMA of the first `period` gains/losses. The scorer
// reads the zones: > 70 overbought, < 30 oversold.

/// Compute the RSI series over `closes`.
///
/// The result has `closes.len() - period` elements, the first aligned to
/// input index `period` (the first `period` deltas are consumed by the seed).
///
/// # Edge cases
/// - `period == 0` or `closes.len() < period + 1` => empty vec
/// - All-gain input pins at 100, all-loss at 0, no movement at 50.
/// - A non-finite value truncates the series at that point.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let period_f = period as f64;

    let mut avg_gain = deltas[..period].iter().filter(|d| **d > 0.0).sum::<f64>() / period_f;
    let mut avg_loss = -deltas[..period].iter().filter(|d| **d < 0.0).sum::<f64>() / period_f;

    let mut series = Vec::with_capacity(deltas.len() - period + 1);
    match index_value(avg_gain, avg_loss) {
        Some(rsi) => series.push(rsi),
        None => return series,
    }

    for &delta in &deltas[period..] {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        match index_value(avg_gain, avg_loss) {
            Some(rsi) => series.push(rsi),
            None => break,
        }
    }

    series
}

/// Fold average gain/loss into an RSI value in [0, 100].
///
/// A flat market (both averages zero) reads as neutral 50; a loss-free market
/// pins at 100 instead of dividing by zero.
fn index_value(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };

    rsi.is_finite().then_some(rsi)
}
