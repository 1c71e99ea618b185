// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Weights recent closes more heavily than old ones:
//
//   k     = 2 / (period + 1)
//   EMA_t = value_t * k + EMA_{t-1} * (1 - k)
//
// Seeded with the SMA of the first `period` values, so the first output
// element corresponds to input index `period - 1`.

/// Compute the EMA series over `values` with the given look-back `period`.
///
/// The result has `values.len() - period + 1` elements, the first aligned to
/// input index `period - 1`.
///
/// # Edge cases
/// - `period == 0` or `values.len() < period` => empty vec
/// - A non-finite seed => empty vec
/// - A non-finite smoothed value truncates the series at that point; a broken
///   tail must not masquerade as data.
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);

    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let mut series = Vec::with_capacity(values.len() - period + 1);
    series.push(seed);

    let mut ema = seed;
    for &v in &values[period..] {
        ema = v * k + ema * (1.0 - k);
        if !ema.is_finite() {
            break;
        }
        series.push(ema);
    }

    series
}
