// =============================================================================
// Average True Range (ATR) — Wilder's smoothing
// =============================================================================
//
// Volatility measure sizing the stop-loss distance. True Range per bar:
//
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
//
// smoothed with Wilder's recursion:
//
//   ATR_0 = SMA of the first `period` TR values
//   ATR_t = (ATR_{t-1} * (period - 1) + TR_t) / period

use crate::types::Bar;

/// Compute the ATR series over `bars` (oldest first).
///
/// The result has `bars.len() - period` elements, the first aligned to input
/// index `period` (each TR needs the previous bar's close, so the series
/// starts one bar later than an SMA of the same period would).
///
/// # Edge cases
/// - `period == 0` or fewer than `period + 1` bars => empty vec
/// - Non-finite TR or smoothed value truncates the series at that point.
pub fn calculate_atr(bars: &[Bar], period: usize) -> Vec<f64> {
    if period == 0 || bars.len() < period + 1 {
        return Vec::new();
    }

    let true_ranges: Vec<f64> = bars
        .windows(2)
        .map(|w| {
            let hl = w[1].high - w[1].low;
            let hc = (w[1].high - w[0].close).abs();
            let lc = (w[1].low - w[0].close).abs();
            hl.max(hc).max(lc)
        })
        .collect();

    let seed: f64 = true_ranges[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let period_f = period as f64;
    let mut series = Vec::with_capacity(true_ranges.len() - period + 1);
    series.push(seed);

    let mut atr = seed;
    for &tr in &true_ranges[period..] {
        atr = (atr * (period_f - 1.0) + tr) / period_f;
        if !atr.is_finite() {
            break;
        }
        series.push(atr);
    }

    series
}
