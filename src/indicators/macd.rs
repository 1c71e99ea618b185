// =============================================================================
// Moving Average Convergence/Divergence (MACD)
// =============================================================================
//
// Classic three-part construction:
//
//   macd_line   = EMA(fast) - EMA(slow)
//   macd_signal = EMA(signal) of macd_line
//   macd_hist   = macd_line - macd_signal
//
// The histogram is what the classifier and scorer consume: its sign tracks
// which side momentum is on, its slope whether momentum is building.

use crate::indicators::ema::calculate_ema;

/// MACD output, all three series equal length and mutually aligned.
///
/// `first_index` is the index into the input closes of element 0; for the
/// standard (12, 26, 9) parameters that is 33.
#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub first_index: usize,
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub hist: Vec<f64>,
}

/// Compute MACD over `closes`.
///
/// Returns `None` when the parameters are degenerate (`fast >= slow`, any
/// period zero) or the input is too short to produce a single aligned
/// (line, signal, hist) triple — `slow + signal_period - 1` closes minimum.
pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Option<MacdSeries> {
    if fast == 0 || signal_period == 0 || fast >= slow {
        return None;
    }
    if closes.len() < slow + signal_period - 1 {
        return None;
    }

    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);
    if ema_slow.is_empty() {
        return None;
    }

    // Difference the two EMAs over their overlap. ema_fast leads ema_slow by
    // (slow - fast) elements; a NaN-truncated fast series bounds the overlap.
    let lead = slow - fast;
    let overlap = ema_slow.len().min(ema_fast.len().saturating_sub(lead));
    let line: Vec<f64> = (0..overlap)
        .map(|i| ema_fast[i + lead] - ema_slow[i])
        .collect();

    let signal = calculate_ema(&line, signal_period);
    if signal.is_empty() {
        return None;
    }

    // Drop the line's warm-up so all three series align element-for-element.
    let line: Vec<f64> = line[signal_period - 1..signal_period - 1 + signal.len()].to_vec();
    let hist: Vec<f64> = line
        .iter()
        .zip(signal.iter())
        .map(|(l, s)| l - s)
        .collect();

    Some(MacdSeries {
        first_index: slow + signal_period - 2,
        line,
        signal,
        hist,
    })
}
