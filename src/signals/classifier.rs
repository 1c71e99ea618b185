// =============================================================================
// Signal Classifier — rule-based BUY/HOLD/SELL over consecutive rows
// =============================================================================
//
// Entry rule (all must hold):
//   close > EMA_fast, EMA_fast > EMA_slow, MACD hist > 0 and rising,
//   volume > volume SMA * 1.2
//
// Exit rule (either suffices): close < EMA_slow, or MACD hist < 0.
//
// The exit rule is evaluated AFTER the entry rule and overwrites it. A row
// can satisfy both; risk signals dominate entries, so such a row is SELL.

use crate::types::{IndicatorRow, Signal};

/// Volume surge threshold relative to the volume SMA baseline.
pub const VOLUME_SURGE_RATIO: f64 = 1.2;

/// Classify every row in place against its predecessor.
///
/// Rows whose required columns are still warming up stay HOLD.
pub fn apply_signals(rows: &mut [IndicatorRow]) {
    for i in 0..rows.len() {
        let prev_hist = if i > 0 { rows[i - 1].macd_hist } else { None };
        rows[i].signal = classify(&rows[i], prev_hist);
    }
}

/// Classify a single row given the previous row's MACD histogram.
pub fn classify(row: &IndicatorRow, prev_macd_hist: Option<f64>) -> Signal {
    let (Some(ema_fast), Some(ema_slow), Some(hist), Some(volume_sma)) =
        (row.ema_fast, row.ema_slow, row.macd_hist, row.volume_sma)
    else {
        return Signal::Hold;
    };

    let momentum_building = prev_macd_hist.map(|prev| hist > prev).unwrap_or(false);

    let entry = row.bar.close > ema_fast
        && ema_fast > ema_slow
        && hist > 0.0
        && momentum_building
        && row.bar.volume > volume_sma * VOLUME_SURGE_RATIO;

    let mut signal = if entry { Signal::Buy } else { Signal::Hold };

    // Exit mask applied last: overrides a simultaneously-true entry.
    if row.bar.close < ema_slow || hist < 0.0 {
        signal = Signal::Sell;
    }

    signal
}
