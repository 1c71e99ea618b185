// =============================================================================
// Indicator Engine — raw bars in, augmented IndicatorRow series out
// =============================================================================
//
// Pipeline (dependency order):
//   1. Forward-fill non-finite fields; drop leading rows with no usable close
//   2. Gate on the 50-bar history minimum
//   3. EMA(8), EMA(21), MACD(12, 26, 9), volume SMA(10), ATR(14), RSI(14)
//   4. stop_loss = close - ATR * multiplier, multiplier clamped to [1.5, 4.0]
//   5. Classifier pass to populate per-row signals
//
// Pure transform: the input series is never mutated and no state survives the
// call, so per-ticker invocations are safe to run concurrently.

use tracing::warn;

use crate::errors::AnalysisError;
use crate::indicators::atr::calculate_atr;
use crate::indicators::ema::calculate_ema;
use crate::indicators::macd::calculate_macd;
use crate::indicators::rsi::calculate_rsi;
use crate::indicators::sma::calculate_sma;
use crate::signals::classifier;
use crate::types::{Bar, IndicatorRow};

/// Minimum bar count for a valid indicator computation.
pub const MIN_HISTORY_BARS: usize = 50;

/// Fast/slow trend EMAs.
const EMA_FAST_PERIOD: usize = 8;
const EMA_SLOW_PERIOD: usize = 21;

/// MACD parameters.
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;

/// Volume baseline window.
const VOLUME_SMA_PERIOD: usize = 10;

/// Volatility and momentum windows.
const ATR_PERIOD: usize = 14;
const RSI_PERIOD: usize = 14;

/// Accepted stop-loss multiplier range; out-of-range input is clamped.
pub const ATR_MULTIPLIER_MIN: f64 = 1.5;
pub const ATR_MULTIPLIER_MAX: f64 = 4.0;

/// Augment a bar series with the full indicator column set and per-row
/// signals.
///
/// Fails with `InsufficientData` when fewer than [`MIN_HISTORY_BARS`] usable
/// bars remain after forward-filling; never returns a partial frame.
pub fn compute_indicators(
    bars: &[Bar],
    atr_multiplier: f64,
) -> Result<Vec<IndicatorRow>, AnalysisError> {
    let bars = forward_fill(bars);
    if bars.len() < MIN_HISTORY_BARS {
        return Err(AnalysisError::InsufficientData {
            got: bars.len(),
            need: MIN_HISTORY_BARS,
        });
    }

    let multiplier = clamp_multiplier(atr_multiplier);

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    let ema_fast = calculate_ema(&closes, EMA_FAST_PERIOD);
    let ema_slow = calculate_ema(&closes, EMA_SLOW_PERIOD);
    let macd = calculate_macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
    let volume_sma = calculate_sma(&volumes, VOLUME_SMA_PERIOD);
    let atr = calculate_atr(&bars, ATR_PERIOD);
    let rsi = calculate_rsi(&closes, RSI_PERIOD);

    let mut rows: Vec<IndicatorRow> = bars.into_iter().map(IndicatorRow::from_bar).collect();

    place(&mut rows, &ema_fast, EMA_FAST_PERIOD - 1, |r, v| {
        r.ema_fast = Some(v)
    });
    place(&mut rows, &ema_slow, EMA_SLOW_PERIOD - 1, |r, v| {
        r.ema_slow = Some(v)
    });
    if let Some(macd) = macd {
        place(&mut rows, &macd.line, macd.first_index, |r, v| {
            r.macd_line = Some(v)
        });
        place(&mut rows, &macd.signal, macd.first_index, |r, v| {
            r.macd_signal = Some(v)
        });
        place(&mut rows, &macd.hist, macd.first_index, |r, v| {
            r.macd_hist = Some(v)
        });
    }
    place(&mut rows, &volume_sma, VOLUME_SMA_PERIOD - 1, |r, v| {
        r.volume_sma = Some(v)
    });
    place(&mut rows, &atr, ATR_PERIOD, |r, v| r.atr = Some(v));
    place(&mut rows, &rsi, RSI_PERIOD, |r, v| r.rsi = Some(v));

    for row in rows.iter_mut() {
        if let Some(atr) = row.atr {
            row.stop_loss = Some(row.bar.close - atr * multiplier);
        }
    }

    classifier::apply_signals(&mut rows);
    Ok(rows)
}

/// Copy an aligned indicator series into the row set starting at `offset`.
fn place<F: Fn(&mut IndicatorRow, f64)>(
    rows: &mut [IndicatorRow],
    series: &[f64],
    offset: usize,
    set: F,
) {
    for (j, &v) in series.iter().enumerate() {
        if let Some(row) = rows.get_mut(offset + j) {
            set(row, v);
        }
    }
}

/// Clamp the caller-supplied stop multiplier into the accepted range.
fn clamp_multiplier(m: f64) -> f64 {
    if !m.is_finite() {
        warn!(multiplier = m, "non-finite ATR multiplier, using minimum");
        return ATR_MULTIPLIER_MIN;
    }
    if m < ATR_MULTIPLIER_MIN || m > ATR_MULTIPLIER_MAX {
        let clamped = m.clamp(ATR_MULTIPLIER_MIN, ATR_MULTIPLIER_MAX);
        warn!(multiplier = m, clamped, "ATR multiplier outside [1.5, 4.0], clamped");
        return clamped;
    }
    m
}

/// Forward-fill non-finite bar fields from the previous row.
///
/// Rows before the first finite close are dropped (there is nothing to fill
/// from); interior and trailing rows are always kept, patched from their
/// predecessor.
fn forward_fill(bars: &[Bar]) -> Vec<Bar> {
    let mut filled: Vec<Bar> = Vec::with_capacity(bars.len());

    for bar in bars {
        match filled.last() {
            None => {
                if bar.close.is_finite() {
                    let mut b = bar.clone();
                    // A leading bar may still carry broken ancillary fields.
                    if !b.open.is_finite() {
                        b.open = b.close;
                    }
                    if !b.high.is_finite() {
                        b.high = b.close;
                    }
                    if !b.low.is_finite() {
                        b.low = b.close;
                    }
                    if !b.volume.is_finite() {
                        b.volume = 0.0;
                    }
                    filled.push(b);
                }
            }
            Some(prev) => {
                let mut b = bar.clone();
                if !b.open.is_finite() {
                    b.open = prev.open;
                }
                if !b.high.is_finite() {
                    b.high = prev.high;
                }
                if !b.low.is_finite() {
                    b.low = prev.low;
                }
                if !b.close.is_finite() {
                    b.close = prev.close;
                }
                if !b.volume.is_finite() {
                    b.volume = prev.volume;
                }
                filled.push(b);
            }
        }
    }

    filled
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// Gently trending series with enough history for every window.
    fn sample_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let base = 100.0 + i as f64 * 0.5 + (i as f64 * 0.7).sin() * 2.0;
                Bar {
                    date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
                        + chrono::Duration::days(i as i64),
                    open: base - 0.3,
                    high: base + 1.5,
                    low: base - 1.5,
                    close: base,
                    volume: 900_000.0 + (i as f64 * 1.3).cos() * 50_000.0,
                }
            })
            .collect()
    }

    #[test]
    fn short_series_fails_with_insufficient_data() {
        for n in [0, 1, 10, 49] {
            let bars = sample_bars(n);
            match compute_indicators(&bars, 2.5) {
                Err(AnalysisError::InsufficientData { got, need }) => {
                    assert_eq!(got, n);
                    assert_eq!(need, MIN_HISTORY_BARS);
                }
                other => panic!("expected InsufficientData for {n} bars, got {other:?}"),
            }
        }
    }

    #[test]
    fn fifty_bars_is_exactly_enough() {
        let rows = compute_indicators(&sample_bars(50), 2.5).unwrap();
        assert_eq!(rows.len(), 50);
        let last = rows.last().unwrap();
        assert!(last.ema_fast.is_some());
        assert!(last.ema_slow.is_some());
        assert!(last.macd_hist.is_some());
        assert!(last.volume_sma.is_some());
        assert!(last.atr.is_some());
        assert!(last.stop_loss.is_some());
        assert!(last.rsi.is_some());
    }

    #[test]
    fn stop_loss_is_exact_for_every_row_and_multiplier() {
        let bars = sample_bars(80);
        for multiplier in [1.5, 2.0, 2.5, 3.3, 4.0] {
            let rows = compute_indicators(&bars, multiplier).unwrap();
            for row in &rows {
                match (row.atr, row.stop_loss) {
                    (Some(atr), Some(stop)) => {
                        assert_eq!(stop, row.bar.close - atr * multiplier);
                    }
                    (None, None) => {}
                    other => panic!("atr/stop_loss presence mismatch: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn out_of_range_multiplier_is_clamped() {
        let bars = sample_bars(60);
        let wide = compute_indicators(&bars, 10.0).unwrap();
        let max = compute_indicators(&bars, 4.0).unwrap();
        assert_eq!(
            wide.last().unwrap().stop_loss,
            max.last().unwrap().stop_loss
        );

        let tight = compute_indicators(&bars, 0.1).unwrap();
        let min = compute_indicators(&bars, 1.5).unwrap();
        assert_eq!(
            tight.last().unwrap().stop_loss,
            min.last().unwrap().stop_loss
        );
    }

    #[test]
    fn no_look_ahead_in_any_column() {
        // Row i must be identical whether or not later bars exist.
        let bars = sample_bars(90);
        let full = compute_indicators(&bars, 2.5).unwrap();
        let prefix = compute_indicators(&bars[..60], 2.5).unwrap();

        let a = &full[59];
        let b = &prefix[59];
        assert_eq!(a.ema_fast, b.ema_fast);
        assert_eq!(a.ema_slow, b.ema_slow);
        assert_eq!(a.macd_hist, b.macd_hist);
        assert_eq!(a.atr, b.atr);
        assert_eq!(a.volume_sma, b.volume_sma);
        assert_eq!(a.rsi, b.rsi);
        assert_eq!(a.stop_loss, b.stop_loss);
    }

    #[test]
    fn warm_up_rows_have_no_derived_columns() {
        let rows = compute_indicators(&sample_bars(60), 2.5).unwrap();
        assert!(rows[0].ema_fast.is_none());
        assert!(rows[EMA_FAST_PERIOD - 2].ema_fast.is_none());
        assert!(rows[EMA_FAST_PERIOD - 1].ema_fast.is_some());
        assert!(rows[MACD_SLOW + MACD_SIGNAL - 3].macd_hist.is_none());
        assert!(rows[MACD_SLOW + MACD_SIGNAL - 2].macd_hist.is_some());
        assert!(rows[ATR_PERIOD - 1].atr.is_none());
        assert!(rows[ATR_PERIOD].atr.is_some());
    }

    #[test]
    fn interior_nans_are_forward_filled_not_dropped() {
        let mut bars = sample_bars(60);
        let prev_close = bars[29].close;
        bars[30].close = f64::NAN;
        bars[30].volume = f64::NAN;

        let rows = compute_indicators(&bars, 2.5).unwrap();
        assert_eq!(rows.len(), 60);
        assert_eq!(rows[30].bar.close, prev_close);
        assert_eq!(rows[30].bar.volume, bars[29].volume);
    }

    #[test]
    fn leading_unpriced_rows_are_dropped() {
        let mut bars = sample_bars(55);
        bars[0].close = f64::NAN;
        bars[1].close = f64::NAN;

        // 53 usable bars remain, still above the gate.
        let rows = compute_indicators(&bars, 2.5).unwrap();
        assert_eq!(rows.len(), 53);
        assert_eq!(rows[0].bar.date, bars[2].date);
    }
}
