// =============================================================================
// Sentiment Scorer — five-factor weighted bull/bear aggregation
// =============================================================================
//
// Each factor contributes a signed score plus a human-readable verdict the
// dashboard prints next to it. The options factor only participates when a
// put/call reading is available; it is omitted from the breakdown entirely
// rather than forced to zero, so a missing reading never dilutes the label.

use serde::{Deserialize, Serialize};

use crate::options::{PutCallSentiment, PC_BULLISH_BELOW, PC_SCORER_BEARISH_ABOVE};
use crate::types::IndicatorRow;

/// Five-level sentiment label derived from the total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    StrongBull,
    LeanBull,
    Balanced,
    LeanBear,
    StrongBear,
}

impl SentimentLabel {
    /// Map a total score onto the label bands.
    pub fn from_score(total: f64) -> Self {
        if total >= 2.5 {
            Self::StrongBull
        } else if total >= 1.0 {
            Self::LeanBull
        } else if total <= -2.5 {
            Self::StrongBear
        } else if total <= -1.0 {
            Self::LeanBear
        } else {
            Self::Balanced
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StrongBull => write!(f, "strong bull"),
            Self::LeanBull => write!(f, "lean bull"),
            Self::Balanced => write!(f, "balanced"),
            Self::LeanBear => write!(f, "lean bear"),
            Self::StrongBear => write!(f, "strong bear"),
        }
    }
}

/// One factor's contribution to the total score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorScore {
    pub factor: String,
    pub verdict: String,
    pub detail: String,
    pub score: f64,
}

/// The scored report handed to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentReport {
    pub total_score: f64,
    pub label: SentimentLabel,
    pub factors: Vec<FactorScore>,
}

/// Volume thresholds for the volume/price factor.
const VOLUME_EXPANSION: f64 = 1.2;
const VOLUME_CONTRACTION: f64 = 0.8;

/// Score the latest row against its predecessor, optionally folding in the
/// options put/call reading. Pure function; the ordered factor breakdown is
/// part of the output contract.
pub fn score_sentiment(
    current: &IndicatorRow,
    previous: &IndicatorRow,
    put_call: Option<&PutCallSentiment>,
) -> SentimentReport {
    let mut factors = Vec::with_capacity(5);

    factors.push(trend_factor(current));
    factors.push(momentum_factor(current, previous));
    if let Some(f) = rsi_factor(current) {
        factors.push(f);
    }
    factors.push(volume_factor(current));
    if let Some(pc) = put_call {
        factors.push(options_factor(pc));
    }

    let total_score: f64 = factors.iter().map(|f| f.score).sum();

    SentimentReport {
        total_score,
        label: SentimentLabel::from_score(total_score),
        factors,
    }
}

/// Factor 1 — moving-average structure.
fn trend_factor(row: &IndicatorRow) -> FactorScore {
    let close = row.bar.close;
    let (verdict, detail, score) = match (row.ema_fast, row.ema_slow) {
        (Some(fast), Some(slow)) if close > fast && fast > slow => (
            "bullish stack",
            format!("close {close:.2} above EMA8 {fast:.2} above EMA21 {slow:.2}"),
            1.0,
        ),
        (_, Some(slow)) if close < slow => (
            "trend broken",
            format!("close {close:.2} below EMA21 {slow:.2}"),
            -1.0,
        ),
        _ => ("consolidating", "averages not aligned".to_string(), 0.0),
    };
    FactorScore {
        factor: "moving_averages".into(),
        verdict: verdict.into(),
        detail,
        score,
    }
}

/// Factor 2 — MACD momentum.
fn momentum_factor(current: &IndicatorRow, previous: &IndicatorRow) -> FactorScore {
    let (verdict, detail, score) = match (current.macd_hist, previous.macd_hist) {
        (Some(hist), Some(prev)) if hist > 0.0 && hist > prev => (
            "accelerating",
            format!("histogram expanding, {prev:.3} -> {hist:.3}"),
            1.0,
        ),
        (Some(hist), _) if hist > 0.0 => (
            "advance weakening",
            format!("histogram positive at {hist:.3} but no longer expanding"),
            0.0,
        ),
        (Some(hist), _) => (
            "bear momentum",
            format!("histogram negative at {hist:.3}"),
            -1.0,
        ),
        (None, _) => ("unavailable", "histogram still warming up".to_string(), 0.0),
    };
    FactorScore {
        factor: "macd_momentum".into(),
        verdict: verdict.into(),
        detail,
        score,
    }
}

/// Factor 3 — RSI zone. Omitted when the column is absent.
fn rsi_factor(row: &IndicatorRow) -> Option<FactorScore> {
    let rsi = row.rsi?;
    let (verdict, score) = if rsi > 70.0 {
        ("overbought, extended rally", 0.5)
    } else if rsi > 50.0 {
        ("bullish zone", 1.0)
    } else if rsi >= 30.0 {
        ("bearish zone", -1.0)
    } else {
        ("oversold, washed out", -0.5)
    };
    Some(FactorScore {
        factor: "rsi_zone".into(),
        verdict: verdict.into(),
        detail: format!("RSI(14) at {rsi:.1}"),
        score,
    })
}

/// Factor 4 — volume/price relationship.
fn volume_factor(row: &IndicatorRow) -> FactorScore {
    let up_close = row.bar.close > row.bar.open;
    let (verdict, detail, score) = match row.volume_sma {
        Some(sma) if up_close && row.bar.volume > sma * VOLUME_EXPANSION => (
            "accumulation",
            format!("up close on {:.1}x average volume", row.bar.volume / sma),
            1.0,
        ),
        Some(sma) if up_close && row.bar.volume < sma * VOLUME_CONTRACTION => (
            "thin advance",
            format!("up close on only {:.1}x average volume", row.bar.volume / sma),
            0.0,
        ),
        Some(sma) if !up_close && row.bar.volume > sma * VOLUME_EXPANSION => (
            "distribution",
            format!("down close on {:.1}x average volume", row.bar.volume / sma),
            -1.0,
        ),
        _ => ("quiet tape", "no meaningful volume skew".to_string(), 0.0),
    };
    FactorScore {
        factor: "volume_price".into(),
        verdict: verdict.into(),
        detail,
        score,
    }
}

/// Factor 5 — options put/call flow. Present only when a reading exists.
fn options_factor(pc: &PutCallSentiment) -> FactorScore {
    let ratio = pc.ratio;
    let (verdict, score) = if ratio < PC_BULLISH_BELOW {
        ("calls dominating near-the-money flow", 1.0)
    } else if ratio > PC_SCORER_BEARISH_ABOVE {
        ("puts dominating near-the-money flow", -1.0)
    } else {
        ("balanced flow", 0.0)
    };
    FactorScore {
        factor: "options_flow".into(),
        verdict: verdict.into(),
        detail: format!(
            "P/C ratio {ratio:.2} ({:.0} puts / {:.0} calls)",
            pc.total_put_volume, pc.total_call_volume
        ),
        score,
    }
}
