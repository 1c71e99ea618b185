// =============================================================================
// Pipeline error taxonomy
// =============================================================================
//
// The indicator/classifier/options pipeline reports failure as a typed value,
// never as a panic. Infrastructure seams (HTTP, filesystem) keep using anyhow
// internally; anything crossing into the pipeline is folded into
// `FetchFailure` so callers see one closed set of outcomes.

use thiserror::Error;

/// Every way a per-ticker analysis can fail.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The bar series is too short for the indicator windows.
    #[error("insufficient history: {got} bars, need at least {need}")]
    InsufficientData { got: usize, need: usize },

    /// The ticker has no listed options at all.
    #[error("{0} has no listed options")]
    NoOptionsData(String),

    /// Options exist but none expire inside the near-term window.
    #[error("{ticker} has no expirations within {window_days} days")]
    NoNearTermExpirations { ticker: String, window_days: i64 },

    /// Every near-term chain reported zero call and zero put volume.
    #[error("no option volume traded today for {0}")]
    NoOptionVolume(String),

    /// The market data adapter failed; the inner message is opaque.
    #[error("fetch failed: {0}")]
    FetchFailure(String),

    /// Live options data is unavailable and no snapshot exists to fall back on.
    #[error("no cached snapshot available for {0}")]
    SnapshotUnavailable(String),

    /// A critical field was null, NaN, or otherwise unusable.
    #[error("malformed market data: {0}")]
    MalformedData(String),
}

impl From<anyhow::Error> for AnalysisError {
    fn from(err: anyhow::Error) -> Self {
        Self::FetchFailure(format!("{err:#}"))
    }
}
