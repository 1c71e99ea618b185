// =============================================================================
// Signals Module
// =============================================================================
//
// Signal derivation over the augmented indicator series:
// - Rule-based BUY/HOLD/SELL classification with exit-dominant tie-breaking
// - Five-factor weighted sentiment scoring with a display-ready breakdown

pub mod classifier;
pub mod sentiment;

pub use classifier::apply_signals;
pub use sentiment::{score_sentiment, FactorScore, SentimentLabel, SentimentReport};
