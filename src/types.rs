// =============================================================================
// Shared types used across the AlphaDesk signal terminal
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily OHLCV bar, the raw unit delivered by the market data adapter.
///
/// Series are always ordered ascending by `date`. Volume is carried as `f64`
/// because adapters report it that way and the pipeline only ever compares or
/// averages it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// The discrete trading signal produced by the classifier.
///
/// Never persisted — always recomputed from the two most recent rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Hold,
    Sell,
}

impl Default for Signal {
    fn default() -> Self {
        Self::Hold
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Hold => write!(f, "HOLD"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Where the options sentiment in a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Snapshot,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// A bar augmented with derived indicator columns and the per-row signal.
///
/// `None` marks the warm-up region of each indicator window; values at row i
/// depend only on bars at indices <= i. Wherever `atr` is present,
/// `stop_loss == close - atr * atr_multiplier` holds exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorRow {
    #[serde(flatten)]
    pub bar: Bar,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub atr: Option<f64>,
    pub stop_loss: Option<f64>,
    pub volume_sma: Option<f64>,
    pub rsi: Option<f64>,
    pub signal: Signal,
}

impl IndicatorRow {
    /// A row with every derived column unset and a HOLD signal.
    pub fn from_bar(bar: Bar) -> Self {
        Self {
            bar,
            ema_fast: None,
            ema_slow: None,
            macd_line: None,
            macd_signal: None,
            macd_hist: None,
            atr: None,
            stop_loss: None,
            volume_sma: None,
            rsi: None,
            signal: Signal::Hold,
        }
    }
}

/// A single listed option contract as the adapter reports it: the strike and
/// the volume traded today. Chains are ordered ascending by strike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionContract {
    pub strike: f64,
    #[serde(default)]
    pub volume: f64,
}

/// The call and put sides of one expiration's chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionChain {
    pub calls: Vec<OptionContract>,
    pub puts: Vec<OptionContract>,
}

impl OptionChain {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.puts.is_empty()
    }
}
