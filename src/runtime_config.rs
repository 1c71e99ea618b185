// =============================================================================
// Runtime Configuration — dashboard settings with atomic save
// =============================================================================
//
// Everything the caller tunes lives here: the scan universe, the ATR stop
// multiplier, history range, and the cache freshness windows. Persistence
// uses the atomic tmp + rename pattern, and every field carries a serde
// default so older config files keep loading as fields are added.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_tickers() -> Vec<String> {
    ["TSLA", "NVDA", "AVGO", "MU", "ORCL", "AMD", "PLTR"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_atr_multiplier() -> f64 {
    2.5
}

fn default_history_range() -> String {
    "6mo".to_string()
}

fn default_bar_interval() -> String {
    "1d".to_string()
}

fn default_bar_cache_ttl_secs() -> u64 {
    60
}

fn default_options_cache_ttl_secs() -> u64 {
    300
}

fn default_snapshot_path() -> String {
    "pc_snapshots.json".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3100".to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the dashboard backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// The scan universe and the tickers offered by the dashboard.
    #[serde(default = "default_tickers")]
    pub tickers: Vec<String>,

    /// ATR multiplier for the stop-loss distance; the engine clamps it to
    /// [1.5, 4.0].
    #[serde(default = "default_atr_multiplier")]
    pub atr_multiplier: f64,

    /// History range requested from the adapter (e.g. "6mo", "1y").
    #[serde(default = "default_history_range")]
    pub history_range: String,

    /// Bar interval requested from the adapter.
    #[serde(default = "default_bar_interval")]
    pub bar_interval: String,

    /// Freshness window for price/indicator fetches.
    #[serde(default = "default_bar_cache_ttl_secs")]
    pub bar_cache_ttl_secs: u64,

    /// Freshness window for options-chain fetches.
    #[serde(default = "default_options_cache_ttl_secs")]
    pub options_cache_ttl_secs: u64,

    /// Snapshot store file path.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,

    /// API bind address.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tickers: default_tickers(),
            atr_multiplier: default_atr_multiplier(),
            history_range: default_history_range(),
            bar_interval: default_bar_interval(),
            bar_cache_ttl_secs: default_bar_cache_ttl_secs(),
            options_cache_ttl_secs: default_options_cache_ttl_secs(),
            snapshot_path: default_snapshot_path(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error so the caller can fall back to defaults
    /// with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            tickers = ?config.tickers,
            atr_multiplier = config.atr_multiplier,
            "runtime config loaded"
        );
        Ok(config)
    }

    /// Persist the configuration atomically (tmp sibling, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialize config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }
}
