// =============================================================================
// Central Application State — AlphaDesk backend
// =============================================================================
//
// Ties the subsystems together for the API layer: configuration behind a
// read/write lock, the analyzer (provider + caches + snapshot store), and a
// capped ring of recent errors for the dashboard's diagnostics panel.
//
// Thread safety:
//   - AtomicU64 for lock-free version tracking.
//   - parking_lot::RwLock for mutable shared collections.
//   - The analyzer's caches and the snapshot store serialize themselves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::analysis::Analyzer;
use crate::market_data::MarketDataProvider;
use crate::runtime_config::RuntimeConfig;
use crate::snapshot::SnapshotStore;

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Shared state behind every API handler.
pub struct AppState {
    /// Monotonically increasing version counter, bumped on every meaningful
    /// mutation so pollers can detect changes cheaply.
    pub state_version: AtomicU64,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,
    pub snapshots: Arc<SnapshotStore>,
    pub analyzer: Analyzer,

    pub recent_errors: RwLock<Vec<ErrorRecord>>,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct the state from configuration and a market data provider.
    pub fn new(config: RuntimeConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        let snapshots = Arc::new(SnapshotStore::new(config.snapshot_path.clone()));
        let analyzer = Analyzer::new(
            provider,
            snapshots.clone(),
            Duration::from_secs(config.bar_cache_ttl_secs),
            Duration::from_secs(config.options_cache_ttl_secs),
        );

        Self {
            state_version: AtomicU64::new(1),
            runtime_config: Arc::new(RwLock::new(config)),
            snapshots,
            analyzer,
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    /// Record an error message; oldest entries are evicted past the cap.
    pub fn push_error(&self, message: String) {
        let record = ErrorRecord {
            message,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }
}
