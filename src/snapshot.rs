// =============================================================================
// Snapshot Store — daily put/call fallback records, one JSON file
// =============================================================================
//
// A single JSON object keyed by ticker symbol; each value is the most recent
// successful options-sentiment computation for that ticker. The file is the
// durable contract: field names and the `YYYY-MM-DD` date format must stay
// compatible with existing snapshot files.
//
// `save` is a whole-file read-modify-write, serialized by an internal mutex
// and flushed with the atomic tmp + rename pattern. `load` never errors: a
// missing file, unparseable content, or an absent key all read as `None` and
// the caller degrades to "no fallback available."
//
// The once-per-day / close-window capture policy is the CALLER's rule; the
// store accepts any save it is handed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::options::PutCallSentiment;

/// One persisted options-sentiment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub ticker: String,
    /// Session date, `YYYY-MM-DD` (NaiveDate's serde form).
    pub date: NaiveDate,
    /// Unix seconds at capture time.
    pub timestamp: i64,
    pub close_price: f64,
    pub pc_data: PutCallSentiment,
}

/// File-backed snapshot store, one instance per process.
pub struct SnapshotStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles; the file has no transactional
    /// guarantee of its own.
    write_lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored record for `ticker`, if any.
    pub fn load(&self, ticker: &str) -> Option<Snapshot> {
        let all = self.read_all()?;
        let snapshot = all.get(ticker).cloned();
        if snapshot.is_none() {
            debug!(ticker, "no snapshot on file");
        }
        snapshot
    }

    /// Persist a fresh record for `ticker`, stamped with the current UTC
    /// date and time, overwriting any previous one.
    pub fn save(&self, ticker: &str, close_price: f64, pc_data: &PutCallSentiment) -> Result<()> {
        let now = Utc::now();
        self.save_record(Snapshot {
            ticker: ticker.to_string(),
            date: now.date_naive(),
            timestamp: now.timestamp(),
            close_price,
            pc_data: pc_data.clone(),
        })
    }

    /// Persist a fully formed record (timestamping is the caller's choice).
    pub fn save_record(&self, snapshot: Snapshot) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut all = self.read_all().unwrap_or_default();
        let ticker = snapshot.ticker.clone();
        all.insert(ticker.clone(), snapshot);

        let content = serde_json::to_string_pretty(&all)
            .context("failed to serialize snapshot map to JSON")?;

        // Atomic write: tmp sibling first, then rename over the live file.
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp snapshot to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to rename tmp snapshot to {}", self.path.display()))?;

        info!(ticker, path = %self.path.display(), "snapshot saved");
        Ok(())
    }

    /// Parse the whole file; `None` on any missing/corrupt state.
    fn read_all(&self) -> Option<HashMap<String, Snapshot>> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(map) => Some(map),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "snapshot file unreadable, treating as empty");
                None
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_FILE_SEQ: AtomicU32 = AtomicU32::new(0);

    /// Unique temp path per test so parallel tests never share a file.
    fn temp_store() -> SnapshotStore {
        let seq = TEST_FILE_SEQ.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "alphadesk_snapshot_test_{}_{seq}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        SnapshotStore::new(path)
    }

    fn pc_fixture() -> PutCallSentiment {
        PutCallSentiment {
            ratio: 0.85,
            total_call_volume: 4_000.0,
            total_put_volume: 3_400.0,
            by_expiration: vec![crate::options::OptionChainSample {
                expiration: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
                call_volume: 4_000.0,
                put_volume: 3_400.0,
            }],
            skipped_expirations: vec![],
        }
    }

    #[test]
    fn save_then_load_round_trips_today() {
        let store = temp_store();
        store.save("TSLA", 250.0, &pc_fixture()).unwrap();

        let snapshot = store.load("TSLA").expect("record should exist");
        assert_eq!(snapshot.ticker, "TSLA");
        assert_eq!(snapshot.date, Utc::now().date_naive());
        assert_eq!(snapshot.close_price, 250.0);
        assert_eq!(snapshot.pc_data.ratio, 0.85);
        assert_eq!(snapshot.pc_data.total_call_volume, 4_000.0);
        assert_eq!(snapshot.pc_data.by_expiration.len(), 1);

        let _ = std::fs::remove_file(store.path());
    }

    #[test]
    fn missing_file_loads_none() {
        let store = temp_store();
        assert!(store.load("TSLA").is_none());
    }

    #[test]
    fn missing_key_loads_none() {
        let store = temp_store();
        store.save("NVDA", 900.0, &pc_fixture()).unwrap();
        assert!(store.load("TSLA").is_none());
        let _ = std::fs::remove_file(store.path());
    }

    #[test]
    fn corrupt_file_loads_none() {
        let store = temp_store();
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load("TSLA").is_none());
        let _ = std::fs::remove_file(store.path());
    }

    #[test]
    fn corrupt_file_is_replaced_on_next_save() {
        let store = temp_store();
        std::fs::write(store.path(), "garbage").unwrap();
        store.save("AMD", 120.0, &pc_fixture()).unwrap();
        assert!(store.load("AMD").is_some());
        let _ = std::fs::remove_file(store.path());
    }

    #[test]
    fn save_overwrites_only_its_own_ticker() {
        let store = temp_store();
        store.save("TSLA", 250.0, &pc_fixture()).unwrap();
        let mut other = pc_fixture();
        other.ratio = 1.4;
        store.save("NVDA", 900.0, &other).unwrap();

        let mut updated = pc_fixture();
        updated.ratio = 0.6;
        store.save("TSLA", 255.0, &updated).unwrap();

        assert_eq!(store.load("TSLA").unwrap().pc_data.ratio, 0.6);
        assert_eq!(store.load("TSLA").unwrap().close_price, 255.0);
        assert_eq!(store.load("NVDA").unwrap().pc_data.ratio, 1.4);
        let _ = std::fs::remove_file(store.path());
    }

    #[test]
    fn file_is_keyed_by_ticker_with_contract_field_names() {
        let store = temp_store();
        store.save("ORCL", 180.0, &pc_fixture()).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let record = &value["ORCL"];
        assert!(record["date"].is_string());
        assert!(record["timestamp"].is_i64());
        assert!(record["close_price"].is_f64() || record["close_price"].is_u64());
        assert!(record["pc_data"]["ratio"].is_f64());
        // NaiveDate serializes as YYYY-MM-DD, the durable format.
        let date = record["date"].as_str().unwrap();
        assert_eq!(date.len(), 10);
        assert_eq!(&date[4..5], "-");
        let _ = std::fs::remove_file(store.path());
    }
}
