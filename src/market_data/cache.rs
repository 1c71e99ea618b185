// =============================================================================
// TtlCache — time-boxed fetch memoization
// =============================================================================
//
// Replaces implicit process-global memoization with an injectable cache the
// caller constructs and owns: key -> (value, fetched_at), freshness checked
// explicitly against the configured TTL on every read. Stale entries are
// evicted lazily on access.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Thread-safe TTL cache keyed by string (ticker, or ticker plus parameters).
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, (V, Instant)>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Return the cached value when it is still inside the freshness window.
    pub fn get(&self, key: &str) -> Option<V> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some((value, fetched_at)) if fetched_at.elapsed() < self.ttl => {
                    return Some(value.clone());
                }
                Some(_) => {} // stale — fall through to evict
                None => return None,
            }
        }
        self.entries.write().remove(key);
        None
    }

    /// Store a freshly fetched value.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.entries
            .write()
            .insert(key.into(), (value, Instant::now()));
    }

    /// Drop every entry (used when configuration changes invalidate results).
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
