// =============================================================================
// Per-ticker Analysis — the full pipeline behind one dashboard card
// =============================================================================
//
// bars (cached) -> indicator engine -> classifier -> options sentiment with
// live -> snapshot -> none degradation -> five-factor sentiment score.
//
// The snapshot capture policy also lives here, on the calling side of the
// store: a live put/call reading computed while the session close window is
// open is persisted at most once per trading day per ticker, keyed off the
// stored record's date. A page render that happens to land in the window is
// what triggers the write; there is no background scheduler.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::AnalysisError;
use crate::indicators::compute_indicators;
use crate::market_clock;
use crate::market_data::{MarketDataProvider, TtlCache};
use crate::notify;
use crate::options::{compute_put_call, PutCallSentiment};
use crate::signals::{score_sentiment, SentimentReport};
use crate::snapshot::SnapshotStore;
use crate::types::{Bar, DataSource, IndicatorRow, Signal};

/// Everything the presentation layer needs to render one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerAnalysis {
    pub ticker: String,
    pub rows: Vec<IndicatorRow>,
    pub signal: Signal,
    pub last_price: f64,
    pub percent_change: f64,
    pub stop_loss: Option<f64>,
    pub sentiment: SentimentReport,
    pub put_call: Option<PutCallSentiment>,
    /// `None` when no options sentiment could be produced at all.
    pub options_source: Option<DataSource>,
    /// Ready-to-send notification line; delivery is the caller's concern.
    pub alert: String,
}

/// The per-ticker pipeline with its caches and snapshot fallback.
pub struct Analyzer {
    provider: Arc<dyn MarketDataProvider>,
    snapshots: Arc<SnapshotStore>,
    bar_cache: TtlCache<Vec<Bar>>,
    options_cache: TtlCache<PutCallSentiment>,
}

impl Analyzer {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        snapshots: Arc<SnapshotStore>,
        bar_ttl: Duration,
        options_ttl: Duration,
    ) -> Self {
        Self {
            provider,
            snapshots,
            bar_cache: TtlCache::new(bar_ttl),
            options_cache: TtlCache::new(options_ttl),
        }
    }

    pub fn provider(&self) -> &Arc<dyn MarketDataProvider> {
        &self.provider
    }

    /// Drop memoized fetches (configuration changes invalidate them).
    pub fn invalidate_caches(&self) {
        self.bar_cache.clear();
        self.options_cache.clear();
    }

    /// Run the full pipeline for one ticker. `now` is injected so the
    /// capture-window gate and the options expiration window are testable.
    pub async fn analyze(
        &self,
        ticker: &str,
        range: &str,
        interval: &str,
        atr_multiplier: f64,
        now: DateTime<Utc>,
    ) -> Result<TickerAnalysis, AnalysisError> {
        let bars = self.bars_cached(ticker, range, interval).await?;
        let rows = compute_indicators(&bars, atr_multiplier)?;

        // The engine guarantees >= 50 rows on success.
        let current = rows.last().expect("non-empty row set");
        let previous = &rows[rows.len() - 2];
        let last_price = current.bar.close;
        let percent_change = if previous.bar.close != 0.0 {
            (last_price - previous.bar.close) / previous.bar.close * 100.0
        } else {
            0.0
        };

        let (put_call, options_source) = self.options_sentiment(ticker, last_price, now).await;
        let sentiment = score_sentiment(current, previous, put_call.as_ref());
        let alert = notify::format_signal_alert(ticker, last_price, current.signal, current.stop_loss);

        Ok(TickerAnalysis {
            ticker: ticker.to_string(),
            signal: current.signal,
            last_price,
            percent_change,
            stop_loss: current.stop_loss,
            sentiment,
            put_call,
            options_source,
            alert,
            rows,
        })
    }

    async fn bars_cached(
        &self,
        ticker: &str,
        range: &str,
        interval: &str,
    ) -> Result<Vec<Bar>, AnalysisError> {
        let key = format!("{ticker}:{range}:{interval}");
        if let Some(bars) = self.bar_cache.get(&key) {
            debug!(ticker, "bars served from cache");
            return Ok(bars);
        }
        let bars = self
            .provider
            .fetch_bars(ticker, range, interval)
            .await
            .map_err(AnalysisError::from)?;
        self.bar_cache.insert(key, bars.clone());
        Ok(bars)
    }

    /// Live put/call reading, degrading to the stored snapshot and finally to
    /// nothing. Never fails the surrounding analysis.
    async fn options_sentiment(
        &self,
        ticker: &str,
        spot: f64,
        now: DateTime<Utc>,
    ) -> (Option<PutCallSentiment>, Option<DataSource>) {
        if let Some(pc) = self.options_cache.get(ticker) {
            debug!(ticker, "options sentiment served from cache");
            return (Some(pc), Some(DataSource::Live));
        }

        let today = market_clock::session_date(now);
        match compute_put_call(self.provider.as_ref(), ticker, spot, today).await {
            Ok(pc) => {
                self.options_cache.insert(ticker, pc.clone());
                self.maybe_capture_snapshot(ticker, spot, &pc, now);
                (Some(pc), Some(DataSource::Live))
            }
            Err(e) => {
                warn!(ticker, error = %e, "live options sentiment unavailable, trying snapshot");
                match self.snapshots.load(ticker) {
                    Some(snapshot) => {
                        info!(ticker, date = %snapshot.date, "serving options sentiment from snapshot");
                        (Some(snapshot.pc_data), Some(DataSource::Snapshot))
                    }
                    None => (None, None),
                }
            }
        }
    }

    /// Persist the reading when the close window is open and today's record
    /// does not exist yet. Write errors are logged, never propagated.
    fn maybe_capture_snapshot(
        &self,
        ticker: &str,
        spot: f64,
        pc: &PutCallSentiment,
        now: DateTime<Utc>,
    ) {
        if !market_clock::in_close_window(now) {
            return;
        }
        let today = market_clock::session_date(now);
        if let Some(existing) = self.snapshots.load(ticker) {
            if existing.date == today {
                return;
            }
        }
        // Stamp with the SESSION date: at 15:55 ET the UTC calendar may
        // already read tomorrow, which would defeat the once-per-day check.
        let record = crate::snapshot::Snapshot {
            ticker: ticker.to_string(),
            date: today,
            timestamp: now.timestamp(),
            close_price: spot,
            pc_data: pc.clone(),
        };
        if let Err(e) = self.snapshots.save_record(record) {
            warn!(ticker, error = %e, "snapshot capture failed");
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::types::{OptionChain, OptionContract};

    static TEST_FILE_SEQ: AtomicU32 = AtomicU32::new(0);

    fn temp_snapshot_store() -> Arc<SnapshotStore> {
        let seq = TEST_FILE_SEQ.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "alphadesk_analysis_test_{}_{seq}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Arc::new(SnapshotStore::new(path))
    }

    struct MockProvider {
        bars: HashMap<String, Vec<Bar>>,
        expirations: Vec<NaiveDate>,
        chain: Option<OptionChain>,
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        fn provider_name(&self) -> &'static str {
            "mock"
        }

        async fn fetch_bars(&self, ticker: &str, _: &str, _: &str) -> Result<Vec<Bar>> {
            match self.bars.get(ticker) {
                Some(bars) => Ok(bars.clone()),
                None => bail!("simulated fetch failure for {ticker}"),
            }
        }

        async fn list_option_expirations(&self, _: &str) -> Result<Vec<NaiveDate>> {
            Ok(self.expirations.clone())
        }

        async fn fetch_option_chain(&self, _: &str, _: NaiveDate) -> Result<OptionChain> {
            match &self.chain {
                Some(chain) => Ok(chain.clone()),
                None => bail!("simulated chain failure"),
            }
        }
    }

    fn trending_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64 * 0.5;
                Bar {
                    date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
                        + chrono::Duration::days(i as i64),
                    open: close - 0.4,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000_000.0,
                }
            })
            .collect()
    }

    fn chain_with_volume(call_volume: f64, put_volume: f64) -> OptionChain {
        let strikes: Vec<f64> = (0..7).map(|i| 100.0 + i as f64 * 5.0).collect();
        OptionChain {
            calls: strikes
                .iter()
                .map(|&s| OptionContract { strike: s, volume: call_volume })
                .collect(),
            puts: strikes
                .iter()
                .map(|&s| OptionContract { strike: s, volume: put_volume })
                .collect(),
        }
    }

    /// Mid-session weekday instant, outside the capture window.
    fn midday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 4, 15, 0, 0).unwrap()
    }

    /// Inside the 15:55-16:00 EDT capture window on the same day.
    fn close_window() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 4, 19, 57, 0).unwrap()
    }

    fn analyzer(provider: MockProvider, snapshots: Arc<SnapshotStore>) -> Analyzer {
        Analyzer::new(
            Arc::new(provider),
            snapshots,
            Duration::from_secs(60),
            Duration::from_secs(300),
        )
    }

    fn near_expiration() -> NaiveDate {
        // midday() is 2025-06-04 ET; ten days out is inside the window.
        NaiveDate::from_ymd_opt(2025, 6, 14).unwrap()
    }

    #[tokio::test]
    async fn full_payload_with_live_options() {
        let provider = MockProvider {
            bars: HashMap::from([("TSLA".to_string(), trending_bars(70))]),
            expirations: vec![near_expiration()],
            chain: Some(chain_with_volume(100.0, 50.0)),
        };
        let analyzer = analyzer(provider, temp_snapshot_store());

        let analysis = analyzer
            .analyze("TSLA", "6mo", "1d", 2.5, midday())
            .await
            .unwrap();

        assert_eq!(analysis.ticker, "TSLA");
        assert_eq!(analysis.rows.len(), 70);
        assert!(analysis.last_price > 0.0);
        assert!(analysis.stop_loss.is_some());
        assert_eq!(analysis.options_source, Some(DataSource::Live));
        let pc = analysis.put_call.unwrap();
        assert_eq!(pc.ratio, 0.5);
        // All five factors present when options data exists.
        assert_eq!(analysis.sentiment.factors.len(), 5);
        assert!(analysis.alert.starts_with("[TSLA]"));
        assert!(analysis.alert.contains(&analysis.signal.to_string()));
    }

    #[tokio::test]
    async fn fetch_failure_propagates_as_typed_error() {
        let provider = MockProvider {
            bars: HashMap::new(),
            expirations: vec![],
            chain: None,
        };
        let analyzer = analyzer(provider, temp_snapshot_store());

        let err = analyzer
            .analyze("TSLA", "6mo", "1d", 2.5, midday())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::FetchFailure(_)));
    }

    #[tokio::test]
    async fn short_history_propagates_insufficient_data() {
        let provider = MockProvider {
            bars: HashMap::from([("YOUNG".to_string(), trending_bars(30))]),
            expirations: vec![],
            chain: None,
        };
        let analyzer = analyzer(provider, temp_snapshot_store());

        let err = analyzer
            .analyze("YOUNG", "6mo", "1d", 2.5, midday())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }

    #[tokio::test]
    async fn options_failure_falls_back_to_snapshot() {
        let snapshots = temp_snapshot_store();
        let stored = PutCallSentiment {
            ratio: 1.3,
            total_call_volume: 1_000.0,
            total_put_volume: 1_300.0,
            by_expiration: vec![],
            skipped_expirations: vec![],
        };
        snapshots.save("TSLA", 240.0, &stored).unwrap();

        let provider = MockProvider {
            bars: HashMap::from([("TSLA".to_string(), trending_bars(70))]),
            expirations: vec![], // no listed options -> live computation fails
            chain: None,
        };
        let analyzer = analyzer(provider, snapshots.clone());

        let analysis = analyzer
            .analyze("TSLA", "6mo", "1d", 2.5, midday())
            .await
            .unwrap();
        assert_eq!(analysis.options_source, Some(DataSource::Snapshot));
        assert_eq!(analysis.put_call.unwrap().ratio, 1.3);
        assert_eq!(analysis.sentiment.factors.len(), 5);

        let _ = std::fs::remove_file(snapshots.path());
    }

    #[tokio::test]
    async fn no_options_and_no_snapshot_omits_the_factor() {
        let provider = MockProvider {
            bars: HashMap::from([("TSLA".to_string(), trending_bars(70))]),
            expirations: vec![],
            chain: None,
        };
        let analyzer = analyzer(provider, temp_snapshot_store());

        let analysis = analyzer
            .analyze("TSLA", "6mo", "1d", 2.5, midday())
            .await
            .unwrap();
        assert!(analysis.put_call.is_none());
        assert!(analysis.options_source.is_none());
        assert_eq!(analysis.sentiment.factors.len(), 4);
    }

    #[tokio::test]
    async fn close_window_render_captures_one_snapshot_per_day() {
        let snapshots = temp_snapshot_store();
        let provider = MockProvider {
            bars: HashMap::from([("TSLA".to_string(), trending_bars(70))]),
            expirations: vec![near_expiration()],
            chain: Some(chain_with_volume(100.0, 80.0)),
        };
        let analyzer = analyzer(provider, snapshots.clone());

        analyzer
            .analyze("TSLA", "6mo", "1d", 2.5, close_window())
            .await
            .unwrap();
        let first = snapshots.load("TSLA").expect("snapshot captured");
        assert_eq!(first.pc_data.ratio, 0.8);

        // A second render inside the window must not overwrite; invalidate
        // the options cache so the live path actually re-runs.
        analyzer.invalidate_caches();
        analyzer
            .analyze("TSLA", "6mo", "1d", 2.5, close_window())
            .await
            .unwrap();
        let second = snapshots.load("TSLA").unwrap();
        assert_eq!(second.timestamp, first.timestamp);

        let _ = std::fs::remove_file(snapshots.path());
    }

    #[tokio::test]
    async fn midday_render_never_captures() {
        let snapshots = temp_snapshot_store();
        let provider = MockProvider {
            bars: HashMap::from([("TSLA".to_string(), trending_bars(70))]),
            expirations: vec![near_expiration()],
            chain: Some(chain_with_volume(100.0, 80.0)),
        };
        let analyzer = analyzer(provider, snapshots.clone());

        analyzer
            .analyze("TSLA", "6mo", "1d", 2.5, midday())
            .await
            .unwrap();
        assert!(snapshots.load("TSLA").is_none());
    }

    #[tokio::test]
    async fn second_call_hits_the_bar_cache() {
        // The provider is consumed into the analyzer; serving a second
        // analysis without a second fetch is observable through a provider
        // that only answers once.
        struct OneShot {
            bars: parking_lot::Mutex<Option<Vec<Bar>>>,
        }

        #[async_trait]
        impl MarketDataProvider for OneShot {
            fn provider_name(&self) -> &'static str {
                "oneshot"
            }
            async fn fetch_bars(&self, _: &str, _: &str, _: &str) -> Result<Vec<Bar>> {
                match self.bars.lock().take() {
                    Some(bars) => Ok(bars),
                    None => bail!("second fetch attempted"),
                }
            }
            async fn list_option_expirations(&self, _: &str) -> Result<Vec<NaiveDate>> {
                Ok(Vec::new())
            }
            async fn fetch_option_chain(&self, _: &str, _: NaiveDate) -> Result<OptionChain> {
                bail!("no chains")
            }
        }

        let provider = OneShot {
            bars: parking_lot::Mutex::new(Some(trending_bars(70))),
        };
        let analyzer = Analyzer::new(
            Arc::new(provider),
            temp_snapshot_store(),
            Duration::from_secs(60),
            Duration::from_secs(300),
        );

        analyzer.analyze("TSLA", "6mo", "1d", 2.5, midday()).await.unwrap();
        // Succeeds only if the cache serves the bars.
        analyzer.analyze("TSLA", "6mo", "1d", 2.5, midday()).await.unwrap();
    }
}
