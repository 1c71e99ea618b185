// =============================================================================
// Market Scanner — signal buckets across a ticker universe
// =============================================================================
//
// One batch bar fetch, then the indicator engine and classifier per ticker.
// A failing ticker lands in `failures` with its reason and is absent from
// every bucket; the scan itself never fails. Bucket order follows scan order.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::indicators::compute_indicators;
use crate::market_data::MarketDataProvider;
use crate::types::Signal;

/// One successfully scanned ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEntry {
    pub ticker: String,
    pub last_price: f64,
    /// Close-over-close change, percent.
    pub percent_change: f64,
}

/// One ticker excluded from the buckets, with the reason for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanFailure {
    pub ticker: String,
    pub reason: String,
}

/// The scan output: tickers bucketed by their latest signal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub buy: Vec<ScanEntry>,
    pub hold: Vec<ScanEntry>,
    pub sell: Vec<ScanEntry>,
    pub failures: Vec<ScanFailure>,
}

impl ScanReport {
    pub fn scanned_count(&self) -> usize {
        self.buy.len() + self.hold.len() + self.sell.len()
    }
}

/// Scan `tickers`, bucketing each by its latest signal.
pub async fn scan_universe(
    provider: &dyn MarketDataProvider,
    tickers: &[String],
    range: &str,
    interval: &str,
    atr_multiplier: f64,
) -> ScanReport {
    let mut batch = provider.fetch_batch_bars(tickers, range, interval).await;
    let mut report = ScanReport::default();

    for ticker in tickers {
        let bars = match batch.remove(ticker) {
            Some(Ok(bars)) => bars,
            Some(Err(e)) => {
                warn!(ticker, error = %e, "scan fetch failed, skipping ticker");
                report.failures.push(ScanFailure {
                    ticker: ticker.clone(),
                    reason: format!("{e:#}"),
                });
                continue;
            }
            None => {
                warn!(ticker, "batch response missing ticker, skipping");
                report.failures.push(ScanFailure {
                    ticker: ticker.clone(),
                    reason: "no data returned".to_string(),
                });
                continue;
            }
        };

        let rows = match compute_indicators(&bars, atr_multiplier) {
            Ok(rows) => rows,
            Err(e) => {
                debug!(ticker, error = %e, "scan computation failed, skipping ticker");
                report.failures.push(ScanFailure {
                    ticker: ticker.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        // The engine guarantees at least 50 rows here.
        let last = rows.last().expect("non-empty row set");
        let prev_close = rows[rows.len() - 2].bar.close;
        let percent_change = if prev_close != 0.0 {
            (last.bar.close - prev_close) / prev_close * 100.0
        } else {
            0.0
        };

        let entry = ScanEntry {
            ticker: ticker.clone(),
            last_price: last.bar.close,
            percent_change,
        };
        match last.signal {
            Signal::Buy => report.buy.push(entry),
            Signal::Hold => report.hold.push(entry),
            Signal::Sell => report.sell.push(entry),
        }
    }

    report
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    use crate::types::{Bar, OptionChain};

    struct MockBarsProvider {
        bars: HashMap<String, Vec<Bar>>,
    }

    #[async_trait]
    impl MarketDataProvider for MockBarsProvider {
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
            Ok(Vec::new())
        }

        async fn fetch_option_chain(&self, _: &str, _: NaiveDate) -> Result<OptionChain> {
            bail!("chains not served by this mock")
        }
    }

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000_000.0,
            })
            .collect()
    }

    fn downtrend(n: usize) -> Vec<Bar> {
        bars_from_closes(&(0..n).map(|i| 200.0 - i as f64).collect::<Vec<_>>())
    }

    fn sideways(n: usize) -> Vec<Bar> {
        bars_from_closes(
            &(0..n)
                .map(|i| 100.0 + (i as f64 * 0.9).sin() * 0.5)
                .collect::<Vec<_>>(),
        )
    }

    fn universe(tickers: &[&str]) -> Vec<String> {
        tickers.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn failing_ticker_is_excluded_not_fatal() {
        let mut bars = HashMap::new();
        for t in ["AAA", "BBB", "CCC", "DDD"] {
            bars.insert(t.to_string(), downtrend(60));
        }
        let provider = MockBarsProvider { bars };
        let tickers = universe(&["AAA", "BAD", "BBB", "CCC", "DDD"]);

        let report = scan_universe(&provider, &tickers, "6mo", "1d", 2.5).await;

        assert_eq!(report.scanned_count(), 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].ticker, "BAD");
        for bucket in [&report.buy, &report.hold, &report.sell] {
            assert!(bucket.iter().all(|e| e.ticker != "BAD"));
        }
    }

    #[tokio::test]
    async fn persistent_downtrend_lands_in_the_sell_bucket() {
        let mut bars = HashMap::new();
        bars.insert("LOSER".to_string(), downtrend(60));
        let provider = MockBarsProvider { bars };

        let report = scan_universe(&provider, &universe(&["LOSER"]), "6mo", "1d", 2.5).await;
        assert_eq!(report.sell.len(), 1);
        assert_eq!(report.sell[0].ticker, "LOSER");
        assert!(report.sell[0].percent_change < 0.0);
    }

    #[tokio::test]
    async fn quiet_sideways_tape_lands_in_hold() {
        let mut bars = HashMap::new();
        bars.insert("FLAT".to_string(), sideways(80));
        let provider = MockBarsProvider { bars };

        let report = scan_universe(&provider, &universe(&["FLAT"]), "6mo", "1d", 2.5).await;
        // A gently oscillating series with flat volume can never satisfy the
        // volume-surge entry leg; it is HOLD or SELL, never BUY.
        assert!(report.buy.is_empty());
        assert_eq!(report.scanned_count(), 1);
    }

    #[tokio::test]
    async fn short_history_is_a_recorded_failure() {
        let mut bars = HashMap::new();
        bars.insert("YOUNG".to_string(), downtrend(20));
        let provider = MockBarsProvider { bars };

        let report = scan_universe(&provider, &universe(&["YOUNG"]), "6mo", "1d", 2.5).await;
        assert_eq!(report.scanned_count(), 0);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].reason.contains("insufficient history"));
    }

    #[tokio::test]
    async fn empty_universe_yields_empty_report() {
        let provider = MockBarsProvider { bars: HashMap::new() };
        let report = scan_universe(&provider, &[], "6mo", "1d", 2.5).await;
        assert_eq!(report.scanned_count(), 0);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn scan_order_is_preserved_within_buckets() {
        let mut bars = HashMap::new();
        for t in ["Z1", "Z2", "Z3"] {
            bars.insert(t.to_string(), downtrend(60));
        }
        let provider = MockBarsProvider { bars };
        let report = scan_universe(&provider, &universe(&["Z1", "Z2", "Z3"]), "6mo", "1d", 2.5).await;
        let names: Vec<&str> = report.sell.iter().map(|e| e.ticker.as_str()).collect();
        assert_eq!(names, vec!["Z1", "Z2", "Z3"]);
    }
}
