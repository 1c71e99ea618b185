// =============================================================================
// Market Data Provider — the adapter seam the pipeline consumes
// =============================================================================
//
// Everything the core needs from the outside world: daily bars for one or
// many tickers, listed option expirations, and per-expiration chains. Errors
// are opaque anyhow values; the pipeline folds them into its typed taxonomy
// and treats any failure as "no data for this unit of work."

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::{Bar, OptionChain};

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Daily bars for one ticker, oldest first.
    async fn fetch_bars(&self, ticker: &str, range: &str, interval: &str) -> Result<Vec<Bar>>;

    /// Bars for a whole universe. One entry per requested ticker; a failed
    /// ticker carries its error so callers can report it without aborting
    /// the batch. The default implementation degrades to per-ticker fetches;
    /// adapters with a true batch endpoint should override it.
    async fn fetch_batch_bars(
        &self,
        tickers: &[String],
        range: &str,
        interval: &str,
    ) -> HashMap<String, Result<Vec<Bar>>> {
        let mut out = HashMap::with_capacity(tickers.len());
        for ticker in tickers {
            let result = self.fetch_bars(ticker, range, interval).await;
            out.insert(ticker.clone(), result);
        }
        out
    }

    /// All listed option expiration dates for the ticker. An empty list means
    /// the ticker has no options at all.
    async fn list_option_expirations(&self, ticker: &str) -> Result<Vec<NaiveDate>>;

    /// The call and put chains for one expiration, strikes ascending.
    async fn fetch_option_chain(&self, ticker: &str, expiration: NaiveDate) -> Result<OptionChain>;
}
