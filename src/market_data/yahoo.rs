// =============================================================================
// Yahoo Finance Provider — daily bars and option chains over public endpoints
// =============================================================================
//
// Uses the unofficial chart and options JSON endpoints. No API key; a browser
// user-agent is required or the edge returns 403. All responses are decoded
// into tolerant wire structs (every array nullable, every element optional)
// and normalized into the crate's Bar / OptionChain types.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::market_data::provider::MarketDataProvider;
use crate::types::{Bar, OptionChain, OptionContract};

const CHART_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const OPTIONS_BASE: &str = "https://query2.finance.yahoo.com/v7/finance/options";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Yahoo uses hyphens for share classes (BRK-B, not BRK.B).
fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase().replace('.', "-")
}

/// Convert a Yahoo epoch-seconds stamp to the session date.
fn epoch_to_date(epoch: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(epoch, 0).map(|dt| dt.date_naive())
}

/// Midnight-UTC epoch for an expiration date, the form the options endpoint
/// expects back in its `date` query parameter.
fn date_to_epoch(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
        .timestamp()
}

// -----------------------------------------------------------------------------
// Wire structs — chart endpoint
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<u64>>>,
}

// -----------------------------------------------------------------------------
// Wire structs — options endpoint
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsResponse {
    option_chain: OptionsEnvelope,
}

#[derive(Debug, Deserialize)]
struct OptionsEnvelope {
    result: Option<Vec<OptionsResult>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsResult {
    #[serde(default)]
    expiration_dates: Vec<i64>,
    #[serde(default)]
    options: Vec<OptionsBlock>,
}

#[derive(Debug, Deserialize)]
struct OptionsBlock {
    #[serde(default)]
    calls: Vec<WireContract>,
    #[serde(default)]
    puts: Vec<WireContract>,
}

#[derive(Debug, Deserialize)]
struct WireContract {
    strike: f64,
    #[serde(default)]
    volume: Option<f64>,
}

// -----------------------------------------------------------------------------
// Provider
// -----------------------------------------------------------------------------

/// Yahoo Finance market data provider.
pub struct YahooProvider {
    client: reqwest::Client,
}

impl YahooProvider {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build reqwest client");
        Self { client }
    }

    async fn get_options_payload(
        &self,
        ticker: &str,
        expiration: Option<NaiveDate>,
    ) -> Result<OptionsResult> {
        let symbol = normalize_symbol(ticker);
        let url = match expiration {
            Some(date) => format!("{OPTIONS_BASE}/{symbol}?date={}", date_to_epoch(date)),
            None => format!("{OPTIONS_BASE}/{symbol}"),
        };
        debug!(%url, "fetching option chain");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("options request for {symbol} failed"))?;
        let status = resp.status();
        let body: OptionsResponse = resp
            .json()
            .await
            .with_context(|| format!("options response for {symbol} is not valid JSON"))?;

        if let Some(err) = body.option_chain.error {
            anyhow::bail!("options API error for {symbol}: {} - {}", err.code, err.description);
        }
        if !status.is_success() {
            anyhow::bail!("options request for {symbol} returned HTTP {status}");
        }

        body.option_chain
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .with_context(|| format!("empty options result for {symbol}"))
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_bars(&self, ticker: &str, range: &str, interval: &str) -> Result<Vec<Bar>> {
        let symbol = normalize_symbol(ticker);
        let url = format!(
            "{CHART_BASE}/{symbol}?range={range}&interval={interval}&includePrePost=false"
        );
        debug!(%url, "fetching bars");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("chart request for {symbol} failed"))?;
        let status = resp.status();
        let body: ChartResponse = resp
            .json()
            .await
            .with_context(|| format!("chart response for {symbol} is not valid JSON"))?;

        if let Some(err) = body.chart.error {
            anyhow::bail!("chart API error for {symbol}: {} - {}", err.code, err.description);
        }
        if !status.is_success() {
            anyhow::bail!("chart request for {symbol} returned HTTP {status}");
        }

        let result = body
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .with_context(|| format!("empty chart result for {symbol}"))?;

        let timestamps = result
            .timestamp
            .with_context(|| format!("no timestamps in chart result for {symbol}"))?;
        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .with_context(|| format!("no quote block in chart result for {symbol}"))?;

        let opens = quote.open.unwrap_or_default();
        let highs = quote.high.unwrap_or_default();
        let lows = quote.low.unwrap_or_default();
        let closes = quote.close.unwrap_or_default();
        let volumes = quote.volume.unwrap_or_default();

        // Sessions without a close are dropped outright; other missing fields
        // pass through as NaN for the engine's forward-fill to repair.
        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let close = match closes.get(i).copied().flatten() {
                Some(c) if c > 0.0 => c,
                _ => continue,
            };
            let Some(date) = epoch_to_date(ts) else {
                continue;
            };
            bars.push(Bar {
                date,
                open: opens.get(i).copied().flatten().unwrap_or(f64::NAN),
                high: highs.get(i).copied().flatten().unwrap_or(f64::NAN),
                low: lows.get(i).copied().flatten().unwrap_or(f64::NAN),
                close,
                volume: volumes
                    .get(i)
                    .copied()
                    .flatten()
                    .map(|v| v as f64)
                    .unwrap_or(f64::NAN),
            });
        }

        debug!(symbol, bars = bars.len(), "bars fetched");
        Ok(bars)
    }

    async fn list_option_expirations(&self, ticker: &str) -> Result<Vec<NaiveDate>> {
        let payload = self.get_options_payload(ticker, None).await?;
        Ok(payload
            .expiration_dates
            .into_iter()
            .filter_map(epoch_to_date)
            .collect())
    }

    async fn fetch_option_chain(&self, ticker: &str, expiration: NaiveDate) -> Result<OptionChain> {
        let payload = self.get_options_payload(ticker, Some(expiration)).await?;
        let block = payload
            .options
            .into_iter()
            .next()
            .with_context(|| format!("no chain block for {ticker} {expiration}"))?;

        let convert = |contracts: Vec<WireContract>| -> Vec<OptionContract> {
            contracts
                .into_iter()
                .map(|c| OptionContract {
                    strike: c.strike,
                    volume: c.volume.unwrap_or(0.0),
                })
                .collect()
        };

        Ok(OptionChain {
            calls: convert(block.calls),
            puts: convert(block.puts),
        })
    }
}
