// =============================================================================
// Options Sentiment Calculator — near-the-money put/call volume ratio
// =============================================================================
//
// For each expiration within the near-term window, sum today's traded volume
// over the 11 strikes centered on the strike nearest to spot (5 below, self,
// 5 above, clipped at chain bounds), then fold the per-expiration sums into
// one put/call ratio.
//
// Ratio policy (documented choice for the zero-volume edge):
//   call_sum > 0                  -> put_sum / call_sum
//   call_sum == 0, put_sum > 0    -> sentinel 2.0 (strong put skew, no
//                                    divide-by-zero)
//   call_sum == 0, put_sum == 0   -> NoOptionVolume failure; a dead tape has
//                                    no sentiment to report and the caller
//                                    falls back to the snapshot store.
//
// A single unfetchable or empty expiration never aborts the computation: it
// is recorded in `skipped_expirations` and the scan continues.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::AnalysisError;
use crate::market_data::MarketDataProvider;
use crate::types::{OptionChain, OptionContract};

/// Expirations further out than this many days are ignored.
pub const NEAR_TERM_WINDOW_DAYS: i64 = 40;

/// Strikes included on each side of the nearest-to-spot strike.
pub const STRIKE_WINDOW_HALF_WIDTH: usize = 5;

/// Ratio reported when puts traded but calls did not.
pub const PUT_SKEW_SENTINEL_RATIO: f64 = 2.0;

/// Display classification bands.
pub const PC_BULLISH_BELOW: f64 = 0.7;
pub const PC_BEARISH_ABOVE: f64 = 1.0;
/// The weighted scorer uses a slightly wider bearish band.
pub const PC_SCORER_BEARISH_ABOVE: f64 = 1.1;

/// Near-the-money volume aggregated for one expiration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChainSample {
    pub expiration: NaiveDate,
    pub call_volume: f64,
    pub put_volume: f64,
}

/// The aggregated put/call reading for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutCallSentiment {
    pub ratio: f64,
    pub total_call_volume: f64,
    pub total_put_volume: f64,
    pub by_expiration: Vec<OptionChainSample>,
    /// Expirations inside the window whose chain was empty or unretrievable.
    #[serde(default)]
    pub skipped_expirations: Vec<NaiveDate>,
}

impl PutCallSentiment {
    /// Display-band classification of the ratio.
    pub fn bias(&self) -> &'static str {
        if self.ratio < PC_BULLISH_BELOW {
            "bullish"
        } else if self.ratio > PC_BEARISH_ABOVE {
            "bearish"
        } else {
            "neutral"
        }
    }
}

/// Compute the near-the-money put/call sentiment for `ticker` at `spot`.
///
/// Fails with `NoOptionsData` when no expirations are listed,
/// `NoNearTermExpirations` when none fall inside the window, and
/// `NoOptionVolume` when every surviving chain traded nothing near the money.
pub async fn compute_put_call(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    spot: f64,
    today: NaiveDate,
) -> Result<PutCallSentiment, AnalysisError> {
    if !spot.is_finite() || spot <= 0.0 {
        return Err(AnalysisError::MalformedData(format!(
            "spot price {spot} unusable for {ticker}"
        )));
    }

    let expirations = provider.list_option_expirations(ticker).await?;
    if expirations.is_empty() {
        return Err(AnalysisError::NoOptionsData(ticker.to_string()));
    }

    let near_term: Vec<NaiveDate> = expirations
        .into_iter()
        .filter(|exp| {
            let days_out = (*exp - today).num_days();
            (0..=NEAR_TERM_WINDOW_DAYS).contains(&days_out)
        })
        .collect();
    if near_term.is_empty() {
        return Err(AnalysisError::NoNearTermExpirations {
            ticker: ticker.to_string(),
            window_days: NEAR_TERM_WINDOW_DAYS,
        });
    }

    let mut by_expiration = Vec::with_capacity(near_term.len());
    let mut skipped_expirations = Vec::new();
    let mut total_call_volume = 0.0;
    let mut total_put_volume = 0.0;

    for expiration in near_term {
        let chain = match provider.fetch_option_chain(ticker, expiration).await {
            Ok(chain) => chain,
            Err(e) => {
                warn!(ticker, %expiration, error = %e, "option chain fetch failed, skipping expiration");
                skipped_expirations.push(expiration);
                continue;
            }
        };
        if chain.is_empty() {
            debug!(ticker, %expiration, "empty option chain, skipping expiration");
            skipped_expirations.push(expiration);
            continue;
        }

        let call_volume = near_the_money_volume(&chain.calls, spot);
        let put_volume = near_the_money_volume(&chain.puts, spot);
        total_call_volume += call_volume;
        total_put_volume += put_volume;
        by_expiration.push(OptionChainSample {
            expiration,
            call_volume,
            put_volume,
        });
    }

    let ratio = if total_call_volume > 0.0 {
        total_put_volume / total_call_volume
    } else if total_put_volume > 0.0 {
        PUT_SKEW_SENTINEL_RATIO
    } else {
        return Err(AnalysisError::NoOptionVolume(ticker.to_string()));
    };

    let sentiment = PutCallSentiment {
        ratio,
        total_call_volume,
        total_put_volume,
        by_expiration,
        skipped_expirations,
    };
    debug!(
        ticker,
        ratio = sentiment.ratio,
        bias = sentiment.bias(),
        expirations = sentiment.by_expiration.len(),
        skipped = sentiment.skipped_expirations.len(),
        "put/call sentiment computed"
    );
    Ok(sentiment)
}

/// Sum volume over the 11-strike window centered on the strike nearest to
/// `spot`, clipped to the chain bounds. An empty side contributes zero.
fn near_the_money_volume(contracts: &[OptionContract], spot: f64) -> f64 {
    let Some(center) = nearest_strike_index(contracts, spot) else {
        return 0.0;
    };
    let lo = center.saturating_sub(STRIKE_WINDOW_HALF_WIDTH);
    let hi = (center + STRIKE_WINDOW_HALF_WIDTH).min(contracts.len() - 1);
    contracts[lo..=hi].iter().map(|c| c.volume).sum()
}

/// Index of the strike with minimum absolute distance to `spot`; ties go to
/// the lower strike.
fn nearest_strike_index(contracts: &[OptionContract], spot: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, c) in contracts.iter().enumerate() {
        if !c.strike.is_finite() {
            continue;
        }
        let distance = (c.strike - spot).abs();
        match best {
            Some((_, d)) if d <= distance => {}
            _ => best = Some((i, distance)),
        }
    }
    best.map(|(i, _)| i)
}
