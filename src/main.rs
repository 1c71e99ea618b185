// =============================================================================
// AlphaDesk Signal Terminal — Main Entry Point
// =============================================================================
//
// Request-driven backend: every dashboard render hits the API, which runs one
// pass through the pipeline. There is no background scheduler; the snapshot
// capture is triggered by renders that land inside the session close window.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analysis;
mod api;
mod app_state;
mod errors;
mod indicators;
mod market_clock;
mod market_data;
mod notify;
mod options;
mod runtime_config;
mod scanner;
mod signals;
mod snapshot;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::{MarketDataProvider, YahooProvider};
use crate::runtime_config::RuntimeConfig;

const CONFIG_PATH: &str = "runtime_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        AlphaDesk Signal Terminal — Starting Up           ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Override the universe from env if provided.
    if let Ok(syms) = std::env::var("ALPHADESK_TICKERS") {
        let tickers: Vec<String> = syms
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if !tickers.is_empty() {
            config.tickers = tickers;
        }
    }
    if let Ok(addr) = std::env::var("ALPHADESK_BIND_ADDR") {
        config.bind_addr = addr;
    }

    info!(tickers = ?config.tickers, "configured universe");
    info!(
        atr_multiplier = config.atr_multiplier,
        history_range = %config.history_range,
        snapshot_path = %config.snapshot_path,
        "pipeline parameters"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let provider = Arc::new(YahooProvider::new());
    info!(provider = provider.provider_name(), "market data adapter ready");
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, provider));

    // ── 3. Serve the API ─────────────────────────────────────────────────
    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "API server stopped");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 4. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received, stopping gracefully");
    server.abort();

    if let Err(e) = state.runtime_config.read().save(CONFIG_PATH) {
        warn!(error = %e, "failed to save runtime config on shutdown");
    }

    info!("AlphaDesk shut down complete.");
    Ok(())
}
