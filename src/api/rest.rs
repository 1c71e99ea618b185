// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// The surface the presentation layer renders from. All endpoints live under
// `/api/v1/`; none require authentication. CORS is configured permissively
// for development; tighten `allowed_origins` in production.

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::errors::AnalysisError;
use crate::scanner::scan_universe;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/analysis/:ticker", get(analysis))
        .route("/api/v1/scan", get(scan))
        .route("/api/v1/snapshot/:ticker", get(snapshot))
        .route("/api/v1/config", get(get_config))
        .route("/api/v1/config", post(set_config))
        .route("/api/v1/errors", get(recent_errors))
        .layer(cors)
        .with_state(state)
}

/// Map a pipeline error to the status code the dashboard keys its error
/// states off.
fn error_status(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AnalysisError::NoOptionsData(_)
        | AnalysisError::NoNearTermExpirations { .. }
        | AnalysisError::NoOptionVolume(_)
        | AnalysisError::SnapshotUnavailable(_) => StatusCode::NOT_FOUND,
        AnalysisError::FetchFailure(_) => StatusCode::BAD_GATEWAY,
        AnalysisError::MalformedData(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

// =============================================================================
// Health
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "state_version": state.current_state_version(),
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "server_time": Utc::now().timestamp_millis(),
    }))
}

// =============================================================================
// Per-ticker analysis
// =============================================================================

async fn analysis(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> impl IntoResponse {
    let (range, interval, atr_multiplier) = {
        let config = state.runtime_config.read();
        (
            config.history_range.clone(),
            config.bar_interval.clone(),
            config.atr_multiplier,
        )
    };

    match state
        .analyzer
        .analyze(&ticker, &range, &interval, atr_multiplier, Utc::now())
        .await
    {
        Ok(analysis) => Json(analysis).into_response(),
        Err(e) => {
            warn!(ticker, error = %e, "analysis failed");
            state.push_error(format!("{ticker}: {e}"));
            (
                error_status(&e),
                Json(json!({ "ticker": ticker, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Universe scan
// =============================================================================

async fn scan(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (tickers, range, interval, atr_multiplier) = {
        let config = state.runtime_config.read();
        (
            config.tickers.clone(),
            config.history_range.clone(),
            config.bar_interval.clone(),
            config.atr_multiplier,
        )
    };

    let report = scan_universe(
        state.analyzer.provider().as_ref(),
        &tickers,
        &range,
        &interval,
        atr_multiplier,
    )
    .await;

    for failure in &report.failures {
        state.push_error(format!("scan {}: {}", failure.ticker, failure.reason));
    }
    Json(report)
}

// =============================================================================
// Stored snapshot
// =============================================================================

async fn snapshot(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> impl IntoResponse {
    match state.snapshots.load(&ticker) {
        Some(snapshot) => Json(snapshot).into_response(),
        None => {
            let e = AnalysisError::SnapshotUnavailable(ticker.clone());
            (
                error_status(&e),
                Json(json!({ "ticker": ticker, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Config
// =============================================================================

async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.runtime_config.read().clone())
}

#[derive(Deserialize)]
struct ConfigUpdate {
    #[serde(default)]
    tickers: Option<Vec<String>>,
    #[serde(default)]
    atr_multiplier: Option<f64>,
    #[serde(default)]
    history_range: Option<String>,
}

async fn set_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ConfigUpdate>,
) -> impl IntoResponse {
    let mut config = state.runtime_config.write();
    let mut changed = false;

    if let Some(tickers) = update.tickers {
        let tickers: Vec<String> = tickers
            .into_iter()
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .collect();
        if !tickers.is_empty() && tickers != config.tickers {
            config.tickers = tickers;
            changed = true;
        }
    }
    if let Some(m) = update.atr_multiplier {
        let accepted = crate::indicators::engine::ATR_MULTIPLIER_MIN
            ..=crate::indicators::engine::ATR_MULTIPLIER_MAX;
        if m.is_finite() && accepted.contains(&m) && m != config.atr_multiplier {
            config.atr_multiplier = m;
            changed = true;
        }
    }
    if let Some(range) = update.history_range {
        if !range.is_empty() && range != config.history_range {
            config.history_range = range;
            changed = true;
        }
    }

    let config_clone = config.clone();
    drop(config);

    if changed {
        info!("runtime config updated via API");
        state.analyzer.invalidate_caches();
        // Best-effort persistence.
        if let Err(e) = config_clone.save("runtime_config.json") {
            warn!(error = %e, "failed to save config to disk");
        }
        state.increment_version();
    }

    Json(config_clone)
}

// =============================================================================
// Recent errors
// =============================================================================

async fn recent_errors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.recent_errors.read().clone())
}
