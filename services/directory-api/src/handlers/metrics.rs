//! Health checks, metrics, and monitoring endpoints.

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::state::AppState;

// ============================================================================
// Health Checks
// ============================================================================

/// GET /health - Basic health check
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /ready - Ready once the directory can answer from cache or the registry responds
pub async fn ready_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    if state.directory.has_servable_entries().await {
        return (StatusCode::OK, "Ready");
    }
    match state.directory.registry().ping().await {
        Ok(()) => (StatusCode::OK, "Ready"),
        Err(e) => {
            warn!(error = %e, "Registry not reachable");
            (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
        }
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// GET /metrics - Prometheus metrics endpoint
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics recorder not installed").into_response(),
    }
}

/// GET /api/metrics - JSON snapshot of resolver and directory counters
#[instrument(skip(state))]
pub async fn api_metrics_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let resolver = state.metrics.snapshot().await;
    let directory = state.directory.stats().await;
    let last_sync = state.directory.tracker().last().await;

    Json(json!({
        "resolver": resolver,
        "directory": directory,
        "lastSync": last_sync,
    }))
}
