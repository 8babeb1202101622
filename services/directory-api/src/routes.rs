//! Router assembly.

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Resolver
        .route(
            "/api/v1/:product/:service_type",
            get(handlers::resolve_handler).post(handlers::resolve_handler),
        )
        // Directory views
        .route("/api/directory/services", get(handlers::services_handler))
        .route("/api/directory/best", get(handlers::best_handler))
        .route("/api/directory/products", get(handlers::products_handler))
        // Admin
        .route(
            "/api/admin/service-directory/sync",
            get(handlers::sync_status_handler).post(handlers::sync_handler),
        )
        .route(
            "/api/admin/service-directory/entries/:node_id/:product/:service_type",
            post(handlers::entry_enabled_handler),
        )
        // Health and metrics
        .route("/health", get(handlers::health_handler))
        .route("/ready", get(handlers::ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/metrics", get(handlers::api_metrics_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
