//! Admin endpoints for sync control and entry management.

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};

use s100_common::{DirectoryError, ProductType, ServiceType};
use storage::EntryKey;

use super::common::{parse_param, ApiResult};
use crate::state::AppState;

const HISTORY_LIMIT: usize = 20;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncParams {
    #[serde(rename = "type")]
    pub sync_type: Option<String>,
    pub node_id: Option<String>,
}

/// POST /api/admin/service-directory/sync
#[instrument(skip(state))]
pub async fn sync_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<SyncParams>,
) -> ApiResult<Json<Value>> {
    let node_id = params.node_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
    let sync_type = match params.sync_type.as_deref() {
        Some(t) => t.trim().to_ascii_lowercase(),
        None if node_id.is_some() => "node".to_string(),
        None => "full".to_string(),
    };

    match sync_type.as_str() {
        "full" => {
            info!("Admin requested full sync");
            let report = state.directory.sync_all().await?;
            Ok(Json(json!({ "type": "full", "report": report })))
        }
        "node" => {
            let node_id =
                node_id.ok_or_else(|| DirectoryError::MissingParameter("nodeId".to_string()))?;
            info!(node_id = %node_id, "Admin requested node sync");
            let report = state.directory.sync_node_capabilities(node_id).await?;
            Ok(Json(json!({ "type": "node", "report": report })))
        }
        other => Err(DirectoryError::InvalidParameter {
            param: "type".to_string(),
            message: format!("expected 'full' or 'node', got '{}'", other),
        }
        .into()),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusParams {
    pub action: Option<String>,
    pub limit: Option<String>,
}

/// GET /api/admin/service-directory/sync
#[instrument(skip(state))]
pub async fn sync_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<StatusParams>,
) -> ApiResult<Json<Value>> {
    let directory = &state.directory;
    let action = params
        .action
        .as_deref()
        .map(|a| a.trim().to_ascii_lowercase())
        .unwrap_or_else(|| "status".to_string());

    match action.as_str() {
        "status" => Ok(Json(json!(directory.tracker().status().await))),
        "history" => {
            let limit = parse_param::<usize>("limit", params.limit.as_deref())?.unwrap_or(HISTORY_LIMIT);
            let runs = directory.tracker().history(limit).await;
            Ok(Json(json!({ "count": runs.len(), "runs": runs })))
        }
        "stats" => Ok(Json(json!(directory.stats().await))),
        "cleanup" => {
            let purged = directory.cleanup_expired().await;
            info!(purged = purged, "Admin purged expired entries");
            Ok(Json(json!({ "purged": purged, "remaining": directory.store().len().await })))
        }
        other => Err(DirectoryError::InvalidParameter {
            param: "action".to_string(),
            message: format!("unknown action '{}'", other),
        }
        .into()),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EnableParams {
    pub enabled: Option<String>,
}

/// POST /api/admin/service-directory/entries/:node_id/:product/:service_type
#[instrument(skip(state))]
pub async fn entry_enabled_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((node_id, product, service_type)): Path<(String, String, String)>,
    Query(params): Query<EnableParams>,
) -> ApiResult<Json<Value>> {
    let product: ProductType = product.parse()?;
    let service_type: ServiceType = service_type.parse()?;
    let enabled = parse_param::<bool>("enabled", params.enabled.as_deref())?
        .ok_or_else(|| DirectoryError::MissingParameter("enabled".to_string()))?;

    let key = EntryKey::new(node_id, product, service_type);
    state.directory.set_entry_enabled(&key, enabled).await?;
    info!(node_id = %key.node_id, product = %product, service = %service_type, enabled, "Entry toggled");

    Ok(Json(json!({
        "nodeId": key.node_id,
        "productType": product.code(),
        "serviceType": service_type.code(),
        "isEnabled": enabled,
    })))
}
