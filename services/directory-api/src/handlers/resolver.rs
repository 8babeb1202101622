//! Generic OGC endpoint: `/api/v1/:product/:service_type`.

use axum::{
    body::Body,
    extract::{Extension, Path, Query},
    http::{header, HeaderMap, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{instrument, warn};

use s100_common::{DirectoryError, DirectoryResult, ProductType, ServiceType};

use super::common::{content_type, is_xml, unsupported_media_type, ApiError, X_ERROR_CODE};
use crate::metrics::QueryMode;
use crate::resolver::{self, OgcRequest, Resolution};
use crate::state::AppState;

pub const X_QUERY_MODE: HeaderName = HeaderName::from_static("x-query-mode");
pub const X_QUERY_TIME: HeaderName = HeaderName::from_static("x-query-time");
pub const X_CACHE_HIT: HeaderName = HeaderName::from_static("x-cache-hit");
pub const X_SERVICE_NODE: HeaderName = HeaderName::from_static("x-service-node");
pub const X_SERVICE_CONFIDENCE: HeaderName = HeaderName::from_static("x-service-confidence");
pub const X_RENDER_MODE: HeaderName = HeaderName::from_static("x-render-mode");

fn route_types(product: &str, service_type: &str) -> DirectoryResult<(ProductType, ServiceType)> {
    Ok((product.parse()?, service_type.parse()?))
}

/// GET|POST /api/v1/:product/:service_type
#[instrument(skip_all, fields(product = %product, service = %service_type))]
pub async fn resolve_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((product, service_type)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    state.metrics.record_request();
    let started = Instant::now();

    let body = if method == Method::POST {
        let content_type = content_type(&headers);
        if !is_xml(content_type) {
            state.metrics.record_invalid();
            return unsupported_media_type(content_type);
        }
        Some(body).filter(|b| !b.is_empty())
    } else {
        None
    };

    let request = match route_types(&product, &service_type)
        .and_then(|(p, s)| OgcRequest::parse(p, s, params, body))
    {
        Ok(request) => request,
        Err(err) => {
            state.metrics.record_invalid();
            warn!(error = %err, code = err.error_code(), "Rejected request");
            return ApiError(err).into_response();
        }
    };

    let resolved = resolver::resolve(&state, &request).await;
    respond(&request, resolved.resolution, started.elapsed())
}

fn millis(elapsed: Duration) -> String {
    elapsed.as_millis().to_string()
}

fn respond(request: &OgcRequest, resolution: Resolution, elapsed: Duration) -> Response {
    match resolution {
        Resolution::Redirect {
            mode,
            location,
            entry,
        } => (
            StatusCode::TEMPORARY_REDIRECT,
            [
                (header::LOCATION, location),
                (X_QUERY_MODE, mode.as_str().to_string()),
                (X_QUERY_TIME, millis(elapsed)),
                (X_CACHE_HIT, (mode == QueryMode::Cached).to_string()),
                (X_SERVICE_NODE, entry.node_id.clone()),
                (X_SERVICE_CONFIDENCE, entry.confidence.to_string()),
            ],
        )
            .into_response(),

        Resolution::Rendered { mode, response } => {
            let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
            let mut builder = Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, response.content_type)
                .header(X_QUERY_MODE, mode.as_str())
                .header(X_QUERY_TIME, millis(elapsed));
            if mode == QueryMode::Direct {
                builder = builder
                    .header(X_CACHE_HIT, "false")
                    .header(X_RENDER_MODE, "direct");
            }
            builder
                .body(Body::from(response.body))
                .unwrap_or_else(|e| {
                    ApiError(DirectoryError::InternalError(e.to_string())).into_response()
                })
        }

        Resolution::Unavailable { reason } => {
            let code = "SERVICE_UNAVAILABLE";
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [
                    (X_ERROR_CODE, code.to_string()),
                    (X_QUERY_MODE, QueryMode::Unavailable.as_str().to_string()),
                    (X_QUERY_TIME, millis(elapsed)),
                    (X_CACHE_HIT, "false".to_string()),
                ],
                Json(json!({
                    "error": {
                        "code": code,
                        "message": format!(
                            "No service available for {} {}",
                            request.product_type, request.service_type
                        ),
                        "details": {
                            "product": request.product_type.code(),
                            "serviceType": request.service_type.code(),
                            "request": request.operation,
                            "bbox": request.bbox.map(|b| b.to_wms_string()),
                            "reason": reason,
                        }
                    },
                    "queryMode": QueryMode::Unavailable.as_str(),
                    "performance": {
                        "queryTime": elapsed.as_millis() as u64,
                        "cacheHit": false,
                    }
                })),
            )
                .into_response()
        }
    }
}
