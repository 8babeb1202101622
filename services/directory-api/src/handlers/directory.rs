//! Read-only JSON views of the directory.

use axum::{
    extract::{Extension, Query},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use s100_common::{DirectoryError, ProductType, ServiceType};
use service_directory::{QueryOptions, ServiceFilter, SortBy, SortOrder};
use storage::DirectoryEntry;

use super::common::{parse_confidence, parse_list, parse_param, require_bbox, ApiResult};
use crate::state::AppState;

/// A directory entry as returned to API clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView<'a> {
    #[serde(flatten)]
    pub entry: &'a DirectoryEntry,
    pub product_name: &'static str,
}

impl<'a> ServiceView<'a> {
    pub fn new(entry: &'a DirectoryEntry) -> Self {
        Self {
            entry,
            product_name: entry.product_type.display_name(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesParams {
    pub bbox: Option<String>,
    pub products: Option<String>,
    pub services: Option<String>,
    pub min_confidence: Option<String>,
    pub max_results: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// GET /api/directory/services
#[instrument(skip(state))]
pub async fn services_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ServicesParams>,
) -> ApiResult<Json<Value>> {
    let started = Instant::now();
    let directory = &state.directory;

    let mut filter = ServiceFilter::new(require_bbox(params.bbox.as_deref())?);
    if let Some(products) = parse_list::<ProductType>(params.products.as_deref())? {
        filter = filter.with_products(products);
    }
    if let Some(services) = parse_list::<ServiceType>(params.services.as_deref())? {
        filter = filter.with_services(services);
    }
    if let Some(min_confidence) = parse_confidence(params.min_confidence.as_deref())? {
        filter = filter.with_min_confidence(min_confidence);
    }

    let max_results = parse_param::<usize>("maxResults", params.max_results.as_deref())?
        .unwrap_or(directory.config().max_results);
    if max_results == 0 {
        return Err(DirectoryError::InvalidParameter {
            param: "maxResults".to_string(),
            message: "must be at least 1".to_string(),
        }
        .into());
    }
    let mut options = QueryOptions::new(max_results);
    if let Some(sort_by) = parse_param::<SortBy>("sortBy", params.sort_by.as_deref())? {
        options.sort_by = sort_by;
    }
    if let Some(order) = parse_param::<SortOrder>("sortOrder", params.sort_order.as_deref())? {
        options = options.with_sort_order(order);
    }

    let services = directory.query_services(&filter, &options).await;
    let views: Vec<ServiceView<'_>> = services.iter().map(|e| ServiceView::new(e)).collect();

    Ok(Json(json!({
        "services": views,
        "count": views.len(),
        "query": {
            "filter": filter,
            "maxResults": options.max_results,
            "sortOrder": options.sort_order.to_string(),
        },
        "queryTime": started.elapsed().as_millis() as u64,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestParams {
    pub bbox: Option<String>,
    pub product: Option<String>,
    pub service: Option<String>,
    pub min_confidence: Option<String>,
}

/// GET /api/directory/best
#[instrument(skip(state))]
pub async fn best_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<BestParams>,
) -> ApiResult<Json<Value>> {
    let bbox = require_bbox(params.bbox.as_deref())?;
    let product: ProductType = params
        .product
        .as_deref()
        .ok_or_else(|| DirectoryError::MissingParameter("product".to_string()))?
        .parse()?;
    let service: ServiceType = params
        .service
        .as_deref()
        .ok_or_else(|| DirectoryError::MissingParameter("service".to_string()))?
        .parse()?;

    let mut filter = ServiceFilter::for_service(bbox, product, service);
    if let Some(min_confidence) = parse_confidence(params.min_confidence.as_deref())? {
        filter = filter.with_min_confidence(min_confidence);
    }

    let entry = state.directory.get_best_service(&filter).await.ok_or_else(|| {
        DirectoryError::NoMatchingService(format!(
            "no {} {} service covers {}",
            product,
            service,
            bbox.to_wms_string()
        ))
    })?;

    Ok(Json(json!({ "service": ServiceView::new(&entry) })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductsParams {
    pub bbox: Option<String>,
}

/// GET /api/directory/products
#[instrument(skip(state))]
pub async fn products_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ProductsParams>,
) -> ApiResult<Json<Value>> {
    let bbox = require_bbox(params.bbox.as_deref())?;
    let products: Vec<Value> = state
        .directory
        .available_products(bbox)
        .await
        .into_iter()
        .map(|p| json!({ "code": p.code(), "name": p.display_name() }))
        .collect();

    Ok(Json(json!({
        "products": products,
        "count": products.len(),
        "bbox": bbox,
    })))
}
