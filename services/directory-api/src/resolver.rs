//! Request resolution for product/service endpoints.
//!
//! Each inbound OGC request makes one pass through
//! `cached -> realtime -> direct -> unavailable`. Nothing is retried.
//! Capability discovery and operations the directory does not route are
//! forwarded to the renderer unchanged.

use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use s100_common::{BoundingBox, DirectoryError, DirectoryResult, ProductType, ServiceType};
use service_directory::ServiceFilter;
use storage::DirectoryEntry;

use crate::metrics::QueryMode;
use crate::renderer::{RenderRequest, RenderedResponse};
use crate::state::AppState;

/// How an OGC operation is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Capability discovery; always answered by the renderer.
    Discovery,
    /// Data request routed through the directory.
    Resolvable,
    /// Anything else; forwarded to the renderer as is.
    Passthrough,
}

/// Classify `operation` for a service type. Case-insensitive.
pub fn classify(service_type: ServiceType, operation: &str) -> RequestKind {
    let operation = operation.trim().to_ascii_lowercase();
    match (service_type, operation.as_str()) {
        (_, "getcapabilities") => RequestKind::Discovery,
        (ServiceType::Wcs, "describecoverage") => RequestKind::Discovery,
        (ServiceType::Wfs, "describefeaturetype") => RequestKind::Discovery,
        (ServiceType::Wms, "getmap") => RequestKind::Resolvable,
        (ServiceType::Wcs, "getcoverage") => RequestKind::Resolvable,
        (ServiceType::Wfs, "getfeature") => RequestKind::Resolvable,
        _ => RequestKind::Passthrough,
    }
}

/// First non-blank value of `name`, matched case-insensitively.
pub fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, value)| key.eq_ignore_ascii_case(name) && !value.trim().is_empty())
        .map(|(_, value)| value.trim())
}

fn required<'a>(params: &'a [(String, String)], name: &str) -> DirectoryResult<&'a str> {
    param(params, name).ok_or_else(|| DirectoryError::MissingParameter(name.to_string()))
}

fn dimension(params: &[(String, String)], name: &str) -> DirectoryResult<u32> {
    let raw = required(params, name)?;
    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(DirectoryError::InvalidDimensions(format!(
            "{} must be a positive integer, got '{}'",
            name, raw
        ))),
    }
}

/// A validated inbound request.
#[derive(Debug, Clone)]
pub struct OgcRequest {
    pub product_type: ProductType,
    pub service_type: ServiceType,
    pub operation: String,
    pub kind: RequestKind,
    /// Present for resolvable requests.
    pub bbox: Option<BoundingBox>,
    pub use_cache: bool,
    /// Original parameters, in order and spelling.
    pub params: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl OgcRequest {
    /// Validate parameters for the given endpoint.
    pub fn parse(
        product_type: ProductType,
        service_type: ServiceType,
        params: Vec<(String, String)>,
        body: Option<Bytes>,
    ) -> DirectoryResult<Self> {
        let service = required(&params, "SERVICE")?;
        if !service.eq_ignore_ascii_case(service_type.code()) {
            return Err(DirectoryError::ServiceMismatch {
                requested: service.to_string(),
                expected: service_type.code().to_string(),
            });
        }

        let operation = required(&params, "REQUEST")?.to_string();
        let kind = classify(service_type, &operation);

        let bbox = match kind {
            RequestKind::Resolvable => {
                if service_type == ServiceType::Wcs {
                    required(&params, "COVERAGEID")?;
                }
                let bbox = BoundingBox::from_wms_string(required(&params, "BBOX")?)?;
                if service_type != ServiceType::Wfs {
                    dimension(&params, "WIDTH")?;
                    dimension(&params, "HEIGHT")?;
                }
                Some(bbox)
            }
            RequestKind::Discovery | RequestKind::Passthrough => None,
        };

        let use_cache = !matches!(
            param(&params, "useCache").map(|v| v.to_ascii_lowercase()).as_deref(),
            Some("false") | Some("0") | Some("no")
        );

        Ok(Self {
            product_type,
            service_type,
            operation,
            kind,
            bbox,
            use_cache,
            params,
            body,
        })
    }

    /// Directory filter for this request, if it carries a bbox.
    pub fn filter(&self, min_confidence: f64) -> Option<ServiceFilter> {
        self.bbox.map(|bbox| {
            ServiceFilter::for_service(bbox, self.product_type, self.service_type)
                .with_min_confidence(min_confidence)
        })
    }

    fn render_request(&self) -> RenderRequest {
        RenderRequest {
            product_type: self.product_type,
            service_type: self.service_type,
            params: self.params.clone(),
            body: self.body.clone(),
        }
    }
}

/// Terminal state of the resolution chain.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// 307 to a directory entry (`Cached` or `Realtime`).
    Redirect {
        mode: QueryMode,
        location: String,
        entry: Arc<DirectoryEntry>,
    },
    /// Renderer output (`Direct` or `Passthrough`).
    Rendered {
        mode: QueryMode,
        response: RenderedResponse,
    },
    Unavailable {
        reason: String,
    },
}

impl Resolution {
    pub fn mode(&self) -> QueryMode {
        match self {
            Resolution::Redirect { mode, .. } | Resolution::Rendered { mode, .. } => *mode,
            Resolution::Unavailable { .. } => QueryMode::Unavailable,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub resolution: Resolution,
    pub elapsed: Duration,
}

/// Build the redirect target: the endpoint, minus any of its own query
/// parameters that the request also carries, followed by every request
/// parameter in its original order.
pub fn redirect_location(endpoint: &str, params: &[(String, String)]) -> DirectoryResult<String> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| DirectoryError::InternalError(format!("Bad endpoint '{}': {}", endpoint, e)))?;

    let overridden: HashSet<String> = params.iter().map(|(k, _)| k.to_ascii_lowercase()).collect();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !overridden.contains(&k.to_ascii_lowercase()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.set_query(None);
    if !kept.is_empty() || !params.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(kept.iter())
            .extend_pairs(params.iter());
    }
    Ok(url.to_string())
}

/// Run `request` through the resolution chain.
pub async fn resolve(state: &AppState, request: &OgcRequest) -> Resolved {
    let started = Instant::now();

    let resolution = match request.kind {
        RequestKind::Discovery | RequestKind::Passthrough => passthrough(state, request).await,
        RequestKind::Resolvable => resolve_chain(state, request).await,
    };

    let elapsed = started.elapsed();
    state.metrics.record_resolution(resolution.mode(), elapsed).await;
    Resolved {
        resolution,
        elapsed,
    }
}

async fn passthrough(state: &AppState, request: &OgcRequest) -> Resolution {
    match render(state, request).await {
        Ok(response) => Resolution::Rendered {
            mode: QueryMode::Passthrough,
            response,
        },
        Err(err) => Resolution::Unavailable {
            reason: err.to_string(),
        },
    }
}

async fn resolve_chain(state: &AppState, request: &OgcRequest) -> Resolution {
    let directory = &state.directory;
    let Some(filter) = request.filter(directory.config().min_confidence) else {
        return Resolution::Unavailable {
            reason: "request has no bounding box".to_string(),
        };
    };

    // 1. cached
    if request.use_cache {
        if let Some(entry) = directory.get_best_service(&filter).await {
            match redirect_location(&entry.endpoint, &request.params) {
                Ok(location) => {
                    state.metrics.record_cache_hit();
                    info!(
                        node_id = %entry.node_id,
                        confidence = entry.confidence,
                        "Resolved from directory cache"
                    );
                    return Resolution::Redirect {
                        mode: QueryMode::Cached,
                        location,
                        entry,
                    };
                }
                Err(err) => warn!(node_id = %entry.node_id, error = %err, "Cached endpoint unusable"),
            }
        }
        state.metrics.record_cache_miss();
        debug!("Directory cache miss, querying registry");
    } else {
        debug!("Cache bypassed by request");
    }

    // 2. realtime
    match directory.realtime_lookup(&filter).await {
        Ok(Some(entry)) => match redirect_location(&entry.endpoint, &request.params) {
            Ok(location) => {
                info!(
                    node_id = %entry.node_id,
                    confidence = entry.confidence,
                    "Resolved from registry"
                );
                return Resolution::Redirect {
                    mode: QueryMode::Realtime,
                    location,
                    entry,
                };
            }
            Err(err) => warn!(node_id = %entry.node_id, error = %err, "Registry endpoint unusable"),
        },
        Ok(None) => debug!("No registry candidate, rendering directly"),
        Err(err) => {
            state.metrics.record_registry_error();
            warn!(error = %err, "Realtime registry lookup failed");
        }
    }

    // 3. direct
    match render(state, request).await {
        Ok(response) if response.is_success() => Resolution::Rendered {
            mode: QueryMode::Direct,
            response,
        },
        Ok(response) => {
            state.metrics.record_render_error();
            warn!(status = response.status, "Direct render unsuccessful");
            Resolution::Unavailable {
                reason: format!("renderer returned status {}", response.status),
            }
        }
        // 4. unavailable
        Err(err) => Resolution::Unavailable {
            reason: err.to_string(),
        },
    }
}

/// Call the renderer within the configured budget.
async fn render(state: &AppState, request: &OgcRequest) -> DirectoryResult<RenderedResponse> {
    let budget = state.config.render_timeout;
    match tokio::time::timeout(budget, state.renderer.render(&request.render_request())).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(err)) => {
            if matches!(err, DirectoryError::Timeout) {
                state.metrics.record_render_timeout();
            } else {
                state.metrics.record_render_error();
            }
            warn!(error = %err, "Renderer call failed");
            Err(err)
        }
        Err(_) => {
            state.metrics.record_render_timeout();
            warn!(timeout_ms = budget.as_millis() as u64, "Renderer call timed out");
            Err(DirectoryError::Timeout)
        }
    }
}
