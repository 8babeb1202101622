//! Turning raw registry records into directory entries.

use chrono::{DateTime, Utc};
use url::Url;

use s100_common::{Coverage, CoverageError, ProductType, ServiceType};
use storage::{CapabilityRecord, DirectoryEntry, NodeInfo};

/// Why a capability could not become an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    UnknownProduct(String),
    UnknownService(String),
    BadEndpoint(String),
    BadCoverage(CoverageError),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::UnknownProduct(p) => write!(f, "unknown product type '{}'", p),
            RejectReason::UnknownService(s) => write!(f, "unknown service type '{}'", s),
            RejectReason::BadEndpoint(msg) => write!(f, "unusable endpoint: {}", msg),
            RejectReason::BadCoverage(err) => write!(f, "unusable coverage: {}", err),
        }
    }
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::UnknownProduct(_) => "INVALID_PRODUCT",
            RejectReason::UnknownService(_) => "INVALID_SERVICE_TYPE",
            RejectReason::BadEndpoint(_) => "INVALID_ENDPOINT",
            RejectReason::BadCoverage(_) => "MALFORMED_COVERAGE",
        }
    }
}

/// Timing and scoring stamped onto a freshly built entry.
#[derive(Debug, Clone, Copy)]
pub struct Stamp {
    pub confidence: f64,
    pub synced_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Build the entry for one capability of `node`.
pub fn build_entry(node: &NodeInfo, record: &CapabilityRecord, stamp: Stamp) -> Result<DirectoryEntry, RejectReason> {
    let product_type: ProductType = record
        .product_type
        .parse()
        .map_err(|_| RejectReason::UnknownProduct(record.product_type.clone()))?;
    let service_type: ServiceType = record
        .service_type
        .parse()
        .map_err(|_| RejectReason::UnknownService(record.service_type.clone()))?;

    let endpoint = resolve_endpoint(
        node.api_url.as_deref(),
        record.endpoint.as_deref(),
        product_type,
        service_type,
    )?;
    let coverage = resolve_coverage(record.coverage.as_deref(), node.coverage.as_deref())?;

    Ok(DirectoryEntry {
        node_id: node.id.clone(),
        node_name: node.name.clone(),
        product_type,
        service_type,
        coverage,
        endpoint,
        version: record.version.clone(),
        confidence: stamp.confidence,
        last_synced_at: stamp.synced_at,
        expires_at: stamp.expires_at,
        is_enabled: true,
    })
}

/// Absolute endpoints are used as given. Relative ones are appended to the
/// node's API URL. A missing endpoint becomes `{api_url}/api/{product}/{service}`.
pub fn resolve_endpoint(
    api_url: Option<&str>,
    endpoint: Option<&str>,
    product_type: ProductType,
    service_type: ServiceType,
) -> Result<String, RejectReason> {
    let endpoint = endpoint.map(str::trim).filter(|e| !e.is_empty());

    if let Some(candidate) = endpoint {
        if let Ok(url) = Url::parse(candidate) {
            return check_http(url);
        }
    }

    let base = api_url
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| RejectReason::BadEndpoint("relative endpoint and no node API URL".to_string()))?;
    let base = base.trim_end_matches('/');

    let path = match endpoint {
        Some(relative) => format!("/{}", relative.trim_start_matches('/')),
        None => format!(
            "/api/{}/{}",
            product_type.code().to_lowercase(),
            service_type.code().to_lowercase()
        ),
    };

    let joined = Url::parse(&format!("{}{}", base, path))
        .map_err(|e| RejectReason::BadEndpoint(format!("{}{}: {}", base, path, e)))?;
    check_http(joined)
}

fn check_http(url: Url) -> Result<String, RejectReason> {
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url.to_string()),
        _ => Err(RejectReason::BadEndpoint(format!("{} is not an http(s) URL", url))),
    }
}

/// Capability coverage if usable, else the node's.
fn resolve_coverage(capability: Option<&str>, node: Option<&str>) -> Result<Coverage, RejectReason> {
    let own = Coverage::from_optional(capability);
    if own.is_valid() {
        return Ok(own);
    }
    let inherited = Coverage::from_optional(node);
    if inherited.is_valid() {
        return Ok(inherited);
    }
    // Report the capability's own problem when it had one.
    let reason = if own.is_none() { inherited.extent() } else { own.extent() };
    match reason {
        Err(err) => Err(RejectReason::BadCoverage(err.clone())),
        Ok(_) => Err(RejectReason::BadCoverage(CoverageError::Missing)),
    }
}
