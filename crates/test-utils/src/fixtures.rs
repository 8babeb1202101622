//! Common test fixtures for directory tests.
//!
//! Coordinates are around the Yangtze estuary: a Shanghai node covering
//! [120,30,122,32] and a Ningbo node covering [121,29,122.5,30.5].

use chrono::{Duration, Utc};

use s100_common::{BoundingBox, Coverage, ProductType, ServiceType};
use storage::{CapabilityRecord, DirectoryEntry, HealthStatus, NodeInfo};

/// Bounding boxes used across tests.
pub mod bbox {
    use s100_common::BoundingBox;

    /// Shanghai node coverage.
    pub const SHANGHAI: BoundingBox = BoundingBox::new(120.0, 30.0, 122.0, 32.0);

    /// Ningbo node coverage; overlaps the south-east corner of Shanghai.
    pub const NINGBO: BoundingBox = BoundingBox::new(121.0, 29.0, 122.5, 30.5);

    /// Query inside Shanghai only.
    pub const HUANGPU: BoundingBox = BoundingBox::new(121.0, 31.0, 121.5, 31.5);

    /// Query inside both nodes.
    pub const HANGZHOU_BAY: BoundingBox = BoundingBox::new(121.2, 30.1, 121.6, 30.4);

    /// Query that touches nothing.
    pub const NORTH_ATLANTIC: BoundingBox = BoundingBox::new(-40.0, 40.0, -30.0, 50.0);
}

/// GeoJSON polygon text for a bbox.
pub fn polygon_json(bbox: &BoundingBox) -> String {
    format!(
        r#"{{"type":"Polygon","coordinates":[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]}}"#,
        x0 = bbox.min_x,
        y0 = bbox.min_y,
        x1 = bbox.max_x,
        y1 = bbox.max_y
    )
}

pub const MALFORMED_COVERAGE: &str = r#"{"type":"Polygon","coordinates":[[[120,30],[122,30]"#;

pub fn shanghai_node() -> NodeInfo {
    NodeInfo {
        id: "shanghai".to_string(),
        name: "Shanghai Maritime Safety Administration".to_string(),
        api_url: Some("http://shanghai.example.org".to_string()),
        coverage: Some(polygon_json(&bbox::SHANGHAI)),
        health_status: HealthStatus::Healthy,
        is_active: true,
    }
}

pub fn ningbo_node() -> NodeInfo {
    NodeInfo {
        id: "ningbo".to_string(),
        name: "Ningbo Port Authority".to_string(),
        api_url: Some("http://ningbo.example.org/services".to_string()),
        coverage: Some(polygon_json(&bbox::NINGBO)),
        health_status: HealthStatus::Warning,
        is_active: true,
    }
}

/// Capability inheriting the node coverage and default endpoint.
pub fn capability(product_type: ProductType, service_type: ServiceType) -> CapabilityRecord {
    CapabilityRecord {
        product_type: product_type.code().to_string(),
        service_type: service_type.code().to_string(),
        endpoint: None,
        version: Some(default_version(service_type).to_string()),
        coverage: None,
    }
}

pub fn default_version(service_type: ServiceType) -> &'static str {
    match service_type {
        ServiceType::Wms => "1.3.0",
        ServiceType::Wfs => "2.0.0",
        ServiceType::Wcs => "2.0.1",
    }
}

/// Builder for directory entries with sensible defaults: Shanghai coverage,
/// full confidence, synced now, expiring in one hour.
#[derive(Debug, Clone)]
pub struct EntryBuilder {
    entry: DirectoryEntry,
}

impl EntryBuilder {
    pub fn new(node_id: &str, product_type: ProductType, service_type: ServiceType) -> Self {
        let now = Utc::now();
        Self {
            entry: DirectoryEntry {
                node_id: node_id.to_string(),
                node_name: format!("{} node", node_id),
                product_type,
                service_type,
                coverage: Coverage::from_bbox(&bbox::SHANGHAI),
                endpoint: format!(
                    "http://{}.example.org/api/{}/{}",
                    node_id,
                    product_type.code().to_lowercase(),
                    service_type.code().to_lowercase()
                ),
                version: Some(default_version(service_type).to_string()),
                confidence: 1.0,
                last_synced_at: now,
                expires_at: now + Duration::hours(1),
                is_enabled: true,
            },
        }
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.entry.confidence = confidence;
        self
    }

    pub fn synced_ago(mut self, age: Duration) -> Self {
        self.entry.last_synced_at = Utc::now() - age;
        self
    }

    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.entry.expires_at = Utc::now() + ttl;
        self
    }

    pub fn expired(self) -> Self {
        self.expires_in(Duration::seconds(-1))
    }

    pub fn coverage(mut self, coverage: Coverage) -> Self {
        self.entry.coverage = coverage;
        self
    }

    pub fn covering(self, bbox: &BoundingBox) -> Self {
        self.coverage(Coverage::from_bbox(bbox))
    }

    pub fn endpoint(mut self, endpoint: &str) -> Self {
        self.entry.endpoint = endpoint.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.entry.is_enabled = false;
        self
    }

    pub fn build(self) -> DirectoryEntry {
        self.entry
    }
}
