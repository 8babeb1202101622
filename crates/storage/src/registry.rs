//! Capability registry adapter.
//!
//! The registry is the authoritative record of nodes and the capabilities
//! they publish. The directory only reads it: once to fill the cache during
//! sync, and again per request as the realtime fallback when the cache has
//! nothing to offer.
//!
//! Records are returned raw (product and service codes as strings, coverage
//! as GeoJSON text). Validation is the caller's job so that one bad row is a
//! counted failure instead of a failed listing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::info;

use s100_common::{DirectoryError, DirectoryResult, ProductType, ServiceType};

/// Last known health of a node, as recorded by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Error,
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Confidence given to a live registry answer from a node in this state.
    pub fn confidence(&self) -> f64 {
        match self {
            HealthStatus::Healthy => 1.0,
            HealthStatus::Warning => 0.7,
            HealthStatus::Error => 0.3,
            HealthStatus::Unknown => 0.5,
        }
    }

    /// Parse a stored status; anything unrecognised is `Unknown`.
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "HEALTHY" => HealthStatus::Healthy,
            "WARNING" => HealthStatus::Warning,
            "ERROR" => HealthStatus::Error,
            _ => HealthStatus::Unknown,
        }
    }
}

/// A registered node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub id: String,
    pub name: String,
    /// Base URL that relative capability endpoints are joined to.
    pub api_url: Option<String>,
    /// GeoJSON text of the node's overall coverage.
    pub coverage: Option<String>,
    pub health_status: HealthStatus,
    pub is_active: bool,
}

/// One enabled capability as stored in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRecord {
    pub product_type: String,
    pub service_type: String,
    pub endpoint: Option<String>,
    pub version: Option<String>,
    /// GeoJSON text; when absent the node coverage applies.
    pub coverage: Option<String>,
}

/// A capability together with the node that offers it.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedCapability {
    pub node: NodeInfo,
    pub capability: CapabilityRecord,
}

/// Read access to the authoritative node and capability records.
#[async_trait]
pub trait CapabilityRegistry: Send + Sync {
    /// Look up a node regardless of its active flag.
    async fn node(&self, node_id: &str) -> DirectoryResult<Option<NodeInfo>>;

    async fn list_active_nodes(&self) -> DirectoryResult<Vec<NodeInfo>>;

    /// Enabled capabilities of one node.
    async fn list_enabled_capabilities(&self, node_id: &str) -> DirectoryResult<Vec<CapabilityRecord>>;

    /// Enabled capabilities of active nodes, optionally restricted by product
    /// and service type. `None` means no restriction.
    async fn list_enabled_capabilities_matching(
        &self,
        product_types: Option<&[ProductType]>,
        service_types: Option<&[ServiceType]>,
    ) -> DirectoryResult<Vec<MatchedCapability>>;

    /// Cheap reachability check used by readiness probes.
    async fn ping(&self) -> DirectoryResult<()> {
        Ok(())
    }
}

fn matches_filter(
    record: &CapabilityRecord,
    product_types: Option<&[ProductType]>,
    service_types: Option<&[ServiceType]>,
) -> bool {
    let product_ok = match product_types {
        None => true,
        Some(wanted) => record
            .product_type
            .parse::<ProductType>()
            .map(|p| wanted.contains(&p))
            .unwrap_or(false),
    };
    let service_ok = match service_types {
        None => true,
        Some(wanted) => record
            .service_type
            .parse::<ServiceType>()
            .map(|s| wanted.contains(&s))
            .unwrap_or(false),
    };
    product_ok && service_ok
}

// ============================================================================
// Static registry
// ============================================================================

#[derive(Debug, Clone)]
struct StaticNode {
    info: NodeInfo,
    capabilities: Vec<StaticCapability>,
}

#[derive(Debug, Clone)]
struct StaticCapability {
    record: CapabilityRecord,
    is_enabled: bool,
}

/// Registry held in memory, optionally loaded from a YAML file.
///
/// Used for standalone deployments without a database and in tests.
///
/// ```yaml
/// nodes:
///   - id: shanghai
///     name: Shanghai Port Authority
///     apiUrl: http://shanghai.example.org
///     healthStatus: HEALTHY
///     coverage: {type: Polygon, coordinates: [[[120,30],[122,30],[122,32],[120,32],[120,30]]]}
///     capabilities:
///       - productType: S101
///         serviceType: WMS
///         endpoint: /api/v1/s101/wms
///         version: "1.3.0"
/// ```
#[derive(Debug, Default)]
pub struct StaticRegistry {
    nodes: RwLock<Vec<StaticNode>>,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    nodes: Vec<NodeSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeSpec {
    id: String,
    name: String,
    #[serde(default)]
    api_url: Option<String>,
    #[serde(default)]
    coverage: Option<serde_json::Value>,
    #[serde(default)]
    health_status: HealthStatus,
    #[serde(default = "default_true")]
    is_active: bool,
    #[serde(default)]
    capabilities: Vec<CapabilitySpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CapabilitySpec {
    product_type: String,
    service_type: String,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    coverage: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    is_enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Coverage may be written inline as a mapping or as a JSON string.
fn coverage_text(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl From<NodeSpec> for StaticNode {
    fn from(spec: NodeSpec) -> Self {
        StaticNode {
            info: NodeInfo {
                id: spec.id,
                name: spec.name,
                api_url: spec.api_url,
                coverage: coverage_text(spec.coverage),
                health_status: spec.health_status,
                is_active: spec.is_active,
            },
            capabilities: spec
                .capabilities
                .into_iter()
                .map(|c| StaticCapability {
                    record: CapabilityRecord {
                        product_type: c.product_type,
                        service_type: c.service_type,
                        endpoint: c.endpoint,
                        version: c.version,
                        coverage: coverage_text(c.coverage),
                    },
                    is_enabled: c.is_enabled,
                })
                .collect(),
        }
    }
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry document.
    pub fn from_yaml_str(yaml: &str) -> DirectoryResult<Self> {
        let file: RegistryFile = serde_yaml::from_str(yaml)
            .map_err(|e| DirectoryError::RegistryError(format!("Invalid registry file: {}", e)))?;
        let nodes: Vec<StaticNode> = file.nodes.into_iter().map(StaticNode::from).collect();
        Ok(Self {
            nodes: RwLock::new(nodes),
        })
    }

    /// Load a registry document from disk.
    pub async fn from_file(path: impl AsRef<Path>) -> DirectoryResult<Self> {
        let path = path.as_ref();
        let yaml = tokio::fs::read_to_string(path).await.map_err(|e| {
            DirectoryError::RegistryError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let registry = Self::from_yaml_str(&yaml)?;
        info!(
            path = %path.display(),
            nodes = registry.nodes.read().await.len(),
            "Loaded static registry"
        );
        Ok(registry)
    }

    /// Insert or replace a node and all of its capabilities (all enabled).
    pub async fn upsert_node(&self, node: NodeInfo, capabilities: Vec<CapabilityRecord>) {
        let replacement = StaticNode {
            info: node,
            capabilities: capabilities
                .into_iter()
                .map(|record| StaticCapability {
                    record,
                    is_enabled: true,
                })
                .collect(),
        };
        let mut nodes = self.nodes.write().await;
        match nodes.iter_mut().find(|n| n.info.id == replacement.info.id) {
            Some(existing) => *existing = replacement,
            None => nodes.push(replacement),
        }
    }

    /// Toggle one capability. Returns false when it does not exist.
    pub async fn set_capability_enabled(
        &self,
        node_id: &str,
        product_type: ProductType,
        service_type: ServiceType,
        enabled: bool,
    ) -> bool {
        let mut nodes = self.nodes.write().await;
        let Some(node) = nodes.iter_mut().find(|n| n.info.id == node_id) else {
            return false;
        };
        let mut found = false;
        for capability in node.capabilities.iter_mut() {
            if matches_filter(
                &capability.record,
                Some(std::slice::from_ref(&product_type)),
                Some(std::slice::from_ref(&service_type)),
            ) {
                capability.is_enabled = enabled;
                found = true;
            }
        }
        found
    }

    /// Mark a node active or inactive. Returns false when it does not exist.
    pub async fn set_node_active(&self, node_id: &str, active: bool) -> bool {
        self.update_node(node_id, |info| info.is_active = active).await
    }

    pub async fn set_health_status(&self, node_id: &str, status: HealthStatus) -> bool {
        self.update_node(node_id, |info| info.health_status = status).await
    }

    async fn update_node(&self, node_id: &str, update: impl FnOnce(&mut NodeInfo)) -> bool {
        let mut nodes = self.nodes.write().await;
        match nodes.iter_mut().find(|n| n.info.id == node_id) {
            Some(node) => {
                update(&mut node.info);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl CapabilityRegistry for StaticRegistry {
    async fn node(&self, node_id: &str) -> DirectoryResult<Option<NodeInfo>> {
        let nodes = self.nodes.read().await;
        Ok(nodes
            .iter()
            .find(|n| n.info.id == node_id)
            .map(|n| n.info.clone()))
    }

    async fn list_active_nodes(&self) -> DirectoryResult<Vec<NodeInfo>> {
        let nodes = self.nodes.read().await;
        Ok(nodes
            .iter()
            .filter(|n| n.info.is_active)
            .map(|n| n.info.clone())
            .collect())
    }

    async fn list_enabled_capabilities(&self, node_id: &str) -> DirectoryResult<Vec<CapabilityRecord>> {
        let nodes = self.nodes.read().await;
        Ok(nodes
            .iter()
            .filter(|n| n.info.id == node_id)
            .flat_map(|n| n.capabilities.iter())
            .filter(|c| c.is_enabled)
            .map(|c| c.record.clone())
            .collect())
    }

    async fn list_enabled_capabilities_matching(
        &self,
        product_types: Option<&[ProductType]>,
        service_types: Option<&[ServiceType]>,
    ) -> DirectoryResult<Vec<MatchedCapability>> {
        let nodes = self.nodes.read().await;
        let mut matched = Vec::new();
        for node in nodes.iter().filter(|n| n.info.is_active) {
            for capability in node.capabilities.iter().filter(|c| c.is_enabled) {
                if matches_filter(&capability.record, product_types, service_types) {
                    matched.push(MatchedCapability {
                        node: node.info.clone(),
                        capability: capability.record.clone(),
                    });
                }
            }
        }
        Ok(matched)
    }
}
