//! Registries for tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use s100_common::{DirectoryError, DirectoryResult, ProductType, ServiceType};
use storage::{CapabilityRecord, CapabilityRegistry, MatchedCapability, NodeInfo, StaticRegistry};

use crate::fixtures::{capability, ningbo_node, shanghai_node};

/// Two ports:
/// - shanghai: S101/WMS, S102/WCS, S124/WFS
/// - ningbo: S101/WMS
pub async fn port_registry() -> Arc<StaticRegistry> {
    let registry = StaticRegistry::new();
    registry
        .upsert_node(
            shanghai_node(),
            vec![
                capability(ProductType::S101, ServiceType::Wms),
                capability(ProductType::S102, ServiceType::Wcs),
                capability(ProductType::S124, ServiceType::Wfs),
            ],
        )
        .await;
    registry
        .upsert_node(ningbo_node(), vec![capability(ProductType::S101, ServiceType::Wms)])
        .await;
    Arc::new(registry)
}

/// Registry wrapper that fails selected calls.
///
/// Capability listings of nodes in `failing_nodes` return a registry error;
/// when `fail_all` is set every call does. Listings of nodes in `slow_nodes`
/// answer after the given delay.
pub struct FlakyRegistry {
    inner: Arc<StaticRegistry>,
    failing_nodes: RwLock<HashSet<String>>,
    slow_nodes: RwLock<HashMap<String, Duration>>,
    fail_all: AtomicBool,
}

impl FlakyRegistry {
    pub fn new(inner: Arc<StaticRegistry>) -> Self {
        Self {
            inner,
            failing_nodes: RwLock::new(HashSet::new()),
            slow_nodes: RwLock::new(HashMap::new()),
            fail_all: AtomicBool::new(false),
        }
    }

    pub async fn fail_node(&self, node_id: &str) {
        self.failing_nodes.write().await.insert(node_id.to_string());
    }

    pub async fn delay_node(&self, node_id: &str, delay: Duration) {
        self.slow_nodes.write().await.insert(node_id.to_string(), delay);
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> DirectoryResult<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            Err(DirectoryError::RegistryError("registry offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CapabilityRegistry for FlakyRegistry {
    async fn node(&self, node_id: &str) -> DirectoryResult<Option<NodeInfo>> {
        self.check()?;
        self.inner.node(node_id).await
    }

    async fn list_active_nodes(&self) -> DirectoryResult<Vec<NodeInfo>> {
        self.check()?;
        self.inner.list_active_nodes().await
    }

    async fn list_enabled_capabilities(&self, node_id: &str) -> DirectoryResult<Vec<CapabilityRecord>> {
        self.check()?;
        let delay = self.slow_nodes.read().await.get(node_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_nodes.read().await.contains(node_id) {
            return Err(DirectoryError::RegistryError(format!("listing {} failed", node_id)));
        }
        self.inner.list_enabled_capabilities(node_id).await
    }

    async fn list_enabled_capabilities_matching(
        &self,
        product_types: Option<&[ProductType]>,
        service_types: Option<&[ServiceType]>,
    ) -> DirectoryResult<Vec<MatchedCapability>> {
        self.check()?;
        self.inner
            .list_enabled_capabilities_matching(product_types, service_types)
            .await
    }

    async fn ping(&self) -> DirectoryResult<()> {
        self.check()
    }
}
