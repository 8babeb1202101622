//! Application state and shared resources.

use anyhow::{bail, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::{info, warn};

use service_directory::ServiceDirectory;
use storage::{CapabilityRegistry, PgRegistry, StaticRegistry};

use crate::config::ServerConfig;
use crate::metrics::ResolverMetrics;
use crate::renderer::{HttpRenderer, Renderer, UnavailableRenderer};

/// Shared application state.
pub struct AppState {
    pub directory: Arc<ServiceDirectory>,
    pub renderer: Arc<dyn Renderer>,
    pub metrics: Arc<ResolverMetrics>,
    pub config: ServerConfig,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Connect the configured registry and renderer.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let registry: Arc<dyn CapabilityRegistry> = if let Some(path) = &config.registry_file {
            info!(path = %path.display(), "Loading static registry");
            Arc::new(StaticRegistry::from_file(path).await?)
        } else if let Some(url) = &config.database_url {
            info!("Connecting to registry database");
            let registry = PgRegistry::connect(url).await?;
            registry.migrate().await?;
            Arc::new(registry)
        } else {
            bail!("No registry configured: set REGISTRY_FILE or DATABASE_URL");
        };

        let renderer: Arc<dyn Renderer> = match &config.renderer_url {
            Some(url) => Arc::new(HttpRenderer::new(url, config.render_timeout)?),
            None => {
                warn!("RENDERER_URL not set, direct rendering disabled");
                Arc::new(UnavailableRenderer)
            }
        };

        Ok(Self::from_parts(registry, renderer, config))
    }

    /// Assemble state from already-built collaborators.
    pub fn from_parts(
        registry: Arc<dyn CapabilityRegistry>,
        renderer: Arc<dyn Renderer>,
        config: ServerConfig,
    ) -> Self {
        let directory = Arc::new(ServiceDirectory::new(registry, config.directory.clone()));
        Self {
            directory,
            renderer,
            metrics: Arc::new(ResolverMetrics::new()),
            config,
            prometheus: None,
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}
