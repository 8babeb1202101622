//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use service_directory::DirectoryConfig;

/// Configuration for the periodic full sync.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Whether sync is enabled
    pub enabled: bool,
    /// How often to run sync (in seconds)
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
        }
    }
}

impl SyncConfig {
    /// Load sync configuration from environment.
    pub fn from_env() -> Self {
        let enabled = std::env::var("ENABLE_SYNC")
            .ok()
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(true);

        let interval_secs = match std::env::var("SYNC_INTERVAL_SECS") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    warn!(value = %raw, "Invalid SYNC_INTERVAL_SECS, using 3600");
                    3600
                }
            },
            Err(_) => 3600,
        };

        Self {
            enabled,
            interval_secs,
        }
    }
}

/// Everything the server reads from its environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PostgreSQL registry.
    pub database_url: Option<String>,
    /// YAML registry; wins over `database_url` when both are set.
    pub registry_file: Option<PathBuf>,
    /// Base URL of the renderer used for direct rendering.
    pub renderer_url: Option<String>,
    /// Budget for one direct render.
    pub render_timeout: Duration,
    pub sync: SyncConfig,
    pub directory: DirectoryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            registry_file: None,
            renderer_url: None,
            render_timeout: Duration::from_millis(5000),
            sync: SyncConfig::default(),
            directory: DirectoryConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let render_timeout_ms = match non_empty("RENDER_TIMEOUT_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => {
                    warn!(value = %raw, "Invalid RENDER_TIMEOUT_MS, using 5000");
                    5000
                }
            },
            None => 5000,
        };

        Self {
            database_url: non_empty("DATABASE_URL"),
            registry_file: non_empty("REGISTRY_FILE").map(PathBuf::from),
            renderer_url: non_empty("RENDERER_URL"),
            render_timeout: Duration::from_millis(render_timeout_ms),
            sync: SyncConfig::from_env(),
            directory: DirectoryConfig::from_env(),
        }
    }
}
