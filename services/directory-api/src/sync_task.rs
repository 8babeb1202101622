//! Periodic full sync of the directory against the registry.

use std::sync::Arc;
use tokio::time::{interval_at, Duration, Instant};
use tracing::{error, info, warn};

use s100_common::DirectoryResult;
use service_directory::{FullSyncReport, ServiceDirectory, SyncStatus};

use crate::config::SyncConfig;

/// Background task keeping the cache in step with the registry.
pub struct SyncTask {
    directory: Arc<ServiceDirectory>,
    config: SyncConfig,
}

impl SyncTask {
    pub fn new(directory: Arc<ServiceDirectory>, config: SyncConfig) -> Self {
        Self { directory, config }
    }

    /// One full sync followed by an expiry sweep.
    pub async fn run_once(&self) -> DirectoryResult<FullSyncReport> {
        let report = self.directory.sync_all().await?;
        let purged = self.directory.cleanup_expired().await;

        match report.status {
            SyncStatus::Completed => info!(
                nodes = report.nodes_synced,
                services = report.services_count,
                disabled = report.disabled_count,
                purged = purged,
                duration_ms = report.duration_ms,
                "Directory sync complete"
            ),
            SyncStatus::Partial | SyncStatus::Failed => warn!(
                status = report.status.as_str(),
                nodes = report.nodes_synced,
                failed_nodes = report.failed_nodes.len(),
                errors = report.errors_count,
                purged = purged,
                "Directory sync finished with errors"
            ),
        }
        Ok(report)
    }

    /// Run the sync task in a loop. The first cycle starts immediately.
    pub async fn run_forever(self) {
        if !self.config.enabled {
            info!("Sync task disabled");
            return;
        }

        info!(
            interval_secs = self.config.interval_secs,
            "Starting sync background task"
        );

        let period = Duration::from_secs(self.config.interval_secs);
        let mut ticker = interval_at(Instant::now() + period, period);

        if let Err(e) = self.run_once().await {
            error!(error = %e, "Sync cycle failed");
        }

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Sync cycle failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_directory::DirectoryConfig;
    use test_utils::registries::port_registry;

    #[tokio::test]
    async fn test_run_once_populates_directory() {
        let directory = Arc::new(ServiceDirectory::new(port_registry().await, DirectoryConfig::default()));
        let task = SyncTask::new(directory.clone(), SyncConfig::default());

        let report = task.run_once().await.unwrap();
        assert_eq!(report.status, SyncStatus::Completed);
        assert_eq!(report.nodes_count, 2);
        assert!(directory.has_servable_entries().await);
    }
}
