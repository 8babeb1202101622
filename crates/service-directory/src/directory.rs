//! The service directory: spatial resolution over cached entries, and
//! reconciliation of those entries with the capability registry.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use metrics::counter;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use s100_common::{intersects, BoundingBox, DirectoryError, DirectoryResult, ProductType};
use storage::{CapabilityRegistry, DirectoryEntry, DirectoryStore, EntryKey};

use crate::capability::{build_entry, Stamp};
use crate::config::DirectoryConfig;
use crate::query::{QueryOptions, ServiceFilter};
use crate::ranking::{self, SortBy, SortOrder};
use crate::stats::{DirectoryStats, StoreCounters};
use crate::sync::{
    CapabilityFailure, FullSyncReport, NodeFailure, SyncOutcome, SyncReport, SyncStatus, SyncTracker,
};

/// Confidence written for entries read straight from the registry at sync.
pub const SYNCED_CONFIDENCE: f64 = 1.0;

/// Owns the entry store and resolves service lookups against it.
///
/// One instance per process, shared by handlers through `Arc`.
pub struct ServiceDirectory {
    store: DirectoryStore,
    registry: Arc<dyn CapabilityRegistry>,
    config: DirectoryConfig,
    /// One mutex per node; a node is never reconciled twice at once.
    node_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    full_sync: Mutex<()>,
    tracker: SyncTracker,
    malformed_coverage: AtomicU64,
}

impl ServiceDirectory {
    pub fn new(registry: Arc<dyn CapabilityRegistry>, config: DirectoryConfig) -> Self {
        Self {
            store: DirectoryStore::new(),
            registry,
            config,
            node_locks: Mutex::new(HashMap::new()),
            full_sync: Mutex::new(()),
            tracker: SyncTracker::new(),
            malformed_coverage: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &DirectoryStore {
        &self.store
    }

    pub fn registry(&self) -> &Arc<dyn CapabilityRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    pub fn tracker(&self) -> &SyncTracker {
        &self.tracker
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Enabled, unexpired entries accepted by `filter` whose coverage
    /// intersects the bbox, ranked and truncated per `options`.
    ///
    /// An empty result means the cache knows nothing, not that no service
    /// exists.
    pub async fn query_services(&self, filter: &ServiceFilter, options: &QueryOptions) -> Vec<Arc<DirectoryEntry>> {
        let now = Utc::now();
        let mut results: Vec<Arc<DirectoryEntry>> = self
            .store
            .scan(|entry| entry.is_servable_at(now) && filter.accepts(entry))
            .await
            .filter(|entry| self.covers(&filter.bbox, entry))
            .collect();

        ranking::rank(&mut results, options.sort_by, options.sort_order);
        results.truncate(options.max_results);
        results
    }

    /// The head of `query_services(filter, max 1, confidence desc)`.
    pub async fn get_best_service(&self, filter: &ServiceFilter) -> Option<Arc<DirectoryEntry>> {
        self.query_services(filter, &QueryOptions::best())
            .await
            .into_iter()
            .next()
    }

    /// Distinct products with at least one servable entry over `bbox`.
    pub async fn available_products(&self, bbox: BoundingBox) -> Vec<ProductType> {
        let options = QueryOptions::new(usize::MAX);
        self.query_services(&ServiceFilter::new(bbox), &options)
            .await
            .iter()
            .map(|entry| entry.product_type)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Ask the registry directly, bypassing the cache.
    ///
    /// Candidates are scored by node health and ranked with the same
    /// comparator as cached entries. Nothing is written to the store.
    #[instrument(skip_all)]
    pub async fn realtime_lookup(&self, filter: &ServiceFilter) -> DirectoryResult<Option<Arc<DirectoryEntry>>> {
        let matches = self
            .registry
            .list_enabled_capabilities_matching(filter.product_types.as_deref(), filter.service_types.as_deref())
            .await?;

        let now = Utc::now();
        let expires_at = now + self.config.ttl();
        let mut candidates: Vec<Arc<DirectoryEntry>> = matches
            .iter()
            .filter(|m| m.node.is_active)
            .filter_map(|m| {
                let stamp = Stamp {
                    confidence: m.node.health_status.confidence(),
                    synced_at: now,
                    expires_at,
                };
                match build_entry(&m.node, &m.capability, stamp) {
                    Ok(entry) => Some(entry),
                    Err(reason) => {
                        debug!(node_id = %m.node.id, reason = %reason, "Skipping realtime candidate");
                        None
                    }
                }
            })
            .filter(|entry| filter.accepts(entry) && intersects(&filter.bbox, &entry.coverage))
            .map(Arc::new)
            .collect();

        ranking::rank(&mut candidates, SortBy::Confidence, SortOrder::Desc);
        Ok(candidates.into_iter().next())
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Reconcile one node's enabled capabilities into the store.
    ///
    /// Each capability becomes an entry with full confidence and a fresh
    /// TTL. Cached entries of the node that were not written by this run are
    /// disabled. A rejected capability is counted and skipped.
    #[instrument(skip(self))]
    pub async fn sync_node_capabilities(&self, node_id: &str) -> DirectoryResult<SyncReport> {
        let lock = self.node_lock(node_id).await;
        let _guard = lock.lock().await;

        let run_id = self.tracker.start(format!("node:{}", node_id)).await;
        let started = Instant::now();
        let result = self.reconcile_node(node_id, &run_id, started).await;
        if matches!(result, Err(DirectoryError::NodeNotFound(_))) {
            self.release_node_lock(node_id, &lock).await;
        }

        match &result {
            Ok(report) => {
                self.tracker
                    .complete(
                        &run_id,
                        report.status,
                        SyncOutcome {
                            capabilities_count: report.capabilities_count,
                            services_count: report.services_count,
                            errors_count: report.errors_count,
                            error_message: None,
                        },
                    )
                    .await;
                counter!("directory_syncs_total", "status" => report.status.as_str()).increment(1);
                if report.errors_count > 0 {
                    counter!("directory_sync_errors_total").increment(report.errors_count as u64);
                    warn!(
                        code = "SYNC_PARTIAL_FAILURE",
                        node_id = %node_id,
                        capabilities = report.capabilities_count,
                        services = report.services_count,
                        errors = report.errors_count,
                        "Node sync finished with rejected capabilities"
                    );
                } else {
                    info!(
                        node_id = %node_id,
                        capabilities = report.capabilities_count,
                        services = report.services_count,
                        disabled = report.disabled_count,
                        duration_ms = report.duration_ms,
                        "Node sync completed"
                    );
                }
            }
            Err(err) => {
                self.tracker
                    .complete(&run_id, SyncStatus::Failed, SyncOutcome::failed(err))
                    .await;
                counter!("directory_syncs_total", "status" => SyncStatus::Failed.as_str()).increment(1);
                warn!(node_id = %node_id, error = %err, "Node sync failed");
            }
        }

        result
    }

    async fn reconcile_node(&self, node_id: &str, run_id: &str, started: Instant) -> DirectoryResult<SyncReport> {
        let node = match self.registry.node(node_id).await? {
            Some(node) if node.is_active => node,
            Some(_) => {
                let disabled = self.store.disable_node_except(node_id, &HashSet::new()).await;
                info!(node_id = %node_id, disabled = disabled.len(), "Node inactive, entries disabled");
                return Ok(SyncReport {
                    run_id: run_id.to_string(),
                    node_id: node_id.to_string(),
                    capabilities_count: 0,
                    services_count: 0,
                    errors_count: 0,
                    disabled_count: disabled.len(),
                    failures: Vec::new(),
                    status: SyncStatus::Completed,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
            }
            None => {
                let disabled = self.store.disable_node_except(node_id, &HashSet::new()).await;
                if !disabled.is_empty() {
                    info!(node_id = %node_id, disabled = disabled.len(), "Unknown node, entries disabled");
                }
                return Err(DirectoryError::NodeNotFound(node_id.to_string()));
            }
        };

        let records = self.registry.list_enabled_capabilities(node_id).await?;

        let now = Utc::now();
        let stamp = Stamp {
            confidence: SYNCED_CONFIDENCE,
            synced_at: now,
            expires_at: now + self.config.ttl(),
        };

        let mut written: HashSet<EntryKey> = HashSet::new();
        let mut failures = Vec::new();
        let mut services_count = 0;

        for record in &records {
            let rejected = match build_entry(&node, record, stamp) {
                Ok(entry) => {
                    let key = entry.key();
                    match self.store.upsert(entry).await {
                        Ok(_) => {
                            written.insert(key);
                            services_count += 1;
                            None
                        }
                        Err(err) => Some((err.error_code().to_string(), err.to_string())),
                    }
                }
                Err(reason) => Some((reason.code().to_string(), reason.to_string())),
            };

            if let Some((code, reason)) = rejected {
                warn!(
                    node_id = %node_id,
                    product = %record.product_type,
                    service = %record.service_type,
                    code = %code,
                    reason = %reason,
                    "Rejected capability"
                );
                failures.push(CapabilityFailure {
                    product_type: record.product_type.clone(),
                    service_type: record.service_type.clone(),
                    code,
                    reason,
                });
            }
        }

        let disabled = self.store.disable_node_except(node_id, &written).await;

        Ok(SyncReport {
            run_id: run_id.to_string(),
            node_id: node_id.to_string(),
            capabilities_count: records.len(),
            services_count,
            errors_count: failures.len(),
            disabled_count: disabled.len(),
            status: SyncStatus::from_errors(failures.len()),
            failures,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn node_lock(&self, node_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.node_locks.lock().await;
        locks.entry(node_id.to_string()).or_default().clone()
    }

    /// Forget the lock of a node the registry does not know, unless another
    /// sync of that node is waiting on it.
    async fn release_node_lock(&self, node_id: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.node_locks.lock().await;
        let unshared = locks
            .get(node_id)
            .is_some_and(|held| Arc::ptr_eq(held, lock) && Arc::strong_count(held) == 2);
        if unshared {
            locks.remove(node_id);
        }
    }

    /// Number of nodes with a sync lock.
    pub async fn tracked_nodes(&self) -> usize {
        self.node_locks.lock().await.len()
    }

    /// Sync every active node, then disable entries of nodes that are no
    /// longer active. Only one full sync runs at a time.
    ///
    /// Orphans are only disabled when they were last synced before this run
    /// began, so a node synced on its own meanwhile keeps its entries.
    #[instrument(skip(self))]
    pub async fn sync_all(&self) -> DirectoryResult<FullSyncReport> {
        let Ok(_guard) = self.full_sync.try_lock() else {
            return Err(DirectoryError::ServiceUnavailable("sync already running".to_string()));
        };

        let run_id = self.tracker.start("full").await;
        let started = Instant::now();
        let cutoff = Utc::now();

        let nodes = match self.registry.list_active_nodes().await {
            Ok(nodes) => nodes,
            Err(err) => {
                self.tracker
                    .complete(&run_id, SyncStatus::Failed, SyncOutcome::failed(&err))
                    .await;
                counter!("directory_syncs_total", "status" => SyncStatus::Failed.as_str()).increment(1);
                warn!(error = %err, "Full sync could not list nodes");
                return Err(err);
            }
        };

        let node_ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let results: Vec<(String, DirectoryResult<SyncReport>)> = stream::iter(node_ids)
            .map(|node_id| async move {
                let result = self.sync_node_capabilities(&node_id).await;
                (node_id, result)
            })
            .buffer_unordered(self.config.sync_concurrency.max(1))
            .collect()
            .await;

        let active: HashSet<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let orphaned = self.store.disable_nodes_not_in(&active, cutoff).await;

        let mut reports = Vec::new();
        let mut failed_nodes = Vec::new();
        for (node_id, result) in results {
            match result {
                Ok(report) => reports.push(report),
                Err(err) => failed_nodes.push(NodeFailure::new(&node_id, &err)),
            }
        }
        reports.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        failed_nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));

        let capabilities_count = reports.iter().map(|r| r.capabilities_count).sum();
        let services_count = reports.iter().map(|r| r.services_count).sum();
        let errors_count = reports.iter().map(|r| r.errors_count).sum::<usize>();
        let disabled_count = reports.iter().map(|r| r.disabled_count).sum::<usize>() + orphaned.len();

        let status = if !nodes.is_empty() && reports.is_empty() {
            SyncStatus::Failed
        } else {
            SyncStatus::from_errors(errors_count + failed_nodes.len())
        };

        self.tracker
            .complete(
                &run_id,
                status,
                SyncOutcome {
                    capabilities_count,
                    services_count,
                    errors_count,
                    error_message: (!failed_nodes.is_empty())
                        .then(|| format!("{} node(s) failed", failed_nodes.len())),
                },
            )
            .await;
        counter!("directory_syncs_total", "status" => status.as_str()).increment(1);

        let report = FullSyncReport {
            run_id,
            nodes_count: nodes.len(),
            nodes_synced: reports.len(),
            capabilities_count,
            services_count,
            errors_count,
            disabled_count,
            failed_nodes,
            nodes: reports,
            status,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            nodes = report.nodes_count,
            synced = report.nodes_synced,
            services = report.services_count,
            errors = report.errors_count,
            orphaned = orphaned.len(),
            status = status.as_str(),
            duration_ms = report.duration_ms,
            "Full directory sync finished"
        );

        Ok(report)
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Pause or resume one entry without touching its sync data.
    pub async fn set_entry_enabled(&self, key: &EntryKey, enabled: bool) -> DirectoryResult<()> {
        if self.store.set_enabled(key, enabled).await {
            info!(node_id = %key.node_id, product = %key.product_type, service = %key.service_type, enabled, "Entry toggled");
            Ok(())
        } else {
            Err(DirectoryError::NoMatchingService(format!(
                "{} {} on node {}",
                key.product_type, key.service_type, key.node_id
            )))
        }
    }

    /// Delete entries whose TTL has lapsed.
    pub async fn cleanup_expired(&self) -> usize {
        let removed = self.store.remove_expired(Utc::now()).await;
        info!(removed, "Expired directory entries purged");
        removed
    }

    pub async fn stats(&self) -> DirectoryStats {
        let now = Utc::now();
        let entries: Vec<Arc<DirectoryEntry>> = self.store.scan(|_| true).await.collect();
        let mut stats = DirectoryStats::collect(entries.iter().map(|e| e.as_ref()), now);
        stats.store = StoreCounters::from(self.store.stats());
        stats.malformed_coverage_skips = self.malformed_coverage.load(Ordering::Relaxed);
        stats
    }

    /// True when at least one entry can currently be served.
    pub async fn has_servable_entries(&self) -> bool {
        let now = Utc::now();
        self.store
            .scan(|entry| entry.is_servable_at(now))
            .await
            .next()
            .is_some()
    }

    /// Spatial check that reports unusable coverage instead of failing.
    fn covers(&self, bbox: &BoundingBox, entry: &DirectoryEntry) -> bool {
        let Err(reason) = entry.coverage.extent() else {
            return intersects(bbox, &entry.coverage);
        };
        warn!(
            code = "MALFORMED_COVERAGE",
            node_id = %entry.node_id,
            product = %entry.product_type,
            service = %entry.service_type,
            reason = %reason,
            "Skipping entry with unusable coverage"
        );
        self.malformed_coverage.fetch_add(1, Ordering::Relaxed);
        counter!("directory_malformed_coverage_total").increment(1);
        false
    }
}
