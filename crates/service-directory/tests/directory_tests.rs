//! Tests for querying, ranking and syncing the service directory.

use chrono::{Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use s100_common::{BoundingBox, Coverage, DirectoryError, ProductType, ServiceType};
use service_directory::{
    DirectoryConfig, QueryOptions, ServiceDirectory, ServiceFilter, SortOrder, SyncStatus,
};
use storage::{CapabilityRecord, EntryKey, HealthStatus, StaticRegistry};
use test_utils::{
    bbox, capability, ningbo_node, polygon_json, port_registry, shanghai_node, EntryBuilder,
    FlakyRegistry, MALFORMED_COVERAGE,
};

fn empty_directory() -> ServiceDirectory {
    ServiceDirectory::new(Arc::new(StaticRegistry::new()), DirectoryConfig::default())
}

async fn synced_directory() -> (ServiceDirectory, Arc<StaticRegistry>) {
    let registry = port_registry().await;
    let directory = ServiceDirectory::new(registry.clone(), DirectoryConfig::default());
    directory.sync_all().await.unwrap();
    (directory, registry)
}

fn s101_wms(bbox: BoundingBox) -> ServiceFilter {
    ServiceFilter::for_service(bbox, ProductType::S101, ServiceType::Wms)
}

// ============================================================================
// Query and ranking
// ============================================================================

#[tokio::test]
async fn test_best_service_scenario_then_expiry() {
    let directory = empty_directory();
    let entry = EntryBuilder::new("node-a", ProductType::S102, ServiceType::Wcs)
        .covering(&bbox::SHANGHAI)
        .expires_in(Duration::hours(1))
        .build();
    directory.store().upsert(entry.clone()).await.unwrap();

    let filter = ServiceFilter::for_service(bbox::HUANGPU, ProductType::S102, ServiceType::Wcs)
        .with_min_confidence(0.5);
    let best = directory.get_best_service(&filter).await.unwrap();
    assert_eq!(best.node_id, "node-a");

    let mut expired = entry;
    expired.expires_at = Utc::now() - Duration::seconds(1);
    directory.store().upsert(expired).await.unwrap();

    assert!(directory.get_best_service(&filter).await.is_none());
}

#[tokio::test]
async fn test_higher_confidence_beats_fresher() {
    let directory = empty_directory();
    directory
        .store()
        .upsert(
            EntryBuilder::new("primary", ProductType::S101, ServiceType::Wms)
                .confidence(1.0)
                .synced_ago(Duration::minutes(1))
                .build(),
        )
        .await
        .unwrap();
    directory
        .store()
        .upsert(
            EntryBuilder::new("mirror", ProductType::S101, ServiceType::Wms)
                .confidence(0.95)
                .synced_ago(Duration::hours(1))
                .build(),
        )
        .await
        .unwrap();

    let best = directory.get_best_service(&s101_wms(bbox::HUANGPU)).await.unwrap();
    assert_eq!(best.node_id, "primary");
}

#[tokio::test]
async fn test_equal_confidence_prefers_fresher() {
    let directory = empty_directory();
    for (node, age) in [("stale", 90), ("fresh", 5), ("middle", 30)] {
        directory
            .store()
            .upsert(
                EntryBuilder::new(node, ProductType::S101, ServiceType::Wms)
                    .confidence(0.9)
                    .synced_ago(Duration::minutes(age))
                    .build(),
            )
            .await
            .unwrap();
    }

    let results = directory
        .query_services(&s101_wms(bbox::HUANGPU), &QueryOptions::new(10))
        .await;
    let order: Vec<&str> = results.iter().map(|e| e.node_id.as_str()).collect();
    assert_eq!(order, vec!["fresh", "middle", "stale"]);

    // Ascending confidence keeps the freshness tie-break.
    let asc = directory
        .query_services(
            &s101_wms(bbox::HUANGPU),
            &QueryOptions::new(10).with_sort_order(SortOrder::Asc),
        )
        .await;
    assert_eq!(asc[0].node_id, "fresh");
}

#[tokio::test]
async fn test_expired_entries_never_returned() {
    let directory = empty_directory();
    directory
        .store()
        .upsert(
            EntryBuilder::new("expired", ProductType::S101, ServiceType::Wms)
                .confidence(1.0)
                .expired()
                .build(),
        )
        .await
        .unwrap();
    directory
        .store()
        .upsert(
            EntryBuilder::new("valid", ProductType::S101, ServiceType::Wms)
                .confidence(0.1)
                .build(),
        )
        .await
        .unwrap();

    let results = directory
        .query_services(&ServiceFilter::new(bbox::HUANGPU), &QueryOptions::new(10))
        .await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].node_id, "valid");
}

#[tokio::test]
async fn test_disabled_entries_invisible() {
    let directory = empty_directory();
    directory
        .store()
        .upsert(
            EntryBuilder::new("paused", ProductType::S101, ServiceType::Wms)
                .disabled()
                .build(),
        )
        .await
        .unwrap();

    assert!(directory.get_best_service(&s101_wms(bbox::HUANGPU)).await.is_none());
    assert_eq!(directory.store().len().await, 1);
}

#[tokio::test]
async fn test_max_results_and_sort_order() {
    let directory = empty_directory();
    let confidences = [0.3, 0.9, 0.5, 0.7, 1.0, 0.6];
    for (i, confidence) in confidences.iter().enumerate() {
        directory
            .store()
            .upsert(
                EntryBuilder::new(&format!("node-{}", i), ProductType::S104, ServiceType::Wcs)
                    .confidence(*confidence)
                    .build(),
            )
            .await
            .unwrap();
    }

    let filter = ServiceFilter::new(bbox::HUANGPU);
    for max in 0..=8 {
        for order in [SortOrder::Asc, SortOrder::Desc] {
            let results = directory
                .query_services(&filter, &QueryOptions::new(max).with_sort_order(order))
                .await;
            assert!(results.len() <= max);
            assert_eq!(results.len(), max.min(confidences.len()));
            for pair in results.windows(2) {
                match order {
                    SortOrder::Desc => assert!(pair[0].confidence >= pair[1].confidence),
                    SortOrder::Asc => assert!(pair[0].confidence <= pair[1].confidence),
                }
            }
        }
    }
}

#[tokio::test]
async fn test_best_service_equals_query_head() {
    let directory = empty_directory();
    let specs = [
        ("a", ProductType::S101, ServiceType::Wms, 0.4, 10, bbox::SHANGHAI),
        ("b", ProductType::S101, ServiceType::Wms, 0.8, 50, bbox::NINGBO),
        ("c", ProductType::S101, ServiceType::Wfs, 0.8, 5, bbox::SHANGHAI),
        ("d", ProductType::S102, ServiceType::Wcs, 1.0, 20, bbox::NINGBO),
        ("e", ProductType::S101, ServiceType::Wms, 0.8, 2, bbox::NINGBO),
    ];
    for (node, product, service, confidence, age, coverage) in specs {
        directory
            .store()
            .upsert(
                EntryBuilder::new(node, product, service)
                    .confidence(confidence)
                    .synced_ago(Duration::minutes(age))
                    .covering(&coverage)
                    .build(),
            )
            .await
            .unwrap();
    }

    let queries = [bbox::HUANGPU, bbox::HANGZHOU_BAY, bbox::NORTH_ATLANTIC, bbox::NINGBO];
    let product_sets = [None, Some(vec![ProductType::S101]), Some(vec![ProductType::S102, ProductType::S104])];
    let service_sets = [None, Some(vec![ServiceType::Wms]), Some(vec![ServiceType::Wfs, ServiceType::Wcs])];
    let floors = [None, Some(0.0), Some(0.5), Some(0.9)];

    for query in queries {
        for products in &product_sets {
            for services in &service_sets {
                for floor in floors {
                    let mut filter = ServiceFilter::new(query);
                    filter.product_types = products.clone();
                    filter.service_types = services.clone();
                    filter.min_confidence = floor;

                    let best = directory.get_best_service(&filter).await;
                    let head = directory
                        .query_services(&filter, &QueryOptions::best())
                        .await
                        .into_iter()
                        .next();
                    assert_eq!(
                        best.map(|e| e.key()),
                        head.map(|e| e.key()),
                        "filter {:?}",
                        filter
                    );
                }
            }
        }
    }
}

#[tokio::test]
async fn test_min_confidence_floor() {
    let directory = empty_directory();
    directory
        .store()
        .upsert(
            EntryBuilder::new("weak", ProductType::S101, ServiceType::Wms)
                .confidence(0.4)
                .build(),
        )
        .await
        .unwrap();

    let filter = s101_wms(bbox::HUANGPU);
    assert!(directory.get_best_service(&filter).await.is_some());
    assert!(directory
        .get_best_service(&filter.clone().with_min_confidence(0.5))
        .await
        .is_none());
}

#[tokio::test]
async fn test_malformed_coverage_excluded_without_error() {
    let directory = empty_directory();
    directory
        .store()
        .upsert(
            EntryBuilder::new("broken", ProductType::S101, ServiceType::Wms)
                .coverage(Coverage::from_geojson(MALFORMED_COVERAGE))
                .build(),
        )
        .await
        .unwrap();
    directory
        .store()
        .upsert(
            EntryBuilder::new("no-coverage", ProductType::S101, ServiceType::Wms)
                .coverage(Coverage::none())
                .build(),
        )
        .await
        .unwrap();
    directory
        .store()
        .upsert(
            EntryBuilder::new("good", ProductType::S101, ServiceType::Wms)
                .confidence(0.6)
                .build(),
        )
        .await
        .unwrap();

    let results = directory
        .query_services(&s101_wms(bbox::HUANGPU), &QueryOptions::new(10))
        .await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].node_id, "good");
    assert_eq!(directory.stats().await.malformed_coverage_skips, 2);
}

#[tokio::test]
async fn test_spatial_filter() {
    let (directory, _) = synced_directory().await;

    let inside_both = directory
        .query_services(&s101_wms(bbox::HANGZHOU_BAY), &QueryOptions::new(10))
        .await;
    assert_eq!(inside_both.len(), 2);

    let shanghai_only = directory
        .query_services(&s101_wms(bbox::HUANGPU), &QueryOptions::new(10))
        .await;
    assert_eq!(shanghai_only.len(), 1);
    assert_eq!(shanghai_only[0].node_id, "shanghai");

    assert!(directory
        .query_services(&ServiceFilter::new(bbox::NORTH_ATLANTIC), &QueryOptions::new(10))
        .await
        .is_empty());
}

#[tokio::test]
async fn test_available_products() {
    let (directory, _) = synced_directory().await;

    assert_eq!(
        directory.available_products(bbox::HUANGPU).await,
        vec![ProductType::S101, ProductType::S102, ProductType::S124]
    );
    assert!(directory.available_products(bbox::NORTH_ATLANTIC).await.is_empty());
}

// ============================================================================
// Sync
// ============================================================================

#[tokio::test]
async fn test_sync_writes_one_fresh_entry_per_capability() {
    let registry = port_registry().await;
    let directory = ServiceDirectory::new(registry.clone(), DirectoryConfig::default());

    let report = directory.sync_node_capabilities("shanghai").await.unwrap();
    assert_eq!(report.capabilities_count, 3);
    assert_eq!(report.services_count, 3);
    assert_eq!(report.errors_count, 0);
    assert_eq!(report.status, SyncStatus::Completed);

    let now = Utc::now();
    let entries: Vec<_> = directory.store().scan(|e| e.node_id == "shanghai").await.collect();
    assert_eq!(entries.len(), 3);
    for entry in &entries {
        assert!(entry.is_enabled);
        assert_eq!(entry.confidence, 1.0);
        assert!(entry.expires_at > now);
        assert_eq!(entry.node_name, "Shanghai Maritime Safety Administration");
    }

    let wms = directory
        .store()
        .get(&EntryKey::new("shanghai", ProductType::S101, ServiceType::Wms))
        .await
        .unwrap();
    assert_eq!(wms.endpoint, "http://shanghai.example.org/api/s101/wms");
    assert_eq!(wms.version.as_deref(), Some("1.3.0"));
}

#[tokio::test]
async fn test_sync_uses_configured_ttl() {
    let registry = port_registry().await;
    let config = DirectoryConfig::default().with_cache_ttl(std::time::Duration::from_secs(600));
    let directory = ServiceDirectory::new(registry, config);

    directory.sync_node_capabilities("ningbo").await.unwrap();
    let entry = directory
        .store()
        .get(&EntryKey::new("ningbo", ProductType::S101, ServiceType::Wms))
        .await
        .unwrap();
    assert_eq!(entry.expires_at - entry.last_synced_at, Duration::seconds(600));
    assert_eq!(entry.endpoint, "http://ningbo.example.org/services/api/s101/wms");
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let (directory, _) = synced_directory().await;
    let first = directory.sync_node_capabilities("shanghai").await.unwrap();

    let snapshot = |entries: Vec<Arc<storage::DirectoryEntry>>| {
        let mut view: Vec<_> = entries
            .iter()
            .map(|e| (e.key(), e.endpoint.clone(), e.version.clone(), e.confidence, e.is_enabled))
            .collect();
        view.sort_by(|a, b| a.0.cmp(&b.0));
        view
    };
    let before = snapshot(directory.store().scan(|_| true).await.collect());

    let second = directory.sync_node_capabilities("shanghai").await.unwrap();
    let after = snapshot(directory.store().scan(|_| true).await.collect());

    assert_eq!(before, after);
    assert_eq!(first.services_count, second.services_count);
    assert_eq!(second.disabled_count, 0);
}

#[tokio::test]
async fn test_sync_disables_capability_removed_from_registry() {
    let (directory, registry) = synced_directory().await;
    let key = EntryKey::new("shanghai", ProductType::S102, ServiceType::Wcs);
    assert!(directory.store().get(&key).await.unwrap().is_enabled);

    assert!(
        registry
            .set_capability_enabled("shanghai", ProductType::S102, ServiceType::Wcs, false)
            .await
    );
    let report = directory.sync_node_capabilities("shanghai").await.unwrap();

    assert_eq!(report.capabilities_count, 2);
    assert_eq!(report.disabled_count, 1);
    assert!(!directory.store().get(&key).await.unwrap().is_enabled);

    let filter = ServiceFilter::for_service(bbox::HUANGPU, ProductType::S102, ServiceType::Wcs);
    assert!(directory.get_best_service(&filter).await.is_none());
}

#[tokio::test]
async fn test_sync_counts_rejected_capabilities() {
    let registry = StaticRegistry::new();
    let mut node = shanghai_node();
    node.coverage = None;
    registry
        .upsert_node(
            node,
            vec![
                CapabilityRecord {
                    coverage: Some(polygon_json(&bbox::SHANGHAI)),
                    ..capability(ProductType::S101, ServiceType::Wms)
                },
                CapabilityRecord {
                    coverage: Some(MALFORMED_COVERAGE.to_string()),
                    ..capability(ProductType::S102, ServiceType::Wcs)
                },
                CapabilityRecord {
                    product_type: "S999".to_string(),
                    coverage: Some(polygon_json(&bbox::SHANGHAI)),
                    ..capability(ProductType::S101, ServiceType::Wms)
                },
                CapabilityRecord {
                    endpoint: Some("gopher://old.example.org".to_string()),
                    coverage: Some(polygon_json(&bbox::SHANGHAI)),
                    ..capability(ProductType::S104, ServiceType::Wcs)
                },
            ],
        )
        .await;
    let directory = ServiceDirectory::new(Arc::new(registry), DirectoryConfig::default());

    let report = directory.sync_node_capabilities("shanghai").await.unwrap();
    assert_eq!(report.capabilities_count, 4);
    assert_eq!(report.services_count, 1);
    assert_eq!(report.errors_count, 3);
    assert_eq!(report.status, SyncStatus::Partial);

    let codes: Vec<&str> = report.failures.iter().map(|f| f.code.as_str()).collect();
    assert!(codes.contains(&"MALFORMED_COVERAGE"));
    assert!(codes.contains(&"INVALID_PRODUCT"));
    assert!(codes.contains(&"INVALID_ENDPOINT"));

    let last = directory.tracker().last().await.unwrap();
    assert_eq!(last.status, SyncStatus::Partial);
    assert_eq!(last.errors_count, 3);
}

#[tokio::test]
async fn test_sync_unknown_node_disables_its_entries() {
    let directory = empty_directory();
    directory
        .store()
        .upsert(EntryBuilder::new("ghost", ProductType::S101, ServiceType::Wms).build())
        .await
        .unwrap();

    let err = directory.sync_node_capabilities("ghost").await.unwrap_err();
    assert!(matches!(err, DirectoryError::NodeNotFound(_)));
    assert!(directory.get_best_service(&s101_wms(bbox::HUANGPU)).await.is_none());
    assert_eq!(directory.tracker().last().await.unwrap().status, SyncStatus::Failed);
}

#[tokio::test]
async fn test_unknown_node_lock_is_released() {
    let registry = port_registry().await;
    let directory = ServiceDirectory::new(registry, DirectoryConfig::default());

    for id in ["ghost-1", "ghost-2", "ghost-3"] {
        assert!(directory.sync_node_capabilities(id).await.is_err());
    }
    assert_eq!(directory.tracked_nodes().await, 0);

    directory.sync_node_capabilities("shanghai").await.unwrap();
    assert_eq!(directory.tracked_nodes().await, 1);
}

#[tokio::test]
async fn test_sync_inactive_node() {
    let (directory, registry) = synced_directory().await;
    registry.set_node_active("ningbo", false).await;

    let report = directory.sync_node_capabilities("ningbo").await.unwrap();
    assert_eq!(report.capabilities_count, 0);
    assert_eq!(report.disabled_count, 1);

    let results = directory
        .query_services(&s101_wms(bbox::HANGZHOU_BAY), &QueryOptions::new(10))
        .await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].node_id, "shanghai");
}

#[tokio::test]
async fn test_sync_registry_failure_leaves_cache_untouched() {
    let flaky = Arc::new(FlakyRegistry::new(port_registry().await));
    let directory = ServiceDirectory::new(flaky.clone(), DirectoryConfig::default());
    directory.sync_all().await.unwrap();

    flaky.fail_node("shanghai").await;
    let err = directory.sync_node_capabilities("shanghai").await.unwrap_err();
    assert_eq!(err.error_code(), "REGISTRY_ERROR");

    // Previously synced entries are still served.
    assert!(directory.get_best_service(&s101_wms(bbox::HUANGPU)).await.is_some());
}

#[tokio::test]
async fn test_sync_all_reports_and_disables_orphans() {
    let flaky = Arc::new(FlakyRegistry::new(port_registry().await));
    let directory = ServiceDirectory::new(flaky.clone(), DirectoryConfig::default());
    directory
        .store()
        .upsert(EntryBuilder::new("retired", ProductType::S101, ServiceType::Wms).build())
        .await
        .unwrap();
    flaky.fail_node("ningbo").await;

    let report = directory.sync_all().await.unwrap();
    assert_eq!(report.nodes_count, 2);
    assert_eq!(report.nodes_synced, 1);
    assert_eq!(report.failed_nodes.len(), 1);
    assert_eq!(report.failed_nodes[0].node_id, "ningbo");
    assert_eq!(report.services_count, 3);
    assert_eq!(report.disabled_count, 1);
    assert_eq!(report.status, SyncStatus::Partial);

    let retired = directory
        .store()
        .get(&EntryKey::new("retired", ProductType::S101, ServiceType::Wms))
        .await
        .unwrap();
    assert!(!retired.is_enabled);

    let history = directory.tracker().history(10).await;
    assert_eq!(history[0].target, "full");
    assert_eq!(history.len(), 3);
}

#[tokio::test]
async fn test_sync_all_runs_on_spawned_task() {
    let directory = Arc::new(ServiceDirectory::new(port_registry().await, DirectoryConfig::default()));

    let handle = {
        let directory = directory.clone();
        tokio::spawn(async move { directory.sync_all().await })
    };
    let report = handle.await.unwrap().unwrap();

    assert_eq!(report.nodes_synced, 2);
    assert!(directory.has_servable_entries().await);
}

#[tokio::test]
async fn test_node_sync_during_full_sync_keeps_its_entries() {
    let registry = port_registry().await;
    registry.set_node_active("ningbo", false).await;
    let flaky = Arc::new(FlakyRegistry::new(registry.clone()));
    flaky.delay_node("shanghai", StdDuration::from_millis(200)).await;
    let directory = ServiceDirectory::new(flaky, DirectoryConfig::default());

    // The full sync lists only shanghai; ningbo comes back while it runs.
    let (full, node) = tokio::join!(directory.sync_all(), async {
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        registry.set_node_active("ningbo", true).await;
        directory.sync_node_capabilities("ningbo").await
    });
    assert_eq!(full.unwrap().nodes_count, 1);
    assert_eq!(node.unwrap().services_count, 1);

    let ningbo = directory
        .store()
        .get(&EntryKey::new("ningbo", ProductType::S101, ServiceType::Wms))
        .await
        .unwrap();
    assert!(ningbo.is_enabled);
    let results = directory
        .query_services(&s101_wms(bbox::HANGZHOU_BAY), &QueryOptions::new(10))
        .await;
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_sync_all_fails_when_registry_offline() {
    let flaky = Arc::new(FlakyRegistry::new(port_registry().await));
    flaky.set_fail_all(true);
    let directory = ServiceDirectory::new(flaky, DirectoryConfig::default());

    assert!(directory.sync_all().await.is_err());
    assert_eq!(directory.tracker().last().await.unwrap().status, SyncStatus::Failed);
}

#[tokio::test]
async fn test_concurrent_syncs_of_one_node_stay_consistent() {
    let registry = port_registry().await;
    let directory = Arc::new(ServiceDirectory::new(registry, DirectoryConfig::default()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let directory = directory.clone();
            tokio::spawn(async move { directory.sync_node_capabilities("shanghai").await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let entries: Vec<_> = directory.store().scan(|e| e.node_id == "shanghai").await.collect();
    assert_eq!(entries.len(), 3);
    for entry in entries {
        assert!(entry.is_enabled);
        assert_eq!(entry.expires_at - entry.last_synced_at, Duration::hours(24));
    }
    assert_eq!(directory.tracker().history(100).await.len(), 8);
}

// ============================================================================
// Realtime lookup, stats and cleanup
// ============================================================================

#[tokio::test]
async fn test_realtime_lookup_uses_health_confidence() {
    let registry = port_registry().await;
    let directory = ServiceDirectory::new(registry.clone(), DirectoryConfig::default());

    let best = directory
        .realtime_lookup(&s101_wms(bbox::HANGZHOU_BAY))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(best.node_id, "shanghai");
    assert_eq!(best.confidence, 1.0);

    // Nothing was cached.
    assert!(directory.store().is_empty().await);

    registry.set_health_status("shanghai", HealthStatus::Error).await;
    let best = directory
        .realtime_lookup(&s101_wms(bbox::HANGZHOU_BAY))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(best.node_id, "ningbo");
    assert_eq!(best.confidence, 0.7);

    let floored = s101_wms(bbox::HANGZHOU_BAY).with_min_confidence(0.8);
    assert!(directory.realtime_lookup(&floored).await.unwrap().is_none());
}

#[tokio::test]
async fn test_realtime_lookup_respects_coverage() {
    let registry = port_registry().await;
    let directory = ServiceDirectory::new(registry, DirectoryConfig::default());

    assert!(directory
        .realtime_lookup(&s101_wms(bbox::NORTH_ATLANTIC))
        .await
        .unwrap()
        .is_none());
    let ningbo_only = BoundingBox::new(122.2, 29.2, 122.4, 29.4);
    assert_eq!(
        directory
            .realtime_lookup(&s101_wms(ningbo_only))
            .await
            .unwrap()
            .unwrap()
            .node_id,
        ningbo_node().id
    );
}

#[tokio::test]
async fn test_stats_and_cleanup() {
    let directory = empty_directory();
    directory
        .store()
        .upsert(EntryBuilder::new("a", ProductType::S101, ServiceType::Wms).build())
        .await
        .unwrap();
    directory
        .store()
        .upsert(
            EntryBuilder::new("b", ProductType::S102, ServiceType::Wcs)
                .confidence(0.6)
                .expired()
                .build(),
        )
        .await
        .unwrap();
    directory
        .store()
        .upsert(
            EntryBuilder::new("c", ProductType::S101, ServiceType::Wms)
                .disabled()
                .build(),
        )
        .await
        .unwrap();

    let stats = directory.stats().await;
    assert_eq!(stats.total_entries, 3);
    assert_eq!(stats.enabled_entries, 2);
    assert_eq!(stats.expired_entries, 1);
    assert_eq!(stats.servable_entries, 1);
    assert_eq!(stats.high_confidence_entries, 2);
    assert_eq!(stats.by_product.get("S101"), Some(&2));
    assert!((stats.health_score - 66.666).abs() < 0.01);

    assert_eq!(directory.cleanup_expired().await, 1);
    assert_eq!(directory.stats().await.total_entries, 2);
}

#[tokio::test]
async fn test_set_entry_enabled() {
    let (directory, _) = synced_directory().await;
    let key = EntryKey::new("shanghai", ProductType::S101, ServiceType::Wms);

    directory.set_entry_enabled(&key, false).await.unwrap();
    assert!(directory.get_best_service(&s101_wms(bbox::HUANGPU)).await.is_none());

    directory.set_entry_enabled(&key, true).await.unwrap();
    assert!(directory.get_best_service(&s101_wms(bbox::HUANGPU)).await.is_some());

    let missing = EntryKey::new("nowhere", ProductType::S131, ServiceType::Wfs);
    assert!(directory.set_entry_enabled(&missing, true).await.is_err());
}
