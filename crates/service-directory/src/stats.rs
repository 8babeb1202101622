//! Aggregate view of the directory cache.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use storage::{DirectoryEntry, DirectoryStoreStats};

/// Confidence at or above which an entry counts as high confidence.
pub const HIGH_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryStats {
    pub total_entries: usize,
    pub enabled_entries: usize,
    pub expired_entries: usize,
    pub servable_entries: usize,
    pub high_confidence_entries: usize,
    pub by_product: BTreeMap<String, usize>,
    pub by_service: BTreeMap<String, usize>,
    /// Enabled entries as a percentage of all entries.
    pub health_score: f64,
    pub oldest_sync: Option<DateTime<Utc>>,
    pub newest_sync: Option<DateTime<Utc>>,
    /// Entries skipped by queries because their coverage was unusable.
    pub malformed_coverage_skips: u64,
    pub store: StoreCounters,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCounters {
    pub upserts: u64,
    pub scans: u64,
    pub disabled: u64,
    pub purged: u64,
}

impl From<&DirectoryStoreStats> for StoreCounters {
    fn from(stats: &DirectoryStoreStats) -> Self {
        Self {
            upserts: stats.upserts(),
            scans: stats.scans(),
            disabled: stats.disabled(),
            purged: stats.purged(),
        }
    }
}

impl DirectoryStats {
    pub fn collect<'a>(entries: impl IntoIterator<Item = &'a DirectoryEntry>, now: DateTime<Utc>) -> Self {
        let mut stats = DirectoryStats::default();
        for entry in entries {
            stats.total_entries += 1;
            if entry.is_enabled {
                stats.enabled_entries += 1;
            }
            if entry.is_expired_at(now) {
                stats.expired_entries += 1;
            }
            if entry.is_servable_at(now) {
                stats.servable_entries += 1;
            }
            if entry.confidence >= HIGH_CONFIDENCE {
                stats.high_confidence_entries += 1;
            }
            *stats
                .by_product
                .entry(entry.product_type.code().to_string())
                .or_default() += 1;
            *stats
                .by_service
                .entry(entry.service_type.code().to_string())
                .or_default() += 1;

            stats.oldest_sync = Some(match stats.oldest_sync {
                Some(t) => t.min(entry.last_synced_at),
                None => entry.last_synced_at,
            });
            stats.newest_sync = Some(match stats.newest_sync {
                Some(t) => t.max(entry.last_synced_at),
                None => entry.last_synced_at,
            });
        }
        if stats.total_entries > 0 {
            stats.health_score = stats.enabled_entries as f64 / stats.total_entries as f64 * 100.0;
        }
        stats
    }
}
