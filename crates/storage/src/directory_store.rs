//! In-memory directory entry store.
//!
//! Each (node, product, service) key maps to one `Arc<DirectoryEntry>`.
//! Writers never mutate an entry in place: an upsert or disable builds a new
//! entry and swaps the `Arc` under the write lock, so a concurrent scan sees
//! either the old entry or the new one and never a mix of their fields.
//!
//! ## Scans
//!
//! `scan` clones the `Arc`s into a snapshot while holding the read lock and
//! then filters lazily after the lock is released. Every call starts a fresh
//! snapshot; there is no shared cursor.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use s100_common::{Coverage, DirectoryError, DirectoryResult, ProductType, ServiceType};

/// Identity of a directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryKey {
    pub node_id: String,
    pub product_type: ProductType,
    pub service_type: ServiceType,
}

impl EntryKey {
    pub fn new(node_id: impl Into<String>, product_type: ProductType, service_type: ServiceType) -> Self {
        Self {
            node_id: node_id.into(),
            product_type,
            service_type,
        }
    }
}

/// A cached claim that a node offers a service type for a product type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub node_id: String,
    pub node_name: String,
    pub product_type: ProductType,
    pub service_type: ServiceType,
    pub coverage: Coverage,
    pub endpoint: String,
    pub version: Option<String>,
    /// In [0, 1]; 1.0 means just synced from the registry.
    pub confidence: f64,
    pub last_synced_at: DateTime<Utc>,
    /// Queries ignore the entry from this instant on.
    pub expires_at: DateTime<Utc>,
    pub is_enabled: bool,
}

impl DirectoryEntry {
    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.node_id.clone(), self.product_type, self.service_type)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Enabled and not yet expired.
    pub fn is_servable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_enabled && !self.is_expired_at(now)
    }

    fn validate(&self) -> DirectoryResult<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(DirectoryError::InvalidParameter {
                param: "confidence".to_string(),
                message: format!("{} is outside [0, 1]", self.confidence),
            });
        }
        if self.node_id.is_empty() {
            return Err(DirectoryError::InvalidParameter {
                param: "nodeId".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Counters for the entry store.
///
/// Atomic so the metrics endpoint can read them without taking the map lock.
#[derive(Debug, Default)]
pub struct DirectoryStoreStats {
    pub upserts: AtomicU64,
    pub scans: AtomicU64,
    pub disabled: AtomicU64,
    pub purged: AtomicU64,
}

impl DirectoryStoreStats {
    pub fn upserts(&self) -> u64 {
        self.upserts.load(Ordering::Relaxed)
    }

    pub fn scans(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    pub fn disabled(&self) -> u64 {
        self.disabled.load(Ordering::Relaxed)
    }

    pub fn purged(&self) -> u64 {
        self.purged.load(Ordering::Relaxed)
    }
}

/// Lazy, filtered view over a snapshot of the store.
pub struct EntryScan<F> {
    snapshot: std::vec::IntoIter<Arc<DirectoryEntry>>,
    predicate: F,
}

impl<F> Iterator for EntryScan<F>
where
    F: FnMut(&DirectoryEntry) -> bool,
{
    type Item = Arc<DirectoryEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let predicate = &mut self.predicate;
        self.snapshot.find(|entry| predicate(&**entry))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.snapshot.size_hint().1)
    }
}

/// The directory's cache of entries.
#[derive(Default)]
pub struct DirectoryStore {
    entries: RwLock<HashMap<EntryKey, Arc<DirectoryEntry>>>,
    stats: DirectoryStoreStats,
}

impl DirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for its key. Returns the previous entry.
    pub async fn upsert(&self, entry: DirectoryEntry) -> DirectoryResult<Option<Arc<DirectoryEntry>>> {
        entry.validate()?;
        let key = entry.key();
        let previous = self.entries.write().await.insert(key, Arc::new(entry));
        self.stats.upserts.fetch_add(1, Ordering::Relaxed);
        Ok(previous)
    }

    pub async fn get(&self, key: &EntryKey) -> Option<Arc<DirectoryEntry>> {
        self.entries.read().await.get(key).cloned()
    }

    /// Snapshot the store and return the entries matching `predicate`, lazily.
    pub async fn scan<F>(&self, predicate: F) -> EntryScan<F>
    where
        F: FnMut(&DirectoryEntry) -> bool,
    {
        let snapshot: Vec<Arc<DirectoryEntry>> = self.entries.read().await.values().cloned().collect();
        self.stats.scans.fetch_add(1, Ordering::Relaxed);
        EntryScan {
            snapshot: snapshot.into_iter(),
            predicate,
        }
    }

    /// Enable or disable one entry. Returns false when the key is unknown.
    pub async fn set_enabled(&self, key: &EntryKey, enabled: bool) -> bool {
        let mut entries = self.entries.write().await;
        let Some(current) = entries.get_mut(key) else {
            return false;
        };
        if current.is_enabled != enabled {
            let mut replacement = DirectoryEntry::clone(current);
            replacement.is_enabled = enabled;
            *current = Arc::new(replacement);
            if !enabled {
                self.stats.disabled.fetch_add(1, Ordering::Relaxed);
            }
        }
        true
    }

    /// Disable every enabled entry of `node_id` whose key is not in `keep`.
    ///
    /// Returns the keys that were disabled.
    pub async fn disable_node_except(&self, node_id: &str, keep: &HashSet<EntryKey>) -> Vec<EntryKey> {
        self.disable_where(|entry| entry.node_id == node_id && !keep.contains(&entry.key()))
            .await
    }

    /// Disable every enabled entry whose node is not in `active_nodes` and
    /// that was last synced before `synced_before`.
    pub async fn disable_nodes_not_in(
        &self,
        active_nodes: &HashSet<String>,
        synced_before: DateTime<Utc>,
    ) -> Vec<EntryKey> {
        self.disable_where(|entry| {
            !active_nodes.contains(&entry.node_id) && entry.last_synced_at < synced_before
        })
        .await
    }

    async fn disable_where<F>(&self, mut predicate: F) -> Vec<EntryKey>
    where
        F: FnMut(&DirectoryEntry) -> bool,
    {
        let mut entries = self.entries.write().await;
        let mut disabled = Vec::new();
        for (key, current) in entries.iter_mut() {
            if current.is_enabled && predicate(&**current) {
                let mut replacement = DirectoryEntry::clone(current);
                replacement.is_enabled = false;
                *current = Arc::new(replacement);
                disabled.push(key.clone());
            }
        }
        self.stats
            .disabled
            .fetch_add(disabled.len() as u64, Ordering::Relaxed);
        disabled
    }

    /// Delete entries that expired at or before `now`.
    pub async fn remove_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - entries.len();
        self.stats.purged.fetch_add(removed as u64, Ordering::Relaxed);
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Purged expired directory entries");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub fn stats(&self) -> &DirectoryStoreStats {
        &self.stats
    }
}
