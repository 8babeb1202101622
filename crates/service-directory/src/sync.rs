//! Sync reports and the in-memory history of sync runs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use uuid::Uuid;

use s100_common::DirectoryError;

/// Outcome of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Every capability became an entry.
    Completed,
    /// The run finished but some capabilities were rejected.
    Partial,
    /// The run could not finish.
    Failed,
}

impl SyncStatus {
    pub fn from_errors(errors_count: usize) -> Self {
        if errors_count == 0 {
            SyncStatus::Completed
        } else {
            SyncStatus::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Completed => "completed",
            SyncStatus::Partial => "partial",
            SyncStatus::Failed => "failed",
        }
    }
}

/// A capability that was skipped during sync.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityFailure {
    pub product_type: String,
    pub service_type: String,
    pub code: String,
    pub reason: String,
}

/// Result of `sync_node_capabilities`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub run_id: String,
    pub node_id: String,
    /// Enabled capabilities read from the registry.
    pub capabilities_count: usize,
    /// Entries written.
    pub services_count: usize,
    /// Capabilities skipped.
    pub errors_count: usize,
    /// Cached entries of this node that were disabled.
    pub disabled_count: usize,
    pub failures: Vec<CapabilityFailure>,
    pub status: SyncStatus,
    pub duration_ms: u64,
}

/// A node that could not be synced during a full sync.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFailure {
    pub node_id: String,
    pub code: String,
    pub message: String,
}

impl NodeFailure {
    pub fn new(node_id: &str, err: &DirectoryError) -> Self {
        Self {
            node_id: node_id.to_string(),
            code: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result of `sync_all`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullSyncReport {
    pub run_id: String,
    pub nodes_count: usize,
    pub nodes_synced: usize,
    pub capabilities_count: usize,
    pub services_count: usize,
    pub errors_count: usize,
    /// Entries disabled, including those of nodes no longer active.
    pub disabled_count: usize,
    pub failed_nodes: Vec<NodeFailure>,
    pub nodes: Vec<SyncReport>,
    pub status: SyncStatus,
    pub duration_ms: u64,
}

/// A sync that has started and not yet finished.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSync {
    pub id: String,
    pub target: String,
    pub started_at: DateTime<Utc>,
}

/// A finished sync.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRun {
    pub id: String,
    /// `node:<id>` or `full`.
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: SyncStatus,
    pub capabilities_count: usize,
    pub services_count: usize,
    pub errors_count: usize,
    pub error_message: Option<String>,
}

/// Counts recorded when a run completes.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub capabilities_count: usize,
    pub services_count: usize,
    pub errors_count: usize,
    pub error_message: Option<String>,
}

impl SyncOutcome {
    pub fn failed(err: &DirectoryError) -> Self {
        Self {
            error_message: Some(err.to_string()),
            ..Self::default()
        }
    }
}

/// Snapshot returned by the admin status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusSnapshot {
    pub active: Vec<ActiveSync>,
    pub last: Option<SyncRun>,
    pub recent: Vec<SyncRun>,
    pub total_runs: usize,
}

/// Tracks running syncs and keeps the most recent finished ones.
pub struct SyncTracker {
    active: Mutex<HashMap<String, ActiveSync>>,
    completed: Mutex<VecDeque<SyncRun>>,
    max_completed: usize,
}

impl Default for SyncTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncTracker {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn with_capacity(max_completed: usize) -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            completed: Mutex::new(VecDeque::new()),
            max_completed,
        }
    }

    /// Register a run and return its id.
    pub async fn start(&self, target: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        let run = ActiveSync {
            id: id.clone(),
            target: target.into(),
            started_at: Utc::now(),
        };
        self.active.lock().await.insert(id.clone(), run);
        id
    }

    /// Move a run to the history. Unknown ids are ignored.
    pub async fn complete(&self, id: &str, status: SyncStatus, outcome: SyncOutcome) {
        let Some(run) = self.active.lock().await.remove(id) else {
            return;
        };
        let completed_at = Utc::now();
        let duration_ms = (completed_at - run.started_at).num_milliseconds().max(0) as u64;

        let finished = SyncRun {
            id: run.id,
            target: run.target,
            started_at: run.started_at,
            completed_at,
            duration_ms,
            status,
            capabilities_count: outcome.capabilities_count,
            services_count: outcome.services_count,
            errors_count: outcome.errors_count,
            error_message: outcome.error_message,
        };

        let mut completed = self.completed.lock().await;
        completed.push_front(finished);
        while completed.len() > self.max_completed {
            completed.pop_back();
        }
    }

    /// Most recent runs first.
    pub async fn history(&self, limit: usize) -> Vec<SyncRun> {
        self.completed.lock().await.iter().take(limit).cloned().collect()
    }

    pub async fn last(&self) -> Option<SyncRun> {
        self.completed.lock().await.front().cloned()
    }

    pub async fn status(&self) -> SyncStatusSnapshot {
        let active = self.active.lock().await.values().cloned().collect();
        let completed = self.completed.lock().await;
        SyncStatusSnapshot {
            active,
            last: completed.front().cloned(),
            recent: completed.iter().take(20).cloned().collect(),
            total_runs: completed.len(),
        }
    }
}
