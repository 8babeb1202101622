//! Service directory for S-100 maritime data services.
//!
//! Given a bounding box and the wanted product/service types, the directory
//! returns the best matching endpoint among all nodes whose coverage
//! intersects the box. Answers come from a TTL-bound cache of directory
//! entries that sync keeps reconciled with the capability registry.

pub mod capability;
pub mod config;
pub mod directory;
pub mod query;
pub mod ranking;
pub mod stats;
pub mod sync;

pub use config::DirectoryConfig;
pub use directory::{ServiceDirectory, SYNCED_CONFIDENCE};
pub use query::{QueryOptions, ServiceFilter};
pub use ranking::{SortBy, SortOrder};
pub use stats::DirectoryStats;
pub use sync::{FullSyncReport, SyncReport, SyncRun, SyncStatus, SyncStatusSnapshot};
