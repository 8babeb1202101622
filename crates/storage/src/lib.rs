//! Storage abstractions for the service directory.
//!
//! Provides:
//! - The in-memory directory entry store (the resolution cache)
//! - The capability registry adapter over the authoritative node records,
//!   backed by PostgreSQL or by a static YAML file

pub mod catalog;
pub mod directory_store;
pub mod registry;

pub use catalog::PgRegistry;
pub use directory_store::{DirectoryEntry, DirectoryStore, DirectoryStoreStats, EntryKey, EntryScan};
pub use registry::{
    CapabilityRecord, CapabilityRegistry, HealthStatus, MatchedCapability, NodeInfo,
    StaticRegistry,
};
