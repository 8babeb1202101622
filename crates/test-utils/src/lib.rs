//! Shared test utilities for the service directory workspace.
//!
//! - Geographic fixtures (bounding boxes, coverage polygons)
//! - Builders for nodes, capabilities and directory entries
//! - Registries preloaded with port nodes, and one that fails on demand
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod registries;

pub use fixtures::*;
pub use registries::*;
