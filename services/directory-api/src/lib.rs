//! S-100 service directory API.
//!
//! Resolves OGC requests for S-100 products to the node best placed to
//! serve them, and exposes the directory for inspection and admin.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod renderer;
pub mod resolver;
pub mod routes;
pub mod state;
pub mod sync_task;

pub use config::{ServerConfig, SyncConfig};
pub use routes::build_router;
pub use state::AppState;
