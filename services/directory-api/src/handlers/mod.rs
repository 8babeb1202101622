//! HTTP request handlers.
//!
//! - `resolver`: the generic `/api/v1/:product/:service_type` endpoint
//! - `directory`: JSON views over the directory cache
//! - `admin`: sync control, history and entry toggling
//! - `metrics`: health checks and metrics
//! - `common`: error envelope and parameter parsing

pub mod admin;
pub mod common;
pub mod directory;
pub mod metrics;
pub mod resolver;

pub use admin::{entry_enabled_handler, sync_handler, sync_status_handler};
pub use common::{ApiError, ApiResult};
pub use directory::{best_handler, products_handler, services_handler};
pub use metrics::{api_metrics_handler, health_handler, metrics_handler, ready_handler};
pub use resolver::resolve_handler;
