//! Common types and utilities shared across the S-100 service directory crates.

pub mod bbox;
pub mod coverage;
pub mod error;
pub mod product;

pub use bbox::{BboxParseError, BoundingBox};
pub use coverage::{intersects, Coverage, CoverageError};
pub use error::{DirectoryError, DirectoryResult};
pub use product::{ProductType, ServiceType};
