//! The single ordering shared by every caller that ranks directory entries.
//!
//! Order: confidence in the requested direction, then `last_synced_at`
//! newest first. The freshness tie-break does not follow the requested
//! direction. Node id, product and service settle any remaining tie so the
//! order is total and repeatable.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use s100_common::DirectoryError;
use storage::DirectoryEntry;

/// Field results are ranked by. Confidence is the only one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Confidence,
}

impl FromStr for SortBy {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "confidence" => Ok(SortBy::Confidence),
            other => Err(DirectoryError::InvalidParameter {
                param: "sortBy".to_string(),
                message: format!("unsupported sort field '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("asc"),
            SortOrder::Desc => f.write_str("desc"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(DirectoryError::InvalidParameter {
                param: "sortOrder".to_string(),
                message: format!("expected 'asc' or 'desc', got '{}'", other),
            }),
        }
    }
}

/// Compare two entries for ranking.
pub fn compare(a: &DirectoryEntry, b: &DirectoryEntry, sort_by: SortBy, order: SortOrder) -> Ordering {
    let primary = match sort_by {
        SortBy::Confidence => a.confidence.total_cmp(&b.confidence),
    };
    let primary = match order {
        SortOrder::Asc => primary,
        SortOrder::Desc => primary.reverse(),
    };
    primary
        .then_with(|| b.last_synced_at.cmp(&a.last_synced_at))
        .then_with(|| a.node_id.cmp(&b.node_id))
        .then_with(|| a.product_type.cmp(&b.product_type))
        .then_with(|| a.service_type.cmp(&b.service_type))
}

/// Sort entries in place by [`compare`].
pub fn rank<E>(entries: &mut [E], sort_by: SortBy, order: SortOrder)
where
    E: AsRef<DirectoryEntry>,
{
    entries.sort_by(|a, b| compare(a.as_ref(), b.as_ref(), sort_by, order));
}
