//! Service coverage geometry and the bbox/coverage matcher.
//!
//! A coverage is the GeoJSON polygon a node claims to serve. Matching is done
//! against the axis-aligned extent of the outer ring, which over-approximates
//! the polygon: concave coverages may match a query that only touches their
//! hull, but a query that touches the polygon itself is never missed.
//!
//! Parsing happens once, when the coverage is constructed. A coverage that
//! cannot be parsed is still a value (it keeps its source text and the reason
//! it was rejected) so callers can log it; it simply never matches.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::bbox::BoundingBox;

/// Why a coverage has no usable extent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoverageError {
    #[error("No coverage geometry")]
    Missing,

    #[error("Coverage is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Unsupported geometry type: {0}")]
    UnsupportedGeometry(String),

    #[error("Polygon has no outer ring")]
    EmptyRing,

    #[error("Outer ring has {0} positions, at least 4 are required")]
    TooFewPositions(usize),

    #[error("Outer ring is not closed")]
    UnclosedRing,

    #[error("Invalid position at index {0}")]
    InvalidPosition(usize),

    #[error("Position {index} out of range: ({lon}, {lat})")]
    OutOfRange { index: usize, lon: f64, lat: f64 },
}

/// Geographic coverage of a service offering.
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    source: Option<String>,
    extent: Result<BoundingBox, CoverageError>,
}

impl Coverage {
    /// The degenerate "no coverage" state.
    pub fn none() -> Self {
        Self {
            source: None,
            extent: Err(CoverageError::Missing),
        }
    }

    /// Parse GeoJSON text. Never fails; check [`Coverage::extent`] for validity.
    pub fn from_geojson(text: impl Into<String>) -> Self {
        let text = text.into();
        let extent = serde_json::from_str::<Value>(&text)
            .map_err(|e| CoverageError::InvalidJson(e.to_string()))
            .and_then(|value| polygon_extent(&value));
        Self {
            source: Some(text),
            extent,
        }
    }

    /// Build from an already-decoded GeoJSON value. `null` is "no coverage".
    pub fn from_value(value: &Value) -> Self {
        if value.is_null() {
            return Self::none();
        }
        Self {
            source: Some(value.to_string()),
            extent: polygon_extent(value),
        }
    }

    /// Optional raw GeoJSON, as stored by registries. Blank text is "no coverage".
    pub fn from_optional(text: Option<&str>) -> Self {
        match text.map(str::trim) {
            Some(t) if !t.is_empty() => Self::from_geojson(t),
            _ => Self::none(),
        }
    }

    /// Build a closed polygon from `(lon, lat)` positions. The ring is closed
    /// automatically if the last position differs from the first.
    pub fn polygon(positions: &[(f64, f64)]) -> Self {
        let mut ring: Vec<Value> = positions
            .iter()
            .map(|(x, y)| serde_json::json!([x, y]))
            .collect();
        if let (Some(first), Some(last)) = (positions.first(), positions.last()) {
            if first != last {
                ring.push(serde_json::json!([first.0, first.1]));
            }
        }
        Self::from_value(&serde_json::json!({
            "type": "Polygon",
            "coordinates": [ring],
        }))
    }

    /// Rectangular polygon covering `bbox`.
    pub fn from_bbox(bbox: &BoundingBox) -> Self {
        Self::polygon(&[
            (bbox.min_x, bbox.min_y),
            (bbox.max_x, bbox.min_y),
            (bbox.max_x, bbox.max_y),
            (bbox.min_x, bbox.max_y),
        ])
    }

    /// Axis-aligned extent of the outer ring, or the reason there is none.
    pub fn extent(&self) -> Result<&BoundingBox, &CoverageError> {
        self.extent.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.extent.is_ok()
    }

    pub fn is_none(&self) -> bool {
        self.source.is_none()
    }

    /// Source text as given to the constructor.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Decoded GeoJSON, if the source was at least valid JSON.
    pub fn to_value(&self) -> Option<Value> {
        self.source
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
    }
}

impl Default for Coverage {
    fn default() -> Self {
        Self::none()
    }
}

impl Serialize for Coverage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Coverage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            // Coverage stored as a JSON-encoded string (the registry column format).
            Value::String(text) => Coverage::from_optional(Some(&text)),
            other => Coverage::from_value(&other),
        })
    }
}

/// Does the query rectangle touch the coverage?
///
/// A coverage without a usable extent never matches. This function does not
/// panic and does not log; callers that want to report malformed coverages
/// inspect [`Coverage::extent`] themselves.
pub fn intersects(query: &BoundingBox, coverage: &Coverage) -> bool {
    match coverage.extent() {
        Ok(extent) => query.intersects(extent),
        Err(_) => false,
    }
}

fn polygon_extent(value: &Value) -> Result<BoundingBox, CoverageError> {
    let geometry_type = value.get("type").and_then(Value::as_str).unwrap_or("");
    if geometry_type != "Polygon" {
        let shown = if geometry_type.is_empty() {
            "<missing>"
        } else {
            geometry_type
        };
        return Err(CoverageError::UnsupportedGeometry(shown.to_string()));
    }

    let ring = value
        .get("coordinates")
        .and_then(Value::as_array)
        .and_then(|rings| rings.first())
        .and_then(Value::as_array)
        .ok_or(CoverageError::EmptyRing)?;

    if ring.is_empty() {
        return Err(CoverageError::EmptyRing);
    }
    if ring.len() < 4 {
        return Err(CoverageError::TooFewPositions(ring.len()));
    }

    let mut positions = Vec::with_capacity(ring.len());
    for (index, position) in ring.iter().enumerate() {
        let (lon, lat) = position
            .as_array()
            .filter(|p| p.len() >= 2)
            .and_then(|p| Some((p[0].as_f64()?, p[1].as_f64()?)))
            .ok_or(CoverageError::InvalidPosition(index))?;
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(CoverageError::OutOfRange { index, lon, lat });
        }
        positions.push((lon, lat));
    }

    if positions.first() != positions.last() {
        return Err(CoverageError::UnclosedRing);
    }

    BoundingBox::enclosing(positions).ok_or(CoverageError::EmptyRing)
}
