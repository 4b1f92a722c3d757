//! Spatial adjacency between the features of a collection.
//!
//! Relations are evaluated on the DE-9IM matrix of the selected geometry
//! against each candidate geometry.

mod index;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use geo::relate::IntersectionMatrix;
use geo::{CoordsIter, Geometry, LineString, Polygon, Relate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Feature, FeatureCollection};

pub use index::AdjacencyIndex;

/// Spatial relation used to decide adjacency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjacencyMethod {
    /// Shared boundary, no shared interior
    #[default]
    Touches,
    /// Any contact, unless the selection lies within the candidate
    Intersects,
    /// Partial overlap of same-dimension geometries
    Overlaps,
}

impl AdjacencyMethod {
    /// Parse a method name; unknown names mean `Touches`
    pub fn from_name(name: &str) -> Self {
        match name {
            "touches" => AdjacencyMethod::Touches,
            "intersects" => AdjacencyMethod::Intersects,
            "overlaps" => AdjacencyMethod::Overlaps,
            _ => AdjacencyMethod::Touches,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdjacencyMethod::Touches => "touches",
            AdjacencyMethod::Intersects => "intersects",
            AdjacencyMethod::Overlaps => "overlaps",
        }
    }

    /// Whether the relation holds for `selected.relate(candidate)`
    pub fn holds(&self, matrix: &IntersectionMatrix) -> bool {
        match self {
            AdjacencyMethod::Touches => matrix.is_touches(),
            AdjacencyMethod::Intersects => matrix.is_intersects() && !matrix.is_within(),
            AdjacencyMethod::Overlaps => matrix.is_overlaps(),
        }
    }
}

impl fmt::Display for AdjacencyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for AdjacencyMethod {
    fn from(name: &str) -> Self {
        AdjacencyMethod::from_name(name)
    }
}

/// Why a pair of features could not be compared
#[derive(Debug, Error)]
pub enum PredicateError {
    #[error("feature {0} has no geometry")]
    MissingGeometry(usize),

    #[error("feature {0} has non-finite coordinates")]
    NonFiniteCoordinates(usize),

    #[error("feature {0} has a line or ring with too few coordinates")]
    Degenerate(usize),

    #[error("relation with feature {0} could not be computed")]
    RelateFailed(usize),
}

/// Indices of the features adjacent to `selected`, in collection order.
///
/// An out-of-range `selected` yields an empty result. Candidates that
/// cannot be compared are logged and treated as not adjacent.
pub fn find_adjacent(
    collection: &FeatureCollection,
    selected: usize,
    method: AdjacencyMethod,
) -> Vec<usize> {
    debug!(
        "Finding adjacent features: selected={}, method={}, len={}",
        selected,
        method,
        collection.len()
    );

    let Some(feature) = collection.get(selected) else {
        debug!("Selected index {} is out of bounds", selected);
        return Vec::new();
    };

    let selected_geom = match usable_geometry(feature, selected) {
        Ok(g) => g,
        Err(e) => {
            warn!("Cannot check adjacency: {}", e);
            return Vec::new();
        }
    };
    debug!("Selected geometry type: {}", feature.geometry_type());

    let adjacent: Vec<usize> = collection
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != selected)
        .filter(|(idx, candidate)| is_adjacent(selected_geom, candidate, *idx, method))
        .map(|(idx, _)| idx)
        .collect();

    debug!("Total adjacent features found: {}", adjacent.len());
    adjacent
}

/// Evaluate `method` for one candidate, logging comparison failures
fn is_adjacent(
    selected: &Geometry<f64>,
    candidate: &Feature,
    idx: usize,
    method: AdjacencyMethod,
) -> bool {
    match relates(selected, candidate, idx, method) {
        Ok(true) => {
            debug!("Found adjacent feature at index {}", idx);
            true
        }
        Ok(false) => false,
        Err(e) => {
            warn!("Error checking adjacency for feature {}: {}", idx, e);
            false
        }
    }
}

fn relates(
    selected: &Geometry<f64>,
    candidate: &Feature,
    idx: usize,
    method: AdjacencyMethod,
) -> Result<bool, PredicateError> {
    let other = usable_geometry(candidate, idx)?;
    let matrix = panic::catch_unwind(AssertUnwindSafe(|| selected.relate(other)))
        .map_err(|_| PredicateError::RelateFailed(idx))?;
    Ok(method.holds(&matrix))
}

/// The feature's geometry, if present, finite and free of collapsed parts
fn usable_geometry(feature: &Feature, idx: usize) -> Result<&Geometry<f64>, PredicateError> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or(PredicateError::MissingGeometry(idx))?;

    if !geometry
        .coords_iter()
        .all(|c| c.x.is_finite() && c.y.is_finite())
    {
        return Err(PredicateError::NonFiniteCoordinates(idx));
    }
    if is_degenerate(geometry) {
        return Err(PredicateError::Degenerate(idx));
    }

    Ok(geometry)
}

/// A line with a single point or a ring that cannot close.
///
/// Empty parts are fine; relate handles them as empty sets.
fn is_degenerate(geometry: &Geometry<f64>) -> bool {
    let short_line = |line: &LineString<f64>| line.0.len() == 1;
    let short_ring = |ring: &LineString<f64>| (1..4).contains(&ring.0.len());
    let bad_polygon = |polygon: &Polygon<f64>| {
        short_ring(polygon.exterior()) || polygon.interiors().iter().any(short_ring)
    };

    match geometry {
        Geometry::LineString(line) => short_line(line),
        Geometry::MultiLineString(lines) => lines.iter().any(short_line),
        Geometry::Polygon(polygon) => bad_polygon(polygon),
        Geometry::MultiPolygon(polygons) => polygons.iter().any(bad_polygon),
        Geometry::GeometryCollection(collection) => collection.iter().any(is_degenerate),
        _ => false,
    }
}
