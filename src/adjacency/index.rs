//! Envelope index for repeated adjacency queries on one collection.

use geo::BoundingRect;
use rstar::{RTree, RTreeObject, AABB};
use tracing::{debug, info};

use super::{is_adjacent, usable_geometry, AdjacencyMethod};
use crate::models::FeatureCollection;

/// Wrapper for R-tree indexing of feature bounding boxes
#[derive(Clone)]
struct IndexedFeature {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Spatial index over the features of a collection.
///
/// Every relation that can make two features adjacent requires their
/// bounding boxes to intersect, so candidates come from an envelope
/// query instead of a full scan. Results match
/// [`find_adjacent`](super::find_adjacent).
pub struct AdjacencyIndex<'a> {
    collection: &'a FeatureCollection,
    tree: RTree<IndexedFeature>,
}

impl<'a> AdjacencyIndex<'a> {
    /// Build the index; features without a usable geometry are left out
    pub fn build(collection: &'a FeatureCollection) -> Self {
        info!(
            "Building adjacency index for {} features...",
            collection.len()
        );

        let indexed: Vec<IndexedFeature> = collection
            .iter()
            .enumerate()
            .filter_map(|(index, feature)| {
                let geometry = usable_geometry(feature, index).ok()?;
                Some(IndexedFeature {
                    index,
                    envelope: envelope_of(geometry)?,
                })
            })
            .collect();

        let tree = RTree::bulk_load(indexed);
        info!("Adjacency index built with {} entries", tree.size());

        Self { collection, tree }
    }

    /// Indices of the features adjacent to `selected`, ascending
    pub fn find_adjacent(&self, selected: usize, method: AdjacencyMethod) -> Vec<usize> {
        let Some(feature) = self.collection.get(selected) else {
            debug!("Selected index {} is out of bounds", selected);
            return Vec::new();
        };
        let Ok(selected_geom) = usable_geometry(feature, selected) else {
            return Vec::new();
        };
        let Some(envelope) = envelope_of(selected_geom) else {
            return Vec::new();
        };

        let mut adjacent: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.index)
            .filter(|&idx| idx != selected)
            .filter(|&idx| {
                self.collection
                    .get(idx)
                    .map(|candidate| is_adjacent(selected_geom, candidate, idx, method))
                    .unwrap_or(false)
            })
            .collect();

        adjacent.sort_unstable();
        adjacent
    }

    /// Get total number of indexed features
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

fn envelope_of(geometry: &geo::Geometry<f64>) -> Option<AABB<[f64; 2]>> {
    let rect = geometry.bounding_rect()?;
    Some(AABB::from_corners(
        [rect.min().x, rect.min().y],
        [rect.max().x, rect.max().y],
    ))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{collection, grid, nested, rect};
    use super::super::find_adjacent;
    use super::*;
    use crate::models::Feature;
    use geojson::JsonObject;

    const METHODS: [AdjacencyMethod; 3] = [
        AdjacencyMethod::Touches,
        AdjacencyMethod::Intersects,
        AdjacencyMethod::Overlaps,
    ];

    #[test]
    fn test_matches_linear_scan() {
        for fc in [grid(4), nested()] {
            let index = AdjacencyIndex::build(&fc);
            for i in 0..fc.len() {
                for method in METHODS {
                    assert_eq!(
                        index.find_adjacent(i, method),
                        find_adjacent(&fc, i, method),
                        "feature {} with {}",
                        i,
                        method
                    );
                }
            }
        }
    }

    #[test]
    fn test_corner_contact_is_found() {
        let fc = collection(vec![rect(0.0, 0.0, 1.0, 1.0), rect(1.0, 1.0, 2.0, 2.0)]);
        let index = AdjacencyIndex::build(&fc);
        assert_eq!(index.find_adjacent(0, AdjacencyMethod::Touches), vec![1]);
    }

    #[test]
    fn test_features_without_geometry_are_not_indexed() {
        let fc = collection(vec![
            rect(0.0, 0.0, 1.0, 1.0),
            Feature::new(None, JsonObject::new()),
            rect(1.0, 0.0, 2.0, 1.0),
        ]);
        let index = AdjacencyIndex::build(&fc);
        assert_eq!(index.len(), 2);
        assert_eq!(index.find_adjacent(0, AdjacencyMethod::Touches), vec![2]);
        assert!(index.find_adjacent(1, AdjacencyMethod::Touches).is_empty());
        assert!(index.find_adjacent(3, AdjacencyMethod::Touches).is_empty());
    }

    #[test]
    fn test_single_point_line_is_not_indexed() {
        let stub = geo::LineString::new(vec![geo::coord! { x: 0.5, y: 0.5 }]);
        let fc = collection(vec![
            rect(0.0, 0.0, 1.0, 1.0),
            Feature::from_geometry(stub.into()),
            rect(1.0, 0.0, 2.0, 1.0),
        ]);
        let index = AdjacencyIndex::build(&fc);
        assert_eq!(index.len(), 2);
        assert_eq!(index.find_adjacent(0, AdjacencyMethod::Touches), vec![2]);
        assert!(index.find_adjacent(1, AdjacencyMethod::Intersects).is_empty());
    }

    #[test]
    fn test_empty_index() {
        let fc = collection(vec![]);
        let index = AdjacencyIndex::build(&fc);
        assert!(index.is_empty());
        assert!(index.find_adjacent(0, AdjacencyMethod::Touches).is_empty());
    }
}
