//! Core data models for loaded parcel maps.

pub mod feature;
pub mod view;

pub use feature::{Feature, FeatureCollection, VectorFormat};
pub use view::{AdjacencySelection, AttributeTable, LayerSet, MapLayer};
