//! Parcelmap - parcel map loading and adjacency search for land registry tools
//!
//! This library provides shared types and modules for the inspect and serve binaries.

pub mod adjacency;
pub mod config;
pub mod loader;
pub mod models;

pub use adjacency::{find_adjacent, AdjacencyIndex, AdjacencyMethod};
pub use loader::{LoadError, MapLoader, MapSession};
pub use models::{Feature, FeatureCollection, VectorFormat};
