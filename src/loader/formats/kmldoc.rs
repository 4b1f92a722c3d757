use std::fs;
use std::path::Path;

use kml::{quick_collection, Kml};

use super::ReadError;
use crate::models::Feature;

/// Read every placemark geometry of a KML document, in document order
pub(super) fn read(path: &Path) -> Result<Vec<Feature>, ReadError> {
    let content = fs::read_to_string(path)?;
    let document: Kml<f64> = content.parse()?;
    let collection = quick_collection(document)?;

    Ok(collection.into_iter().map(Feature::from_geometry).collect())
}
