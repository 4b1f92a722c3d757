use std::fs;
use std::path::Path;

use geo_types::Geometry;
use geojson::{GeoJson, JsonObject};
use tracing::debug;

use super::ReadError;
use crate::models::Feature;

/// Read a GeoJSON document: a FeatureCollection, a Feature or a bare Geometry
pub(super) fn read(path: &Path) -> Result<Vec<Feature>, ReadError> {
    let content = fs::read_to_string(path)?;
    let geojson: GeoJson = content.parse()?;

    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().map(convert_feature).collect(),
        GeoJson::Feature(feature) => vec![convert_feature(feature)],
        GeoJson::Geometry(geometry) => {
            vec![Feature::new(convert_geometry(geometry), JsonObject::new())]
        }
    };

    Ok(features)
}

fn convert_feature(feature: geojson::Feature) -> Feature {
    Feature::new(
        feature.geometry.and_then(convert_geometry),
        feature.properties.unwrap_or_default(),
    )
}

fn convert_geometry(geometry: geojson::Geometry) -> Option<Geometry<f64>> {
    match Geometry::<f64>::try_from(geometry) {
        Ok(g) => Some(g),
        Err(e) => {
            debug!("Skipping undecodable GeoJSON geometry: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_collection_with_null_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.geojson");
        fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"name": "a"},
                 "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}},
                {"type": "Feature", "properties": null, "geometry": null}
            ]}"#,
        )
        .unwrap();

        let features = read(&path).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].geometry_type(), "Point");
        assert_eq!(features[0].properties["name"], "a");
        assert!(features[1].geometry.is_none());
        assert!(features[1].properties.is_empty());
    }

    #[test]
    fn test_bare_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line.geojson");
        fs::write(
            &path,
            r#"{"type": "LineString", "coordinates": [[0, 0], [1, 1]]}"#,
        )
        .unwrap();

        let features = read(&path).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].geometry_type(), "LineString");
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.geojson");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(read(&path), Err(ReadError::GeoJson(_))));
    }
}
