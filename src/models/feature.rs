//! Features and feature collections as read from vector files.

use std::path::{Path, PathBuf};

use geo_types::Geometry;
use geojson::JsonObject;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute that carries a stable feature identifier
pub const FEATURE_ID_FIELD: &str = "feature_id";

/// Attribute naming the layer a feature was loaded from
pub const LAYER_NAME_FIELD: &str = "layer_name";

/// Attribute holding the file a layer was loaded from
pub const SOURCE_FILE_FIELD: &str = "source_file";

/// Vector format a collection was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorFormat {
    Shapefile,
    GeoJson,
    GeoPackage,
    Kml,
}

impl std::fmt::Display for VectorFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorFormat::Shapefile => write!(f, "shapefile"),
            VectorFormat::GeoJson => write!(f, "geojson"),
            VectorFormat::GeoPackage => write!(f, "geopackage"),
            VectorFormat::Kml => write!(f, "kml"),
        }
    }
}

/// One geometry record plus its attribute fields.
///
/// The geometry is absent for null shapes and records whose geometry
/// could not be decoded; such features keep their position in the
/// collection so indices stay aligned with the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: JsonObject,
}

impl Feature {
    pub fn new(geometry: Option<Geometry<f64>>, properties: JsonObject) -> Self {
        Self {
            geometry,
            properties,
        }
    }

    /// Feature with a geometry and no attributes
    pub fn from_geometry(geometry: Geometry<f64>) -> Self {
        Self::new(Some(geometry), JsonObject::new())
    }

    /// Geometry type name, as used in GeoJSON.
    ///
    /// Lines export as LineString, rectangles and triangles as Polygon.
    pub fn geometry_type(&self) -> &'static str {
        match &self.geometry {
            Some(Geometry::Point(_)) => "Point",
            Some(Geometry::Line(_) | Geometry::LineString(_)) => "LineString",
            Some(Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_)) => "Polygon",
            Some(Geometry::MultiPoint(_)) => "MultiPoint",
            Some(Geometry::MultiLineString(_)) => "MultiLineString",
            Some(Geometry::MultiPolygon(_)) => "MultiPolygon",
            Some(Geometry::GeometryCollection(_)) => "GeometryCollection",
            None => "None",
        }
    }

    /// Convert to a GeoJSON feature whose id is its position in the collection
    pub fn to_geojson(&self, index: usize) -> geojson::Feature {
        geojson::Feature {
            bbox: None,
            geometry: self
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            id: Some(geojson::feature::Id::String(index.to_string())),
            properties: Some(self.properties.clone()),
            foreign_members: None,
        }
    }
}

/// Ordered set of features loaded from one source file.
///
/// Features are addressed by their 0-based position in source order.
#[derive(Debug, Clone)]
pub struct FeatureCollection {
    features: Vec<Feature>,
    source: PathBuf,
    format: VectorFormat,
}

impl PartialEq for FeatureCollection {
    fn eq(&self, other: &Self) -> bool {
        self.features == other.features
    }
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>, source: impl Into<PathBuf>, format: VectorFormat) -> Self {
        Self {
            features,
            source: source.into(),
            format,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// File the features were read from
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn format(&self) -> VectorFormat {
        self.format
    }

    /// Attribute the collection to another file, e.g. the package it came from
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    /// Attribute names in first-seen order across all features.
    ///
    /// Within a feature, attributes keep the order of the source file.
    pub fn columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();

        for feature in &self.features {
            for key in feature.properties.keys() {
                if seen.insert(key.as_str()) {
                    columns.push(key.clone());
                }
            }
        }

        columns
    }

    /// Assign each feature its index as `feature_id`, unless the
    /// collection already carries that attribute.
    pub fn ensure_feature_ids(&mut self) {
        let present = self
            .features
            .iter()
            .any(|f| f.properties.contains_key(FEATURE_ID_FIELD));
        if present {
            return;
        }

        for (idx, feature) in self.features.iter_mut().enumerate() {
            feature
                .properties
                .insert(FEATURE_ID_FIELD.to_string(), Value::from(idx));
        }
    }

    /// Set the same attribute on every feature
    pub fn set_property(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        for feature in &mut self.features {
            feature.properties.insert(key.to_string(), value.clone());
        }
    }

    /// Join several collections into one, in the given order.
    ///
    /// The result takes its format from the first collection.
    /// Returns `None` for an empty list.
    pub fn concat(
        collections: impl IntoIterator<Item = FeatureCollection>,
        source: impl Into<PathBuf>,
    ) -> Option<Self> {
        let mut collections = collections.into_iter();
        let first = collections.next()?;
        let format = first.format;

        let mut features = first.features;
        for collection in collections {
            features.extend(collection.features);
        }

        Some(Self::new(features, source, format))
    }

    /// Export the whole collection as a GeoJSON FeatureCollection
    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: self
                .features
                .iter()
                .enumerate()
                .map(|(idx, f)| f.to_geojson(idx))
                .collect(),
            foreign_members: None,
        }
    }

    /// Export the whole collection as GeoJSON text
    pub fn to_geojson_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_geojson())
    }
}
