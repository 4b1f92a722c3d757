//! Tabular and selection views over a loaded collection.

use geojson::JsonObject;
use serde::Serialize;
use serde_json::Value;

use super::FeatureCollection;

/// Attribute values of every feature, without geometry
#[derive(Debug, Clone, Serialize)]
pub struct AttributeTable {
    pub columns: Vec<String>,
    /// One row per feature: its attributes plus `index`
    pub data: Vec<JsonObject>,
    pub total_features: usize,
}

/// A selected feature together with its adjacent features
#[derive(Debug, Clone, Serialize)]
pub struct AdjacencySelection {
    /// Selected feature first, then adjacent ones, each tagged with `selection_type`
    pub geojson: geojson::FeatureCollection,
    pub selected_id: usize,
    pub adjacent_ids: Vec<usize>,
    pub total_count: usize,
}

/// One file loaded as a layer of a multi-file map
#[derive(Debug, Clone, Serialize)]
pub struct MapLayer {
    /// File stem of the layer's file
    pub name: String,
    /// File path as requested
    pub file: String,
    pub geojson: geojson::FeatureCollection,
    pub feature_count: usize,
}

/// Layers loaded together; their features form the current collection
#[derive(Debug, Clone, Serialize)]
pub struct LayerSet {
    pub layers: Vec<MapLayer>,
    pub total_layers: usize,
    pub total_features: usize,
}

impl FeatureCollection {
    /// Build the attribute table for all features
    pub fn attributes(&self) -> AttributeTable {
        let data = self
            .iter()
            .enumerate()
            .map(|(idx, feature)| {
                let mut row = JsonObject::new();
                row.insert("index".to_string(), Value::from(idx));
                row.extend(feature.properties.clone());
                row
            })
            .collect();

        AttributeTable {
            columns: self.columns(),
            data,
            total_features: self.len(),
        }
    }

    /// Build the selection view for `selected` and its `adjacent` features.
    ///
    /// Returns `None` when `selected` is not a valid index. Adjacent
    /// indices outside the collection are skipped.
    pub fn selection(&self, selected: usize, adjacent: &[usize]) -> Option<AdjacencySelection> {
        let first = self.get(selected)?;

        let mut features = vec![tagged(first.to_geojson(selected), "selected")];
        features.extend(
            adjacent
                .iter()
                .filter_map(|&idx| self.get(idx).map(|f| tagged(f.to_geojson(idx), "adjacent"))),
        );

        let total_count = features.len();
        Some(AdjacencySelection {
            geojson: geojson::FeatureCollection {
                bbox: None,
                features,
                foreign_members: None,
            },
            selected_id: selected,
            adjacent_ids: adjacent.to_vec(),
            total_count,
        })
    }
}

fn tagged(mut feature: geojson::Feature, selection_type: &str) -> geojson::Feature {
    feature.set_property("selection_type", selection_type);
    feature
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Feature, VectorFormat};
    use geo_types::point;
    use serde_json::json;

    fn collection() -> FeatureCollection {
        let features = (0..4)
            .map(|i| {
                let mut props = JsonObject::new();
                props.insert("particella".into(), json!(format!("P{}", i)));
                if i == 1 {
                    props.insert("owner".into(), json!("Rossi"));
                }
                Feature::new(Some(point!(x: i as f64, y: 0.0).into()), props)
            })
            .collect();
        FeatureCollection::new(features, "parcels.shp", VectorFormat::Shapefile)
    }

    #[test]
    fn test_attribute_table() {
        let table = collection().attributes();
        assert_eq!(table.total_features, 4);
        assert_eq!(table.columns, vec!["particella", "owner"]);
        assert_eq!(table.data[1]["index"], json!(1));
        assert_eq!(table.data[1]["owner"], json!("Rossi"));
        assert!(!table.data[2].contains_key("owner"));
    }

    #[test]
    fn test_selection_tags_selected_first() {
        let view = collection().selection(2, &[1, 3]).unwrap();
        assert_eq!(view.total_count, 3);
        assert_eq!(view.selected_id, 2);
        assert_eq!(view.adjacent_ids, vec![1, 3]);

        let kinds: Vec<_> = view
            .geojson
            .features
            .iter()
            .map(|f| f.property("selection_type").cloned())
            .collect();
        assert_eq!(
            kinds,
            vec![
                Some(json!("selected")),
                Some(json!("adjacent")),
                Some(json!("adjacent"))
            ]
        );
        assert_eq!(
            view.geojson.features[0].id,
            Some(geojson::feature::Id::String("2".into()))
        );
    }

    #[test]
    fn test_selection_out_of_range() {
        assert!(collection().selection(4, &[]).is_none());
    }
}
