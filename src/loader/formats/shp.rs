use std::collections::HashMap;
use std::path::Path;

use geo_types::Geometry;
use geojson::JsonObject;
use serde_json::Value;
use shapefile::dbase::{self, FieldValue, Record};
use shapefile::{Shape, ShapeReader};
use tracing::{debug, warn};

use super::ReadError;
use crate::models::Feature;

/// Read shapes and their dBase attributes.
///
/// Without a `.dbf` next to the `.shp` only the shapes are read.
pub(super) fn read(path: &Path) -> Result<Vec<Feature>, ReadError> {
    if !path.with_extension("dbf").exists() {
        warn!(
            "No attribute table next to {}, reading shapes only",
            path.display()
        );
        let shapes = ShapeReader::from_path(path)?.read()?;
        return Ok(shapes
            .into_iter()
            .map(|shape| Feature::new(to_geometry(shape), JsonObject::new()))
            .collect());
    }

    let fields = field_names(&path.with_extension("dbf"))?;
    let mut reader = shapefile::Reader::from_path(path)?;
    let mut features = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;
        features.push(Feature::new(to_geometry(shape), to_properties(record, &fields)));
    }

    Ok(features)
}

fn to_geometry(shape: Shape) -> Option<Geometry<f64>> {
    if matches!(shape, Shape::NullShape) {
        return None;
    }

    match Geometry::<f64>::try_from(shape) {
        Ok(g) => Some(g),
        Err(e) => {
            debug!("Skipping unconvertible shape: {}", e);
            None
        }
    }
}

/// Column names in the order of the dBase header
fn field_names(dbf: &Path) -> Result<Vec<String>, ReadError> {
    let table = dbase::Reader::from_path(dbf)?;
    Ok(table
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect())
}

fn to_properties(record: Record, fields: &[String]) -> JsonObject {
    let mut values = HashMap::<String, FieldValue>::from(record);
    let mut properties: JsonObject = fields
        .iter()
        .filter_map(|name| values.remove_entry(name.as_str()))
        .map(|(name, value)| (name, to_json(value)))
        .collect();

    // Anything the header did not list goes last, by name
    let mut rest: Vec<_> = values.into_iter().collect();
    rest.sort_by(|a, b| a.0.cmp(&b.0));
    properties.extend(rest.into_iter().map(|(name, value)| (name, to_json(value))));

    properties
}

fn to_json(value: FieldValue) -> Value {
    match value {
        FieldValue::Character(v) => v.map(|s| Value::from(s.trim_end())).unwrap_or(Value::Null),
        FieldValue::Memo(s) => Value::from(s),
        FieldValue::Numeric(v) => v.map(Value::from).unwrap_or(Value::Null),
        FieldValue::Float(v) => v.map(|f| Value::from(f64::from(f))).unwrap_or(Value::Null),
        FieldValue::Double(v) => Value::from(v),
        FieldValue::Currency(v) => Value::from(v),
        FieldValue::Integer(v) => Value::from(v),
        FieldValue::Logical(v) => v.map(Value::from).unwrap_or(Value::Null),
        other => Value::from(format!("{:?}", other)),
    }
}
