use std::path::Path;

use geo_types::Geometry;
use geojson::JsonObject;
use geozero::wkb::GpkgWkb;
use geozero::ToGeo;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde_json::Value;
use tracing::debug;

use super::ReadError;
use crate::models::Feature;

/// Primary key column GeoPackage writers add to every feature table
const FID_COLUMN: &str = "fid";

/// Read the first feature table of a GeoPackage
pub(super) fn read(path: &Path) -> Result<Vec<Feature>, ReadError> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let (table, geometry_column): (String, String) = conn
        .query_row(
            "SELECT c.table_name, g.column_name
             FROM gpkg_contents c
             JOIN gpkg_geometry_columns g ON g.table_name = c.table_name
             WHERE c.data_type = 'features'
             ORDER BY c.rowid
             LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or(ReadError::NoFeatureTable)?;

    debug!(
        "Reading GeoPackage layer '{}' (geometry column '{}')",
        table, geometry_column
    );

    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_identifier(&table)))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query([])?;
    let mut features = Vec::new();

    while let Some(row) = rows.next()? {
        let mut geometry = None;
        let mut properties = JsonObject::new();

        for (i, name) in columns.iter().enumerate() {
            let value = row.get_ref(i)?;
            if *name == geometry_column {
                geometry = decode_geometry(value);
            } else if name != FID_COLUMN {
                if let Some(v) = to_json(value) {
                    properties.insert(name.clone(), v);
                }
            }
        }

        features.push(Feature::new(geometry, properties));
    }

    Ok(features)
}

fn decode_geometry(value: ValueRef<'_>) -> Option<Geometry<f64>> {
    let ValueRef::Blob(bytes) = value else {
        return None;
    };

    match GpkgWkb(bytes.to_vec()).to_geo() {
        Ok(g) => Some(g),
        Err(e) => {
            debug!("Skipping undecodable GeoPackage geometry: {}", e);
            None
        }
    }
}

fn to_json(value: ValueRef<'_>) -> Option<Value> {
    match value {
        ValueRef::Null => Some(Value::Null),
        ValueRef::Integer(i) => Some(Value::from(i)),
        ValueRef::Real(f) => Some(Value::from(f)),
        ValueRef::Text(t) => Some(Value::from(String::from_utf8_lossy(t).into_owned())),
        ValueRef::Blob(_) => None,
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
