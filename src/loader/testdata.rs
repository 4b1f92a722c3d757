//! Fixture writers for loader tests. Each square is `(x, y, name)`: a unit
//! square with its lower-left corner at `(x, y)`.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use rusqlite::{params, Connection};
use serde_json::json;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, PolygonRing};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub fn write_geojson(path: &Path, squares: &[(f64, f64, &str)]) {
    let features: Vec<_> = squares
        .iter()
        .map(|&(x, y, name)| {
            json!({
                "type": "Feature",
                "properties": {"name": name},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [x, y], [x + 1.0, y], [x + 1.0, y + 1.0], [x, y + 1.0], [x, y]
                    ]]
                }
            })
        })
        .collect();
    let doc = json!({"type": "FeatureCollection", "features": features});
    fs::write(path, doc.to_string()).unwrap();
}

/// Attribute columns are `ZONE` (always "Z1") then `NAME`
pub fn write_shapefile(path: &Path, squares: &[(f64, f64, &str)]) {
    let table = TableWriterBuilder::new()
        .add_character_field(FieldName::try_from("ZONE").unwrap(), 8)
        .add_character_field(FieldName::try_from("NAME").unwrap(), 32);
    let mut writer = shapefile::Writer::from_path(path, table).unwrap();

    for &(x, y, name) in squares {
        // Outer rings are clockwise in shapefiles
        let ring = vec![
            Point::new(x, y),
            Point::new(x, y + 1.0),
            Point::new(x + 1.0, y + 1.0),
            Point::new(x + 1.0, y),
            Point::new(x, y),
        ];
        let polygon = shapefile::Polygon::new(PolygonRing::Outer(ring));

        let mut record = Record::default();
        record.insert("ZONE".to_string(), FieldValue::Character(Some("Z1".to_string())));
        record.insert(
            "NAME".to_string(),
            FieldValue::Character(Some(name.to_string())),
        );
        writer.write_shape_and_record(&polygon, &record).unwrap();
    }
}

pub fn write_gpkg(path: &Path, squares: &[(f64, f64, &str)]) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE gpkg_contents (
             table_name TEXT NOT NULL PRIMARY KEY,
             data_type TEXT NOT NULL,
             identifier TEXT,
             srs_id INTEGER
         );
         CREATE TABLE gpkg_geometry_columns (
             table_name TEXT NOT NULL,
             column_name TEXT NOT NULL,
             geometry_type_name TEXT NOT NULL,
             srs_id INTEGER NOT NULL,
             z TINYINT NOT NULL,
             m TINYINT NOT NULL
         );
         CREATE TABLE parcels (
             fid INTEGER PRIMARY KEY AUTOINCREMENT,
             geom BLOB,
             name TEXT
         );
         INSERT INTO gpkg_contents VALUES ('parcels', 'features', 'parcels', 4326);
         INSERT INTO gpkg_geometry_columns VALUES ('parcels', 'geom', 'POLYGON', 4326, 0, 0);",
    )
    .unwrap();

    for &(x, y, name) in squares {
        conn.execute(
            "INSERT INTO parcels (geom, name) VALUES (?1, ?2)",
            params![gpkg_square(x, y), name],
        )
        .unwrap();
    }
}

/// GeoPackage binary: `GP` header without envelope, then little-endian WKB
fn gpkg_square(x: f64, y: f64) -> Vec<u8> {
    let mut blob = vec![b'G', b'P', 0, 0x01];
    blob.extend_from_slice(&4326i32.to_le_bytes());

    blob.push(0x01);
    blob.extend_from_slice(&3u32.to_le_bytes());
    blob.extend_from_slice(&1u32.to_le_bytes());
    let ring = [
        (x, y),
        (x + 1.0, y),
        (x + 1.0, y + 1.0),
        (x, y + 1.0),
        (x, y),
    ];
    blob.extend_from_slice(&(ring.len() as u32).to_le_bytes());
    for (px, py) in ring {
        blob.extend_from_slice(&px.to_le_bytes());
        blob.extend_from_slice(&py.to_le_bytes());
    }
    blob
}

/// Zip `files` (archive name, file on disk) into `path`
pub fn write_zip(path: &Path, files: &[(&str, &Path)]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, source) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(&fs::read(source).unwrap()).unwrap();
    }
    zip.finish().unwrap();
}
