//! Readers for single-file vector formats.
//!
//! The reader is picked from the file extension when it names a known
//! format, and from the first bytes of the file otherwise.

mod gpkg;
mod json;
mod kmldoc;
mod shp;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::models::{FeatureCollection, VectorFormat};

/// Bytes inspected when sniffing a file without a known extension
const SNIFF_LEN: u64 = 512;

const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";
const SHAPEFILE_MAGIC: [u8; 4] = [0x00, 0x00, 0x27, 0x0A];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("invalid shapefile: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("invalid dBase table: {0}")]
    Dbase(#[from] shapefile::dbase::Error),

    #[error("invalid KML: {0}")]
    Kml(#[from] kml::Error),

    #[error("GeoPackage query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("GeoPackage has no feature table")]
    NoFeatureTable,

    #[error("unrecognized vector format")]
    UnknownFormat,
}

/// Determine the vector format of `path`
pub fn detect_format(path: &Path) -> Result<Option<VectorFormat>, std::io::Error> {
    if let Some(format) = format_from_extension(path) {
        return Ok(Some(format));
    }

    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    File::open(path)?.take(SNIFF_LEN).read_to_end(&mut head)?;
    Ok(sniff(&head))
}

fn format_from_extension(path: &Path) -> Option<VectorFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "shp" => Some(VectorFormat::Shapefile),
        "geojson" | "json" => Some(VectorFormat::GeoJson),
        "gpkg" => Some(VectorFormat::GeoPackage),
        "kml" => Some(VectorFormat::Kml),
        _ => None,
    }
}

fn sniff(head: &[u8]) -> Option<VectorFormat> {
    if head.starts_with(SQLITE_MAGIC) {
        return Some(VectorFormat::GeoPackage);
    }
    if head.starts_with(&SHAPEFILE_MAGIC) {
        return Some(VectorFormat::Shapefile);
    }

    let text = head.strip_prefix(UTF8_BOM).unwrap_or(head);
    match text.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => Some(VectorFormat::GeoJson),
        Some(b'<') => Some(VectorFormat::Kml),
        _ => None,
    }
}

/// Read a single vector file into a feature collection
pub fn read_vector(path: &Path) -> Result<FeatureCollection, ReadError> {
    let format = detect_format(path)?.ok_or(ReadError::UnknownFormat)?;
    debug!("Reading {} as {}", path.display(), format);

    let features = match format {
        VectorFormat::Shapefile => shp::read(path)?,
        VectorFormat::GeoJson => json::read(path)?,
        VectorFormat::GeoPackage => gpkg::read(path)?,
        VectorFormat::Kml => kmldoc::read(path)?,
    };

    Ok(FeatureCollection::new(features, path, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::testdata;

    #[test]
    fn test_sniff_magic_numbers() {
        assert_eq!(sniff(b"SQLite format 3\0rest"), Some(VectorFormat::GeoPackage));
        assert_eq!(sniff(&[0, 0, 0x27, 0x0A, 0, 0]), Some(VectorFormat::Shapefile));
        assert_eq!(sniff(b"\xEF\xBB\xBF  {\"type\":"), Some(VectorFormat::GeoJson));
        assert_eq!(sniff(b"<?xml version=\"1.0\"?>"), Some(VectorFormat::Kml));
        assert_eq!(sniff(b"PK\x03\x04"), None);
        assert_eq!(sniff(b""), None);
    }

    #[test]
    fn test_extension_wins_over_content() {
        assert_eq!(
            format_from_extension(Path::new("a/b/Parcels.SHP")),
            Some(VectorFormat::Shapefile)
        );
        assert_eq!(format_from_extension(Path::new("map.qpkg")), None);
    }

    #[test]
    fn test_read_sniffed_geojson() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parcels.dat");
        testdata::write_geojson(&path, &[(0.0, 0.0, "A"), (1.0, 0.0, "B")]);

        let fc = read_vector(&path).unwrap();
        assert_eq!(fc.format(), VectorFormat::GeoJson);
        assert_eq!(fc.len(), 2);
    }

    #[test]
    fn test_unknown_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "just some text").unwrap();

        assert!(matches!(read_vector(&path), Err(ReadError::UnknownFormat)));
    }
}
