//! Package extraction and vector file discovery.

use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempDir};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::ZipArchive;

use super::LoadError;

/// Outcome of trying to unpack a package
pub(super) enum Extraction {
    /// Contents unpacked into a directory removed when dropped
    Extracted(TempDir),
    /// The file cannot be treated as a package
    NotAnArchive(String),
}

/// Unpack the zip package at `path` into a fresh temporary directory
pub(super) fn extract_package(path: &Path, max_bytes: u64) -> Result<Extraction, LoadError> {
    let file = File::open(path)?;

    let mut archive = match ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(ZipError::InvalidArchive(reason)) => {
            return Ok(Extraction::NotAnArchive(reason.to_string()));
        }
        Err(ZipError::UnsupportedArchive(reason)) => {
            return Ok(Extraction::NotAnArchive(reason.to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut declared: u64 = 0;
    for i in 0..archive.len() {
        declared = declared.saturating_add(archive.by_index_raw(i)?.size());
    }
    if declared > max_bytes {
        return Ok(Extraction::NotAnArchive(format!(
            "declares {} uncompressed bytes, limit is {}",
            declared, max_bytes
        )));
    }

    let dir = Builder::new().prefix("parcelmap-").tempdir()?;
    archive.extract(dir.path())?;

    info!(
        "Extracted {} entries from {}",
        archive.len(),
        path.display()
    );
    Ok(Extraction::Extracted(dir))
}

/// Find the first file under `root` ending with one of `extensions`.
///
/// Extensions are tried in order; every match of one extension is
/// collected before the next is considered. Traversal is sorted by file
/// name so the choice is stable across filesystems.
pub(super) fn find_vector_file(root: &Path, extensions: &[String]) -> Option<PathBuf> {
    let files: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unreadable package entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();

    for ext in extensions {
        let matches: Vec<&PathBuf> = files
            .iter()
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().ends_with(ext.as_str()))
                    .unwrap_or(false)
            })
            .collect();

        if let Some(first) = matches.first() {
            debug!("Found {} '{}' file(s) in package", matches.len(), ext);
            return Some((*first).clone());
        }
    }

    None
}
