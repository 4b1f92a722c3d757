//! Map loading from vector files and zip packages.
//!
//! A path ending with the direct extension is read as a vector file.
//! Anything else is first treated as a zip package: it is unpacked into a
//! temporary directory and searched for vector files in priority order.
//! Files that turn out not to be packages are read as vector files.

mod archive;
pub mod formats;
mod session;

#[cfg(test)]
pub(crate) mod testdata;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use zip::result::ZipError;

pub use formats::{detect_format, read_vector, ReadError};
pub use session::MapSession;

use crate::config::LoaderConfig;
use crate::models::FeatureCollection;
use archive::Extraction;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported vector format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("no vector data found in package {}", .0.display())]
    Empty(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: ReadError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("package extraction failed: {0}")]
    Archive(#[from] ZipError),

    #[error("none of the requested layers could be loaded")]
    NoLayers,
}

/// Loads feature collections from files and packages
#[derive(Debug, Clone, Default)]
pub struct MapLoader {
    config: LoaderConfig,
}

impl MapLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load the map at `path`.
    ///
    /// The temporary extraction directory, if any, is removed before
    /// returning on every path.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<FeatureCollection, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        if self.is_direct(path) {
            debug!("Reading {} directly", path.display());
            return read_file(path);
        }

        let dir = match archive::extract_package(path, self.config.max_extracted_bytes)? {
            Extraction::Extracted(dir) => dir,
            Extraction::NotAnArchive(reason) => {
                debug!(
                    "{} is not a package ({}), reading it directly",
                    path.display(),
                    reason
                );
                return read_file(path);
            }
        };

        let candidate = archive::find_vector_file(dir.path(), &self.config.search_extensions)
            .ok_or_else(|| LoadError::Empty(path.to_path_buf()))?;

        info!(
            "Loading {} from package {}",
            candidate
                .strip_prefix(dir.path())
                .unwrap_or(&candidate)
                .display(),
            path.display()
        );

        let collection = read_file(&candidate)?;
        Ok(collection.with_source(path))
    }

    fn is_direct(&self, path: &Path) -> bool {
        path.to_string_lossy()
            .ends_with(self.config.direct_extension.as_str())
    }
}

fn read_file(path: &Path) -> Result<FeatureCollection, LoadError> {
    let collection = read_vector(path).map_err(|e| match e {
        ReadError::UnknownFormat => LoadError::UnsupportedFormat(path.to_path_buf()),
        source => LoadError::Corrupt {
            path: path.to_path_buf(),
            source,
        },
    })?;

    info!(
        "Loaded {} features ({}) from {}",
        collection.len(),
        collection.format(),
        path.display()
    );
    Ok(collection)
}
