use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub loader: LoaderConfig,
    pub server: ServerConfig,
}

/// How paths are classified and searched when loading a map
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoaderConfig {
    /// Suffix (case-sensitive) of files read directly, skipping package extraction
    pub direct_extension: String,
    /// Suffixes searched inside a package, highest priority first
    pub search_extensions: Vec<String>,
    /// Packages declaring more uncompressed bytes than this are not extracted
    pub max_extracted_bytes: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            direct_extension: ".gpkg".to_string(),
            search_extensions: [".shp", ".geojson", ".gpkg", ".kml"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_extracted_bytes: 4 * 1024 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    pub max_upload_bytes: usize,
    /// Directory that layer file paths in requests are relative to
    pub layers_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
            max_upload_bytes: 256 * 1024 * 1024,
            layers_root: PathBuf::from("."),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}
