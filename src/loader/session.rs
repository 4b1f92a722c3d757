//! Caller-owned holder of the most recently loaded map.

use std::path::Path;

use tracing::{debug, info, warn};

use super::{LoadError, MapLoader};
use crate::models::feature::{LAYER_NAME_FIELD, SOURCE_FILE_FIELD};
use crate::models::{FeatureCollection, LayerSet, MapLayer};

/// Keeps the last successfully loaded collection.
///
/// A successful load replaces the current collection; a failed load
/// leaves it untouched.
#[derive(Debug, Default)]
pub struct MapSession {
    loader: MapLoader,
    current: Option<FeatureCollection>,
}

impl MapSession {
    pub fn new(loader: MapLoader) -> Self {
        Self {
            loader,
            current: None,
        }
    }

    /// Load `path` and make it the current collection
    pub fn try_load(&mut self, path: impl AsRef<Path>) -> Result<&FeatureCollection, LoadError> {
        let collection = self.loader.load(path)?;
        Ok(&*self.current.insert(collection))
    }

    /// Like [`MapSession::try_load`], with every failure collapsed to `None`
    pub fn load(&mut self, path: impl AsRef<Path>) -> Option<&FeatureCollection> {
        let path = path.as_ref();
        match self.try_load(path) {
            Ok(collection) => Some(collection),
            Err(e) => {
                debug!("Load of {} failed: {}", path.display(), e);
                None
            }
        }
    }

    /// Load each of `files` (relative to `root`) as a layer and make their
    /// combined features the current collection.
    ///
    /// Missing or unreadable files and files without features are skipped.
    /// Every feature is tagged with its layer name (the file stem) and its
    /// file as given; `feature_id` is assigned per layer where absent.
    /// Fails with [`LoadError::NoLayers`] if nothing could be loaded, in
    /// which case the current collection is kept.
    pub fn load_layers<P: AsRef<Path>>(
        &mut self,
        root: &Path,
        files: &[P],
    ) -> Result<LayerSet, LoadError> {
        let mut layers = Vec::new();
        let mut collections = Vec::new();

        for file in files {
            let file = file.as_ref();
            let mut collection = match self.loader.load(root.join(file)) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Skipping layer {}: {}", file.display(), e);
                    continue;
                }
            };
            if collection.is_empty() {
                debug!("Skipping layer {}: no features", file.display());
                continue;
            }

            let name = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let label = file.to_string_lossy().into_owned();

            collection.set_property(LAYER_NAME_FIELD, name.as_str());
            collection.set_property(SOURCE_FILE_FIELD, label.as_str());
            collection.ensure_feature_ids();

            layers.push(MapLayer {
                name,
                file: label,
                geojson: collection.to_geojson(),
                feature_count: collection.len(),
            });
            collections.push(collection);
        }

        let combined = FeatureCollection::concat(collections, root).ok_or(LoadError::NoLayers)?;
        info!(
            "Loaded {} layers with {} features",
            layers.len(),
            combined.len()
        );

        let total_features = combined.len();
        self.current = Some(combined);

        Ok(LayerSet {
            total_layers: layers.len(),
            total_features,
            layers,
        })
    }

    pub fn current(&self) -> Option<&FeatureCollection> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut FeatureCollection> {
        self.current.as_mut()
    }

    pub fn loader(&self) -> &MapLoader {
        &self.loader
    }
}
