//! File-backed baseline source reading a JSON layer package.

use crate::error::LoadError;
use crate::source::BaselineSource;
use crate::types::{BaselineLayer, LayerPackage};
use std::fs;
use std::path::{Path, PathBuf};

/// Baseline source backed by a JSON layer package on disk.
///
/// The whole package is read and parsed once in [`JsonPackageSource::open`];
/// later layer loads are served from memory.
#[derive(Debug, Clone)]
pub struct JsonPackageSource {
    path: PathBuf,
    package: LayerPackage,
}

impl JsonPackageSource {
    /// Opens and parses a package.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let shown = path.display().to_string();

        if !path.exists() {
            return Err(LoadError::SourceNotFound(shown));
        }

        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: shown.clone(),
            source,
        })?;
        let package: LayerPackage =
            serde_json::from_str(&text).map_err(|source| LoadError::Parse {
                path: shown.clone(),
                source,
            })?;

        tracing::debug!(
            "Opened baseline package {} ({} layers)",
            shown,
            package.layers.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            package,
        })
    }

    /// Path the package was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BaselineSource for JsonPackageSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn layer_names(&self) -> Vec<String> {
        self.package.layers.keys().cloned().collect()
    }

    fn load_layer(&self, layer: &str) -> Result<BaselineLayer, LoadError> {
        self.package
            .layer(layer)
            .ok_or_else(|| LoadError::layer_not_found(layer))
    }

    fn has_layer(&self, layer: &str) -> bool {
        self.package.layers.contains_key(layer)
    }
}

/// Loads a single layer from a package file.
///
/// Convenience for callers that need exactly one layer; opening a
/// [`JsonPackageSource`] is cheaper when several layers are read.
pub fn load_baseline(source_path: impl AsRef<Path>, layer_name: &str) -> Result<BaselineLayer, LoadError> {
    JsonPackageSource::open(source_path)?.load_layer(layer_name)
}
