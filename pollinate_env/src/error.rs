//! Error types for the baseline data boundary.

use thiserror::Error;

/// Errors raised while loading baseline layers.
///
/// All of these are fatal at startup: no part of the scenario engine can run
/// without a complete feature store.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The baseline package does not exist at the given path
    #[error("Baseline source not found: {0}")]
    SourceNotFound(String),

    /// Reading the package failed
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The package is not a valid layer document
    #[error("Malformed baseline package {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The requested layer is absent from the source
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    /// A required attribute column is absent from a layer
    #[error("Layer '{layer}' is missing column '{column}'")]
    MissingColumn { layer: String, column: String },

    /// An attribute holds a value of the wrong kind
    #[error("Column '{column}' of feature '{feature}' is not {expected}")]
    InvalidValue {
        feature: String,
        column: String,
        expected: &'static str,
    },

    /// Two features in one layer share an id
    #[error("Duplicate feature id '{id}' in layer '{layer}'")]
    DuplicateFeature { layer: String, id: String },

    /// The primary layer holds no features
    #[error("Layer '{0}' contains no features")]
    EmptyLayer(String),
}

impl LoadError {
    /// Creates a missing-layer error.
    pub fn layer_not_found(layer: impl Into<String>) -> Self {
        Self::LayerNotFound(layer.into())
    }

    /// Creates a missing-column error.
    pub fn missing_column(layer: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            layer: layer.into(),
            column: column.into(),
        }
    }
}
