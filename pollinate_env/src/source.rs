//! Baseline source abstraction.

use crate::error::LoadError;
use crate::types::BaselineLayer;

/// Where baseline layers come from.
///
/// # Implementations
///
/// - **File-backed**: `JsonPackageSource` - a JSON layer package on disk
/// - **In-memory**: `MemorySource` - layers built in code (tests, synthetic landscapes)
///
/// The core only ever asks for whole layers by name; joining facets into
/// features happens on the core side.
pub trait BaselineSource: Send + Sync {
    /// Human-readable description for logs (path, "memory", ...).
    fn describe(&self) -> String;

    /// Names of all layers the source can provide.
    fn layer_names(&self) -> Vec<String>;

    /// Loads one named layer.
    ///
    /// # Returns
    /// * `Ok(layer)` - The layer rows in source order
    /// * `Err(LoadError::LayerNotFound)` - No layer of that name
    fn load_layer(&self, layer: &str) -> Result<BaselineLayer, LoadError>;

    /// Returns true if the named layer exists.
    fn has_layer(&self, layer: &str) -> bool {
        self.layer_names().iter().any(|name| name == layer)
    }
}
