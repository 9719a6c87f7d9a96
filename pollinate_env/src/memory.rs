//! In-memory baseline source.

use crate::error::LoadError;
use crate::source::BaselineSource;
use crate::types::{BaselineLayer, LayerPackage};

/// Baseline source holding its layers in memory.
///
/// Used by tests and by the synthetic landscape generator, and to write a
/// package back out once built.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    package: LayerPackage,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer (builder style).
    pub fn with_layer(mut self, layer: BaselineLayer) -> Self {
        self.package.insert(layer);
        self
    }

    /// Adds or replaces a layer.
    pub fn insert(&mut self, layer: BaselineLayer) {
        self.package.insert(layer);
    }

    /// Returns the underlying package (e.g. to serialize it).
    pub fn package(&self) -> &LayerPackage {
        &self.package
    }
}

impl BaselineSource for MemorySource {
    fn describe(&self) -> String {
        format!("memory ({} layers)", self.package.layers.len())
    }

    fn layer_names(&self) -> Vec<String> {
        self.package.layers.keys().cloned().collect()
    }

    fn load_layer(&self, layer: &str) -> Result<BaselineLayer, LoadError> {
        self.package
            .layer(layer)
            .ok_or_else(|| LoadError::layer_not_found(layer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LayerFeature;

    #[test]
    fn test_memory_roundtrip() {
        let source = MemorySource::new().with_layer(BaselineLayer::new(
            "baseServices",
            vec![LayerFeature::new("a").with_property("sum", 0.3)],
        ));

        assert!(source.has_layer("baseServices"));
        assert!(!source.has_layer("cropLocations"));
        assert_eq!(source.load_layer("baseServices").unwrap().len(), 1);
        assert!(source.load_layer("cropLocations").is_err());
    }
}
