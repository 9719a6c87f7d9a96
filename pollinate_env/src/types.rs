//! Layer and feature records as they arrive from a baseline source.

use crate::error::LoadError;
use geo::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

/// One feature row of a named layer.
///
/// Attributes are kept untyped until the core asks for a column, so a
/// single merged layer and several faceted layers look the same here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerFeature {
    /// Feature identifier, used to join layers
    pub id: String,

    /// Polygon (or other shape) of the landscape unit; never inspected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry<f64>>,

    /// Attribute columns
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl LayerFeature {
    /// Creates a feature with no geometry and no attributes.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            geometry: None,
            properties: Map::new(),
        }
    }

    /// Attaches a geometry.
    pub fn with_geometry(mut self, geometry: impl Into<Geometry<f64>>) -> Self {
        self.geometry = Some(geometry.into());
        self
    }

    /// Sets an attribute column.
    pub fn with_property(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(column.into(), value.into());
        self
    }

    /// Returns true if the column is present on this row (even if null).
    pub fn has_column(&self, column: &str) -> bool {
        self.properties.contains_key(column)
    }

    /// Reads a numeric column.
    ///
    /// Returns `Ok(None)` for an absent column or an explicit null, and an
    /// error if the value is present but not a number.
    pub fn number(&self, column: &str) -> Result<Option<f64>, LoadError> {
        match self.properties.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(_) => Err(LoadError::InvalidValue {
                feature: self.id.clone(),
                column: column.to_string(),
                expected: "a number",
            }),
        }
    }

    /// Reads a boolean indicator column.
    ///
    /// Accepts JSON booleans and the integers 0/1, which is how indicator
    /// columns usually come out of GIS exports.
    pub fn flag(&self, column: &str) -> Result<Option<bool>, LoadError> {
        match self.properties.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(0) => Ok(Some(false)),
                Some(1) => Ok(Some(true)),
                _ => Err(self.not_a_flag(column)),
            },
            Some(_) => Err(self.not_a_flag(column)),
        }
    }

    fn not_a_flag(&self, column: &str) -> LoadError {
        LoadError::InvalidValue {
            feature: self.id.clone(),
            column: column.to_string(),
            expected: "a boolean indicator",
        }
    }
}

/// A named layer of baseline features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineLayer {
    /// Layer name (e.g. "baseServices")
    pub name: String,

    /// Feature rows in source order
    pub features: Vec<LayerFeature>,
}

impl BaselineLayer {
    /// Creates a layer from its rows.
    pub fn new(name: impl Into<String>, features: Vec<LayerFeature>) -> Self {
        Self {
            name: name.into(),
            features,
        }
    }

    /// Number of feature rows.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if the layer has no rows.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Returns true if any row carries the column.
    pub fn has_column(&self, column: &str) -> bool {
        self.features.iter().any(|f| f.has_column(column))
    }

    /// Returns true if every row carries the column.
    pub fn column_complete(&self, column: &str) -> bool {
        !self.features.is_empty() && self.features.iter().all(|f| f.has_column(column))
    }

    /// Fails if the column is absent from every row.
    pub fn require_column(&self, column: &str) -> Result<(), LoadError> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(LoadError::missing_column(&self.name, column))
        }
    }

    /// Fails on repeated feature ids.
    pub fn check_unique_ids(&self) -> Result<(), LoadError> {
        let mut seen = HashSet::with_capacity(self.features.len());
        for feature in &self.features {
            if !seen.insert(feature.id.as_str()) {
                return Err(LoadError::DuplicateFeature {
                    layer: self.name.clone(),
                    id: feature.id.clone(),
                });
            }
        }
        Ok(())
    }
}

/// On-disk layout of a layer package: a JSON document of named layers.
///
/// ```json
/// { "layers": { "baseServices": [ { "id": "a", "properties": { "sum": 0.8 } } ] } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerPackage {
    pub layers: BTreeMap<String, Vec<LayerFeature>>,
}

impl LayerPackage {
    /// Adds or replaces a layer.
    pub fn insert(&mut self, layer: BaselineLayer) {
        self.layers.insert(layer.name, layer.features);
    }

    /// Returns a copy of the named layer.
    pub fn layer(&self, name: &str) -> Option<BaselineLayer> {
        self.layers
            .get(name)
            .map(|features| BaselineLayer::new(name, features.clone()))
    }
}
