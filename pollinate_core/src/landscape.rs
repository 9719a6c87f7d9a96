//! The landscape: an immutable store of baseline features.
//!
//! Baseline facets (service levels, pesticide rates, crop locations,
//! optional climate-impact columns) may arrive as separate layers or as one
//! merged layer. [`FeatureStore::load`] joins whatever it is given on
//! feature id and freezes the result; nothing downstream can mutate it.

use crate::crops::CropCatalog;
use crate::params::RichnessDomain;
use geo::{BoundingRect, Coord, Geometry, Rect};
use pollinate_env::{BaselineLayer, BaselineSource, LayerFeature, LoadError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Per-scenario climate impact on a feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClimateImpact {
    /// Fractional impact under SSP1 (optimistic)
    pub ssp1: f64,
    /// Fractional impact under SSP5 (pessimistic)
    pub ssp5: f64,
}

/// One landscape unit with its baseline attributes.
#[derive(Debug, Clone)]
pub struct GeoFeature {
    /// Feature identifier
    pub id: String,

    /// Shape of the unit, passed through to renderers untouched
    pub geometry: Option<Geometry<f64>>,

    /// Baseline pollination-service index
    pub base_service: f64,

    /// Pesticide applied per unit area; `None` where the source has no value
    pub pesticide_rate: Option<f64>,

    /// Names of the crops grown here (fixed at load time)
    pub crops: BTreeSet<String>,

    /// Climate-impact columns, when the dataset carries them
    pub climate_impact: Option<ClimateImpact>,
}

impl GeoFeature {
    /// Creates a feature with a known pesticide rate and no crops.
    pub fn new(id: impl Into<String>, base_service: f64) -> Self {
        Self {
            id: id.into(),
            geometry: None,
            base_service,
            pesticide_rate: Some(0.0),
            crops: BTreeSet::new(),
            climate_impact: None,
        }
    }

    pub fn with_pesticide_rate(mut self, rate: Option<f64>) -> Self {
        self.pesticide_rate = rate;
        self
    }

    pub fn with_crop(mut self, crop: impl Into<String>) -> Self {
        self.crops.insert(crop.into());
        self
    }

    pub fn with_climate_impact(mut self, ssp1: f64, ssp5: f64) -> Self {
        self.climate_impact = Some(ClimateImpact { ssp1, ssp5 });
        self
    }

    pub fn with_geometry(mut self, geometry: impl Into<Geometry<f64>>) -> Self {
        self.geometry = Some(geometry.into());
        self
    }

    /// Returns true if the crop's indicator is set on this feature.
    pub fn grows(&self, crop: &str) -> bool {
        self.crops.contains(crop)
    }
}

// =============================================================================
// MODEL VARIANT
// =============================================================================

/// Which adjustment formula the dataset shape calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// Fixed richness and climate multipliers
    Simple,
    /// Per-feature SSP impact columns replace the climate multiplier
    ScenarioColumns,
}

impl ModelVariant {
    /// Picks the variant a set of features supports.
    ///
    /// The scenario-column formula needs impact values on every feature;
    /// anything less falls back to the simple formula.
    pub fn detect(features: &[GeoFeature]) -> Self {
        if !features.is_empty() && features.iter().all(|f| f.climate_impact.is_some()) {
            ModelVariant::ScenarioColumns
        } else {
            ModelVariant::Simple
        }
    }

    /// Richness levels the variant is calibrated for.
    pub fn richness_domain(&self) -> RichnessDomain {
        match self {
            ModelVariant::Simple => RichnessDomain::Full,
            ModelVariant::ScenarioColumns => RichnessDomain::Reduced,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelVariant::Simple => "simple",
            ModelVariant::ScenarioColumns => "scenario_columns",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// BASELINE LAYOUT
// =============================================================================

/// Where each baseline facet lives in the source.
///
/// Facet layers are optional: a column missing from its facet layer is
/// looked up on the service layer, so a single merged layer works with the
/// default layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineLayout {
    /// Layer holding the baseline service index (required)
    pub service_layer: String,
    /// Layer holding pesticide rates
    pub pesticide_layer: Option<String>,
    /// Layer holding crop indicators
    pub crop_layer: Option<String>,
    /// Baseline service column
    pub service_column: String,
    /// Pesticide rate column
    pub pesticide_column: String,
    /// SSP1 climate-impact column
    pub ssp1_column: String,
    /// SSP5 climate-impact column
    pub ssp5_column: String,
}

impl Default for BaselineLayout {
    fn default() -> Self {
        Self {
            service_layer: "baseServices".to_string(),
            pesticide_layer: Some("basePesticides".to_string()),
            crop_layer: Some("cropLocations".to_string()),
            service_column: "sum".to_string(),
            pesticide_column: "kgPerArea".to_string(),
            ssp1_column: "ssp1".to_string(),
            ssp5_column: "ssp5".to_string(),
        }
    }
}

/// Rows contributing to one feature, searched in order for each column.
struct JoinedRow<'a> {
    rows: Vec<&'a LayerFeature>,
}

impl<'a> JoinedRow<'a> {
    fn holder(&self, column: &str) -> Option<&'a LayerFeature> {
        self.rows.iter().copied().find(|row| row.has_column(column))
    }

    fn number(&self, column: &str) -> Result<Option<f64>, LoadError> {
        match self.holder(column) {
            Some(row) => row.number(column),
            None => Ok(None),
        }
    }

    fn flag(&self, column: &str) -> Result<bool, LoadError> {
        match self.holder(column) {
            Some(row) => Ok(row.flag(column)?.unwrap_or(false)),
            None => Ok(false),
        }
    }
}

// =============================================================================
// FEATURE STORE
// =============================================================================

/// Immutable collection of baseline features.
///
/// Built once at startup and shared (`Arc<FeatureStore>`) by every
/// derivation. The variant is fixed at construction.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    features: Vec<GeoFeature>,
    index: HashMap<String, usize>,
    variant: ModelVariant,
    origin: String,
}

impl FeatureStore {
    /// Builds a store from already-typed features.
    ///
    /// Ids must be unique, as they are for a loaded baseline.
    pub fn from_features(features: Vec<GeoFeature>) -> Result<Self, LoadError> {
        let origin = "in-memory";
        let mut seen = HashSet::with_capacity(features.len());
        if let Some(dup) = features.iter().find(|f| !seen.insert(f.id.as_str())) {
            return Err(LoadError::DuplicateFeature {
                layer: origin.to_string(),
                id: dup.id.clone(),
            });
        }
        Ok(Self::with_origin(features, origin))
    }

    fn with_origin(features: Vec<GeoFeature>, origin: impl Into<String>) -> Self {
        let index = features
            .iter()
            .enumerate()
            .map(|(i, f)| (f.id.clone(), i))
            .collect();
        let variant = ModelVariant::detect(&features);
        Self {
            features,
            index,
            variant,
            origin: origin.into(),
        }
    }

    /// Loads and joins baseline layers from a source.
    ///
    /// The service layer defines the feature set and order. Facet layers
    /// are joined on id; features absent from a facet layer get a null
    /// pesticide rate and no crops.
    pub fn load(
        source: &dyn BaselineSource,
        layout: &BaselineLayout,
        crops: &CropCatalog,
    ) -> Result<Self, LoadError> {
        let services = source.load_layer(&layout.service_layer)?;
        if services.is_empty() {
            return Err(LoadError::EmptyLayer(services.name.clone()));
        }
        services.check_unique_ids()?;
        services.require_column(&layout.service_column)?;

        let pesticides = load_facet(source, layout.pesticide_layer.as_deref())?;
        let crop_rows = load_facet(source, layout.crop_layer.as_deref())?;

        // Every required column must exist somewhere
        let facet_has = |layer: &Option<BaselineLayer>, column: &str| {
            layer.as_ref().is_some_and(|l| l.has_column(column))
        };
        if !services.has_column(&layout.pesticide_column)
            && !facet_has(&pesticides, &layout.pesticide_column)
        {
            let layer = layout
                .pesticide_layer
                .clone()
                .unwrap_or_else(|| services.name.clone());
            return Err(LoadError::missing_column(layer, &layout.pesticide_column));
        }
        for profile in crops.profiles() {
            if !services.has_column(&profile.indicator_column)
                && !facet_has(&crop_rows, &profile.indicator_column)
            {
                let layer = layout
                    .crop_layer
                    .clone()
                    .unwrap_or_else(|| services.name.clone());
                return Err(LoadError::missing_column(layer, &profile.indicator_column));
            }
        }

        let pesticide_index = index_rows(pesticides.as_ref());
        let crop_index = index_rows(crop_rows.as_ref());
        let mut unjoined = 0usize;

        let mut features = Vec::with_capacity(services.len());
        for row in &services.features {
            let mut joined = JoinedRow { rows: vec![row] };
            for index in [&pesticide_index, &crop_index].into_iter().flatten() {
                match index.get(row.id.as_str()) {
                    Some(facet) => joined.rows.push(*facet),
                    None => unjoined += 1,
                }
            }

            let base_service = row.number(&layout.service_column)?.ok_or_else(|| {
                LoadError::InvalidValue {
                    feature: row.id.clone(),
                    column: layout.service_column.clone(),
                    expected: "a number",
                }
            })?;

            let mut feature = GeoFeature {
                id: row.id.clone(),
                geometry: row.geometry.clone(),
                base_service,
                pesticide_rate: joined.number(&layout.pesticide_column)?,
                crops: BTreeSet::new(),
                climate_impact: None,
            };

            for profile in crops.profiles() {
                if joined.flag(&profile.indicator_column)? {
                    feature.crops.insert(profile.name.clone());
                }
            }

            if let (Some(ssp1), Some(ssp5)) = (
                joined.number(&layout.ssp1_column)?,
                joined.number(&layout.ssp5_column)?,
            ) {
                feature.climate_impact = Some(ClimateImpact { ssp1, ssp5 });
            }

            features.push(feature);
        }

        if unjoined > 0 {
            tracing::warn!(
                "{} facet rows missing for features of layer '{}'",
                unjoined,
                services.name
            );
        }

        let store = Self::with_origin(features, source.describe());
        tracing::info!(
            "Loaded {} features from {} (variant: {})",
            store.len(),
            store.origin,
            store.variant
        );
        Ok(store)
    }

    pub fn features(&self) -> &[GeoFeature] {
        &self.features
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GeoFeature> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Looks a feature up by id.
    pub fn get(&self, id: &str) -> Option<&GeoFeature> {
        self.index.get(id).map(|&i| &self.features[i])
    }

    /// Position of a feature in store order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    /// Where the features came from (for logs).
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Features whose pesticide rate is null.
    pub fn null_rate_count(&self) -> usize {
        self.features
            .iter()
            .filter(|f| f.pesticide_rate.is_none())
            .count()
    }

    /// Features growing the named crop.
    pub fn crop_count(&self, crop: &str) -> usize {
        self.features.iter().filter(|f| f.grows(crop)).count()
    }

    /// Bounding box over all geometries, if any feature has one.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.as_ref()?.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            })
    }
}

fn load_facet(
    source: &dyn BaselineSource,
    layer: Option<&str>,
) -> Result<Option<BaselineLayer>, LoadError> {
    match layer {
        Some(name) if source.has_layer(name) => {
            let layer = source.load_layer(name)?;
            layer.check_unique_ids()?;
            Ok(Some(layer))
        }
        Some(name) => {
            tracing::debug!("Facet layer '{}' absent, expecting merged columns", name);
            Ok(None)
        }
        None => Ok(None),
    }
}

fn index_rows(layer: Option<&BaselineLayer>) -> Option<HashMap<&str, &LayerFeature>> {
    layer.map(|l| l.features.iter().map(|f| (f.id.as_str(), f)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Point};
    use pollinate_env::MemorySource;
    use serde_json::Value;

    fn faceted_source() -> MemorySource {
        MemorySource::new()
            .with_layer(BaselineLayer::new(
                "baseServices",
                vec![
                    LayerFeature::new("a")
                        .with_property("sum", 0.8)
                        .with_geometry(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]),
                    LayerFeature::new("b")
                        .with_property("sum", 0.4)
                        .with_geometry(Point::new(5.0, -2.0)),
                ],
            ))
            .with_layer(BaselineLayer::new(
                "basePesticides",
                vec![
                    LayerFeature::new("a").with_property("kgPerArea", 0.2),
                    LayerFeature::new("b").with_property("kgPerArea", Value::Null),
                ],
            ))
            .with_layer(BaselineLayer::new(
                "cropLocations",
                vec![
                    LayerFeature::new("a")
                        .with_property("apple", true)
                        .with_property("blueberry", false)
                        .with_property("alfalfa", 0)
                        .with_property("corn", 1),
                    LayerFeature::new("b")
                        .with_property("apple", false)
                        .with_property("blueberry", true)
                        .with_property("alfalfa", 0)
                        .with_property("corn", 0),
                ],
            ))
    }

    #[test]
    fn test_load_faceted_layers() {
        let store = FeatureStore::load(
            &faceted_source(),
            &BaselineLayout::default(),
            &CropCatalog::default(),
        )
        .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.variant(), ModelVariant::Simple);

        let a = store.get("a").unwrap();
        assert_eq!(a.base_service, 0.8);
        assert_eq!(a.pesticide_rate, Some(0.2));
        assert!(a.grows("apple") && a.grows("corn"));
        assert!(!a.grows("blueberry"));

        let b = store.get("b").unwrap();
        assert_eq!(b.pesticide_rate, None);
        assert_eq!(store.null_rate_count(), 1);
        assert_eq!(store.crop_count("blueberry"), 1);
    }

    #[test]
    fn test_load_merged_layer_with_scenario_columns() {
        let source = MemorySource::new().with_layer(BaselineLayer::new(
            "baseServices",
            vec![LayerFeature::new("only")
                .with_property("sum", 0.6)
                .with_property("kgPerArea", 0.1)
                .with_property("ssp1", 0.2)
                .with_property("ssp5", 0.6)
                .with_property("apple", 1)
                .with_property("blueberry", 0)
                .with_property("alfalfa", 0)
                .with_property("corn", 0)],
        ));

        let store =
            FeatureStore::load(&source, &BaselineLayout::default(), &CropCatalog::default())
                .unwrap();

        assert_eq!(store.variant(), ModelVariant::ScenarioColumns);
        assert_eq!(store.variant().richness_domain(), RichnessDomain::Reduced);
        let only = store.get("only").unwrap();
        assert_eq!(only.climate_impact, Some(ClimateImpact { ssp1: 0.2, ssp5: 0.6 }));
    }

    #[test]
    fn test_missing_service_layer() {
        let err = FeatureStore::load(
            &MemorySource::new(),
            &BaselineLayout::default(),
            &CropCatalog::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::LayerNotFound(_)));
    }

    #[test]
    fn test_missing_crop_column() {
        let source = MemorySource::new().with_layer(BaselineLayer::new(
            "baseServices",
            vec![LayerFeature::new("a")
                .with_property("sum", 0.6)
                .with_property("kgPerArea", 0.1)],
        ));
        let err = FeatureStore::load(&source, &BaselineLayout::default(), &CropCatalog::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { column, .. } if column == "apple"));
    }

    #[test]
    fn test_missing_pesticide_column() {
        let source = MemorySource::new().with_layer(BaselineLayer::new(
            "baseServices",
            vec![LayerFeature::new("a").with_property("sum", 0.6)],
        ));
        let err = FeatureStore::load(&source, &BaselineLayout::default(), &CropCatalog::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { column, .. } if column == "kgPerArea"));
    }

    #[test]
    fn test_variant_detection_needs_every_feature() {
        let features = vec![
            GeoFeature::new("a", 0.5).with_climate_impact(0.1, 0.3),
            GeoFeature::new("b", 0.5),
        ];
        assert_eq!(ModelVariant::detect(&features), ModelVariant::Simple);
        assert_eq!(ModelVariant::detect(&[]), ModelVariant::Simple);
    }

    #[test]
    fn test_from_features_rejects_duplicate_ids() {
        let err = FeatureStore::from_features(vec![
            GeoFeature::new("a", 0.2),
            GeoFeature::new("b", 0.4),
            GeoFeature::new("a", 0.9),
        ])
        .unwrap_err();
        assert!(matches!(err, LoadError::DuplicateFeature { id, .. } if id == "a"));

        let store = FeatureStore::from_features(vec![GeoFeature::new("a", 0.2)]).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.origin(), "in-memory");
    }

    #[test]
    fn test_bounds_cover_all_geometries() {
        let store = FeatureStore::load(
            &faceted_source(),
            &BaselineLayout::default(),
            &CropCatalog::default(),
        )
        .unwrap();
        let bounds = store.bounds().unwrap();
        assert_eq!(bounds.min(), Coord { x: 0.0, y: -2.0 });
        assert_eq!(bounds.max(), Coord { x: 5.0, y: 1.0 });
    }
}
