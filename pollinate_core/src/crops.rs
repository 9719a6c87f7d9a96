//! Per-crop summaries of the adjusted landscape.
//!
//! Each crop is a row in a [`CropCatalog`]: a name, the indicator column
//! marking where it grows, and a [`CorrectionPolicy`] applied to its rounded
//! mean. Adding a crop is a catalog entry, not a code change.

use crate::adjustment::AdjustedFeatures;
use crate::error::ModelError;
use crate::measure::Measure;
use crate::params::ScenarioParameters;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Decimal places of the raw crop mean.
pub const MEAN_DECIMALS: i32 = 2;

/// Wind-pollination buffer for alfalfa.
pub const ALFALFA_BUFFER: f64 = 0.15;

/// Wind-pollination buffer for corn.
pub const CORN_BUFFER: f64 = 0.11;

/// Which vulnerability dial a correction reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VulnerabilityDial {
    /// Spring-active bees
    Spring,
    /// Buzz-pollinating bees
    Buzz,
}

impl VulnerabilityDial {
    pub fn read(&self, params: &ScenarioParameters) -> f64 {
        match self {
            VulnerabilityDial::Spring => params.spring_vulnerability.get(),
            VulnerabilityDial::Buzz => params.buzz_vulnerability.get(),
        }
    }
}

/// Display correction applied to a crop's rounded mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CorrectionPolicy {
    /// `raw − (vulnerability × raw / 2)`
    VulnerabilityDiscount { dial: VulnerabilityDial },
    /// `raw + buffer`
    FixedBuffer { buffer: f64 },
    /// `raw`
    Identity,
}

impl CorrectionPolicy {
    /// Applies the correction. Undefined means stay undefined.
    pub fn apply(&self, raw: Measure, params: &ScenarioParameters) -> Measure {
        match *self {
            CorrectionPolicy::VulnerabilityDiscount { dial } => {
                let vulnerability = dial.read(params);
                raw.map(|r| discount(r, vulnerability))
            }
            CorrectionPolicy::FixedBuffer { buffer } => raw.map(|r| r + buffer),
            CorrectionPolicy::Identity => raw,
        }
    }
}

/// `raw − (vulnerability × raw / 2)`
pub fn discount(raw: f64, vulnerability: f64) -> f64 {
    raw - (vulnerability * raw / 2.0)
}

/// One crop's catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropProfile {
    /// Stable key (e.g. "apple")
    pub name: String,
    /// Widget title (e.g. "Apples")
    pub label: String,
    /// Boolean column marking features that grow the crop
    pub indicator_column: String,
    /// Display correction
    pub correction: CorrectionPolicy,
}

impl CropProfile {
    /// Profile whose indicator column is its name.
    pub fn new(name: &str, label: &str, correction: CorrectionPolicy) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            indicator_column: name.to_string(),
            correction,
        }
    }
}

/// Ordered crop catalog; order is display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CropCatalog {
    profiles: Vec<CropProfile>,
}

impl Default for CropCatalog {
    /// apple, blueberry, alfalfa, corn.
    fn default() -> Self {
        Self {
            profiles: vec![
                CropProfile::new(
                    "apple",
                    "Apples",
                    CorrectionPolicy::VulnerabilityDiscount {
                        dial: VulnerabilityDial::Spring,
                    },
                ),
                CropProfile::new(
                    "blueberry",
                    "Blueberries",
                    CorrectionPolicy::VulnerabilityDiscount {
                        dial: VulnerabilityDial::Buzz,
                    },
                ),
                CropProfile::new(
                    "alfalfa",
                    "Alfalfa",
                    CorrectionPolicy::FixedBuffer {
                        buffer: ALFALFA_BUFFER,
                    },
                ),
                CropProfile::new(
                    "corn",
                    "Corn",
                    CorrectionPolicy::FixedBuffer {
                        buffer: CORN_BUFFER,
                    },
                ),
            ],
        }
    }
}

impl CropCatalog {
    /// Builds a catalog, rejecting duplicate crop names.
    pub fn new(profiles: Vec<CropProfile>) -> Result<Self, ModelError> {
        let catalog = Self { profiles };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Checks names are non-empty and unique.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut seen = HashSet::new();
        for profile in &self.profiles {
            if profile.name.is_empty() {
                return Err(ModelError::config("crop profile with empty name"));
            }
            if !seen.insert(profile.name.as_str()) {
                return Err(ModelError::config(format!("duplicate crop '{}'", profile.name)));
            }
        }
        Ok(())
    }

    /// Appends a crop at the end of the display order.
    pub fn with_crop(mut self, profile: CropProfile) -> Result<Self, ModelError> {
        self.profiles.push(profile);
        self.validate()?;
        Ok(self)
    }

    pub fn profiles(&self) -> &[CropProfile] {
        &self.profiles
    }

    pub fn get(&self, name: &str) -> Option<&CropProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

// =============================================================================
// AGGREGATES
// =============================================================================

/// Summary of one crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropAggregate {
    pub crop: String,
    pub label: String,
    /// Features growing the crop
    pub feature_count: usize,
    /// Mean adjusted value, rounded to two places
    pub raw_mean: Measure,
    /// `raw_mean` after the crop's correction
    pub display_value: Measure,
}

impl CropAggregate {
    /// Text for a "Mean" value box.
    pub fn widget_text(&self) -> String {
        format!("Mean: {}", crate::display::format_measure(self.display_value))
    }
}

/// All crop aggregates, in catalog order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CropSummary {
    aggregates: Vec<CropAggregate>,
}

impl CropSummary {
    pub fn aggregates(&self) -> &[CropAggregate] {
        &self.aggregates
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CropAggregate> {
        self.aggregates.iter()
    }

    pub fn get(&self, crop: &str) -> Option<&CropAggregate> {
        self.aggregates.iter().find(|a| a.crop == crop)
    }

    pub fn len(&self) -> usize {
        self.aggregates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }
}

impl<'a> IntoIterator for &'a CropSummary {
    type Item = &'a CropAggregate;
    type IntoIter = std::slice::Iter<'a, CropAggregate>;

    fn into_iter(self) -> Self::IntoIter {
        self.aggregates.iter()
    }
}

/// Reduces adjusted features to one aggregate per catalog crop.
#[derive(Debug, Clone)]
pub struct CropAggregator {
    catalog: CropCatalog,
    parallel_threshold: usize,
}

impl CropAggregator {
    /// Reductions run on the rayon pool once the landscape has at least
    /// `parallel_threshold` features.
    pub fn new(catalog: CropCatalog, parallel_threshold: usize) -> Self {
        Self {
            catalog,
            parallel_threshold,
        }
    }

    pub fn catalog(&self) -> &CropCatalog {
        &self.catalog
    }

    /// One aggregate per crop, in catalog order.
    pub fn aggregate(&self, adjusted: &AdjustedFeatures, params: &ScenarioParameters) -> CropSummary {
        let profiles = self.catalog.profiles();
        let aggregates: Vec<CropAggregate> = if adjusted.len() >= self.parallel_threshold && profiles.len() > 1 {
            // par_iter().map().collect() preserves order
            profiles
                .par_iter()
                .map(|profile| aggregate_crop(profile, adjusted, params))
                .collect()
        } else {
            profiles
                .iter()
                .map(|profile| aggregate_crop(profile, adjusted, params))
                .collect()
        };
        CropSummary { aggregates }
    }
}

fn aggregate_crop(
    profile: &CropProfile,
    adjusted: &AdjustedFeatures,
    params: &ScenarioParameters,
) -> CropAggregate {
    let members = || {
        adjusted
            .iter()
            .filter(|(feature, _)| feature.grows(&profile.name))
            .map(|(_, value)| value)
    };

    let raw_mean = Measure::mean(members()).round_to(MEAN_DECIMALS);
    let display_value = profile.correction.apply(raw_mean, params);

    CropAggregate {
        crop: profile.name.clone(),
        label: profile.label.clone(),
        feature_count: members().count(),
        raw_mean,
        display_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjustment::{AdjustmentEngine, NullRatePolicy};
    use crate::landscape::{FeatureStore, GeoFeature, ModelVariant};
    use crate::measure::UndefinedCause;
    use crate::params::{ParameterStore, RichnessDomain};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn one_per_crop(rate: Option<f64>) -> Arc<FeatureStore> {
        Arc::new(FeatureStore::from_features(
            ["apple", "blueberry", "alfalfa", "corn"]
                .iter()
                .map(|crop| {
                    GeoFeature::new(*crop, 0.8)
                        .with_pesticide_rate(rate)
                        .with_crop(*crop)
                })
                .collect(),
        )
        .unwrap())
    }

    fn scenario(spring: f64, buzz: f64) -> ScenarioParameters {
        let mut store = ParameterStore::new(RichnessDomain::Full);
        store.set_parameter("pesticidePressure", 0.5).unwrap();
        store.set_parameter("springVulnerability", spring).unwrap();
        store.set_parameter("buzzVulnerability", buzz).unwrap();
        store.get()
    }

    fn summarize(store: &Arc<FeatureStore>, params: &ScenarioParameters, threshold: usize) -> CropSummary {
        let adjusted = AdjustmentEngine::new(ModelVariant::Simple, NullRatePolicy::Propagate)
            .compute(store, params);
        CropAggregator::new(CropCatalog::default(), threshold).aggregate(&adjusted, params)
    }

    #[test]
    fn test_example_landscape() {
        let params = scenario(0.2, 0.25);
        let summary = summarize(&one_per_crop(Some(0.2)), &params, usize::MAX);

        let names: Vec<&str> = summary.iter().map(|a| a.crop.as_str()).collect();
        assert_eq!(names, vec!["apple", "blueberry", "alfalfa", "corn"]);

        for aggregate in &summary {
            assert_eq!(aggregate.raw_mean, Measure::Value(0.72));
            assert_eq!(aggregate.feature_count, 1);
        }

        let apple = summary.get("apple").unwrap();
        assert_relative_eq!(apple.display_value.value().unwrap(), 0.648, epsilon = 1e-12);

        let blueberry = summary.get("blueberry").unwrap();
        assert_relative_eq!(blueberry.display_value.value().unwrap(), 0.72 - 0.25 * 0.72 / 2.0, epsilon = 1e-12);

        let alfalfa = summary.get("alfalfa").unwrap();
        assert_relative_eq!(alfalfa.display_value.value().unwrap(), 0.87, epsilon = 1e-12);

        let corn = summary.get("corn").unwrap();
        assert_relative_eq!(corn.display_value.value().unwrap(), 0.83, epsilon = 1e-12);
    }

    #[test]
    fn test_buffers_constant_across_parameters() {
        for (spring, buzz) in [(0.01, 0.01), (0.5, 0.9), (1.0, 1.0)] {
            let params = scenario(spring, buzz);
            let summary = summarize(&one_per_crop(Some(0.7)), &params, usize::MAX);
            for (crop, buffer) in [("alfalfa", ALFALFA_BUFFER), ("corn", CORN_BUFFER)] {
                let agg = summary.get(crop).unwrap();
                let delta = agg.display_value.value().unwrap() - agg.raw_mean.value().unwrap();
                assert_relative_eq!(delta, buffer, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_discount_vanishes_at_zero_effect() {
        assert_eq!(discount(0.72, 0.0), 0.72);
        // At the lowest admissible dial the correction is half a percent
        let lowest = discount(0.72, 0.01);
        assert!((0.72 - lowest) <= 0.72 * 0.005 + 1e-15);
    }

    #[test]
    fn test_rounding_happens_before_correction() {
        let store = Arc::new(FeatureStore::from_features(vec![
            GeoFeature::new("a", 0.333).with_crop("alfalfa"),
            GeoFeature::new("b", 0.334).with_crop("alfalfa"),
        ])
        .unwrap());
        let params = ScenarioParameters::default();
        let summary = summarize(&store, &params, usize::MAX);
        let alfalfa = summary.get("alfalfa").unwrap();
        assert_eq!(alfalfa.raw_mean, Measure::Value(0.33));
        assert_relative_eq!(alfalfa.display_value.value().unwrap(), 0.48, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_crop_is_undefined() {
        let store = Arc::new(FeatureStore::from_features(vec![
            GeoFeature::new("a", 0.5).with_crop("apple"),
        ])
        .unwrap());
        let summary = summarize(&store, &ScenarioParameters::default(), usize::MAX);
        let corn = summary.get("corn").unwrap();
        assert_eq!(corn.feature_count, 0);
        assert_eq!(corn.raw_mean.cause(), Some(UndefinedCause::EmptyCropSubset));
        assert_eq!(corn.display_value.cause(), Some(UndefinedCause::EmptyCropSubset));
        assert_eq!(corn.widget_text(), "Mean: N/A");
    }

    #[test]
    fn test_null_rate_poisons_crop_mean() {
        let summary = summarize(&one_per_crop(None), &ScenarioParameters::default(), usize::MAX);
        assert!(summary.iter().all(|a| !a.display_value.is_defined()));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let store = Arc::new(FeatureStore::from_features(
            (0..200)
                .map(|i| {
                    let crop = ["apple", "blueberry", "alfalfa", "corn"][i % 4];
                    GeoFeature::new(format!("f{}", i), (i % 17) as f64 / 17.0)
                        .with_pesticide_rate(Some((i % 5) as f64 / 10.0))
                        .with_crop(crop)
                })
                .collect(),
        )
        .unwrap());
        let params = scenario(0.4, 0.6);
        assert_eq!(summarize(&store, &params, 0), summarize(&store, &params, usize::MAX));
    }

    #[test]
    fn test_catalog_extension() {
        let catalog = CropCatalog::default()
            .with_crop(CropProfile::new("canola", "Canola", CorrectionPolicy::Identity))
            .unwrap();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.profiles().last().unwrap().name, "canola");

        assert!(CropCatalog::default()
            .with_crop(CropProfile::new("corn", "Corn again", CorrectionPolicy::Identity))
            .is_err());
    }

    #[test]
    fn test_catalog_config_shape() {
        let json = serde_json::to_value(CropCatalog::default()).unwrap();
        assert_eq!(json[0]["name"], "apple");
        assert_eq!(json[0]["correction"]["kind"], "vulnerability_discount");
        assert_eq!(json[0]["correction"]["dial"], "spring");
        assert_eq!(json[2]["correction"]["buffer"], 0.15);
    }
}
