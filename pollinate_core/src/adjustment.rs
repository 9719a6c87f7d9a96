//! The adjustment engine: baseline service × scenario factors, per feature.
//!
//! Two formulas exist, chosen by dataset shape:
//!
//! ```text
//! simple:           base × richness × climate            × (1 − rate × pressure)
//! scenario columns: base × richness × (1 − impact × 0.5) × (1 − rate × pressure)
//! ```
//!
//! Each is an [`AdjustmentStrategy`]; the engine only knows the trait.
//! Results are never clamped: values outside `[0, 1]` are the renderer's
//! problem.

use crate::landscape::{FeatureStore, GeoFeature, ModelVariant};
use crate::measure::{Measure, UndefinedCause};
use crate::params::{ClimateScenario, Richness, ScenarioParameters};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Weight applied to the SSP impact columns.
pub const CLIMATE_IMPACT_WEIGHT: f64 = 0.5;

/// What to do with a feature whose pesticide rate is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullRatePolicy {
    /// The adjusted value is undefined (and so is any crop mean it feeds)
    #[default]
    Propagate,
    /// Substitute a rate of 0 before multiplying
    TreatAsZero,
}

impl NullRatePolicy {
    pub fn name(&self) -> &'static str {
        match self {
            NullRatePolicy::Propagate => "propagate",
            NullRatePolicy::TreatAsZero => "zero",
        }
    }
}

impl std::str::FromStr for NullRatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "propagate" | "nan" | "undefined" => Ok(NullRatePolicy::Propagate),
            "zero" | "treat_as_zero" | "fill" => Ok(NullRatePolicy::TreatAsZero),
            _ => Err(format!("Unknown null-rate policy: {}", s)),
        }
    }
}

impl fmt::Display for NullRatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// STRATEGIES
// =============================================================================

/// One adjustment formula.
///
/// Both formulas share the shape `base × richness × climate × pesticide`;
/// implementations supply the richness and climate terms and inherit the
/// rest.
pub trait AdjustmentStrategy: Send + Sync + fmt::Debug {
    /// Dataset shape this strategy serves.
    fn variant(&self) -> ModelVariant;

    /// Richness multiplier, or `None` if the level is not calibrated.
    fn richness_factor(&self, richness: Richness) -> Option<f64>;

    /// Climate multiplier for one feature.
    fn climate_term(&self, feature: &GeoFeature, climate: ClimateScenario) -> Measure;

    /// Adjusted service value for one feature.
    fn adjust(
        &self,
        feature: &GeoFeature,
        params: &ScenarioParameters,
        policy: NullRatePolicy,
    ) -> Measure {
        let richness = match self.richness_factor(params.richness) {
            Some(factor) => Measure::Value(factor),
            None => Measure::Undefined(UndefinedCause::UnsupportedRichness),
        };

        Measure::from_f64(feature.base_service)
            .times(richness)
            .times(self.climate_term(feature, params.climate))
            .times(pesticide_term(feature, params.pesticide_pressure.get(), policy))
    }
}

/// `1 − rate × pressure`, honouring the null-rate policy.
pub fn pesticide_term(feature: &GeoFeature, pressure: f64, policy: NullRatePolicy) -> Measure {
    match (feature.pesticide_rate, policy) {
        (Some(rate), _) => Measure::from_f64(1.0 - rate * pressure),
        (None, NullRatePolicy::TreatAsZero) => Measure::Value(1.0),
        (None, NullRatePolicy::Propagate) => Measure::Undefined(UndefinedCause::NullPesticideRate),
    }
}

/// Fixed richness and climate multipliers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleStrategy;

impl SimpleStrategy {
    pub fn climate_factor(climate: ClimateScenario) -> f64 {
        match climate {
            ClimateScenario::Optimistic => 1.0,
            ClimateScenario::Pessimistic => 0.75,
        }
    }
}

impl AdjustmentStrategy for SimpleStrategy {
    fn variant(&self) -> ModelVariant {
        ModelVariant::Simple
    }

    fn richness_factor(&self, richness: Richness) -> Option<f64> {
        Some(match richness {
            Richness::Low => 0.6,
            Richness::Medium => 0.75,
            Richness::High => 1.0,
        })
    }

    fn climate_term(&self, _feature: &GeoFeature, climate: ClimateScenario) -> Measure {
        Measure::Value(Self::climate_factor(climate))
    }
}

/// Per-feature SSP impact columns in place of a climate multiplier.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScenarioColumnStrategy;

impl AdjustmentStrategy for ScenarioColumnStrategy {
    fn variant(&self) -> ModelVariant {
        ModelVariant::ScenarioColumns
    }

    fn richness_factor(&self, richness: Richness) -> Option<f64> {
        match richness {
            Richness::Low => Some(0.75),
            Richness::High => Some(1.0),
            Richness::Medium => None,
        }
    }

    fn climate_term(&self, feature: &GeoFeature, climate: ClimateScenario) -> Measure {
        let Some(impact) = feature.climate_impact else {
            return Measure::Undefined(UndefinedCause::MissingClimateImpact);
        };
        let column = match climate {
            ClimateScenario::Optimistic => impact.ssp1,
            ClimateScenario::Pessimistic => impact.ssp5,
        };
        Measure::from_f64(1.0 - column * CLIMATE_IMPACT_WEIGHT)
    }
}

/// Strategy for a dataset shape.
pub fn strategy_for(variant: ModelVariant) -> Arc<dyn AdjustmentStrategy> {
    match variant {
        ModelVariant::Simple => Arc::new(SimpleStrategy),
        ModelVariant::ScenarioColumns => Arc::new(ScenarioColumnStrategy),
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Derives adjusted service values for a whole feature store.
#[derive(Debug, Clone)]
pub struct AdjustmentEngine {
    strategy: Arc<dyn AdjustmentStrategy>,
    null_policy: NullRatePolicy,
}

impl AdjustmentEngine {
    /// Engine for a dataset shape.
    pub fn new(variant: ModelVariant, null_policy: NullRatePolicy) -> Self {
        Self::with_strategy(strategy_for(variant), null_policy)
    }

    /// Engine with an explicit strategy.
    pub fn with_strategy(strategy: Arc<dyn AdjustmentStrategy>, null_policy: NullRatePolicy) -> Self {
        Self {
            strategy,
            null_policy,
        }
    }

    pub fn variant(&self) -> ModelVariant {
        self.strategy.variant()
    }

    pub fn null_policy(&self) -> NullRatePolicy {
        self.null_policy
    }

    /// Computes the full adjusted collection. Pure in both inputs.
    pub fn compute(&self, store: &Arc<FeatureStore>, params: &ScenarioParameters) -> AdjustedFeatures {
        let values = store
            .iter()
            .map(|feature| self.strategy.adjust(feature, params, self.null_policy))
            .collect();

        AdjustedFeatures {
            store: Arc::clone(store),
            values,
            parameters: *params,
            variant: self.strategy.variant(),
        }
    }
}

/// Adjusted service values for every feature, in store order.
#[derive(Debug, Clone)]
pub struct AdjustedFeatures {
    store: Arc<FeatureStore>,
    values: Vec<Measure>,
    parameters: ScenarioParameters,
    variant: ModelVariant,
}

impl AdjustedFeatures {
    /// Features paired with their adjusted values.
    pub fn iter(&self) -> impl Iterator<Item = (&GeoFeature, Measure)> + '_ {
        self.store.iter().zip(self.values.iter().copied())
    }

    /// Adjusted values, aligned with [`FeatureStore::features`].
    pub fn values(&self) -> &[Measure] {
        &self.values
    }

    /// Adjusted value of one feature.
    pub fn value(&self, id: &str) -> Option<Measure> {
        self.store.position(id).map(|i| self.values[i])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn store(&self) -> &Arc<FeatureStore> {
        &self.store
    }

    /// Parameter snapshot the values were computed from.
    pub fn parameters(&self) -> &ScenarioParameters {
        &self.parameters
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    /// Summary statistics over the collection.
    pub fn stats(&self) -> LandscapeStats {
        LandscapeStats::from_measures(self.values.iter().copied())
    }
}

/// Distribution of adjusted values, for headless reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandscapeStats {
    pub total: usize,
    pub defined: usize,
    pub undefined: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Measure,
    /// Defined values above the display range (renderer clips to 1)
    pub above_display_range: usize,
    /// Defined values below the display range (renderer clips to 0)
    pub below_display_range: usize,
}

impl LandscapeStats {
    pub fn from_measures(measures: impl IntoIterator<Item = Measure>) -> Self {
        let mut stats = LandscapeStats {
            total: 0,
            defined: 0,
            undefined: 0,
            min: None,
            max: None,
            mean: Measure::Undefined(UndefinedCause::NoDefinedValues),
            above_display_range: 0,
            below_display_range: 0,
        };
        let mut sum = 0.0;

        for measure in measures {
            stats.total += 1;
            let Some(v) = measure.value() else {
                stats.undefined += 1;
                continue;
            };
            stats.defined += 1;
            sum += v;
            stats.min = Some(stats.min.map_or(v, |m| m.min(v)));
            stats.max = Some(stats.max.map_or(v, |m| m.max(v)));
            if v > 1.0 {
                stats.above_display_range += 1;
            } else if v < 0.0 {
                stats.below_display_range += 1;
            }
        }

        // Mean over defined values only; undefined features are counted separately
        if stats.defined > 0 {
            stats.mean = Measure::from_f64(sum / stats.defined as f64);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterStore, RichnessDomain};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn params(richness: &str, climate: &str, pressure: f64) -> ScenarioParameters {
        let mut store = ParameterStore::new(RichnessDomain::Full);
        store.set_parameter("richness", richness).unwrap();
        store.set_parameter("climateScenario", climate).unwrap();
        store.set_parameter("pesticidePressure", pressure).unwrap();
        store.get()
    }

    #[test]
    fn test_simple_formula_example() {
        let store = Arc::new(FeatureStore::from_features(vec![
            GeoFeature::new("a", 0.8).with_pesticide_rate(Some(0.2)),
        ])
        .unwrap());
        let engine = AdjustmentEngine::new(ModelVariant::Simple, NullRatePolicy::Propagate);

        let adjusted = engine.compute(&store, &params("high", "optimistic", 0.5));
        assert_relative_eq!(adjusted.value("a").unwrap().value().unwrap(), 0.72, epsilon = 1e-12);
    }

    #[test]
    fn test_simple_factors() {
        let feature = GeoFeature::new("a", 0.5);
        let strategy = SimpleStrategy;
        let low = strategy.adjust(&feature, &params("low", "pessimistic", 0.3), NullRatePolicy::Propagate);
        assert_relative_eq!(low.value().unwrap(), 0.5 * 0.6 * 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_scenario_column_formula() {
        let feature = GeoFeature::new("a", 0.8)
            .with_pesticide_rate(Some(0.5))
            .with_climate_impact(0.2, 0.6);
        let strategy = ScenarioColumnStrategy;

        let optimistic = strategy.adjust(&feature, &params("low", "optimistic", 0.4), NullRatePolicy::Propagate);
        assert_relative_eq!(
            optimistic.value().unwrap(),
            0.8 * 0.75 * (1.0 - 0.2 * 0.5) * (1.0 - 0.5 * 0.4),
            epsilon = 1e-12
        );

        let pessimistic = strategy.adjust(&feature, &params("high", "pessimistic", 0.4), NullRatePolicy::Propagate);
        assert_relative_eq!(
            pessimistic.value().unwrap(),
            0.8 * 1.0 * (1.0 - 0.6 * 0.5) * (1.0 - 0.5 * 0.4),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_scenario_column_rejects_medium_and_missing_impact() {
        let strategy = ScenarioColumnStrategy;
        let with_impact = GeoFeature::new("a", 0.8).with_climate_impact(0.1, 0.2);
        let medium = strategy.adjust(&with_impact, &params("medium", "optimistic", 0.4), NullRatePolicy::Propagate);
        assert_eq!(medium.cause(), Some(UndefinedCause::UnsupportedRichness));

        let bare = GeoFeature::new("b", 0.8);
        let missing = strategy.adjust(&bare, &params("high", "optimistic", 0.4), NullRatePolicy::Propagate);
        assert_eq!(missing.cause(), Some(UndefinedCause::MissingClimateImpact));
    }

    #[test]
    fn test_null_rate_policies() {
        let feature = GeoFeature::new("a", 0.8).with_pesticide_rate(None);
        let p = params("high", "optimistic", 0.9);

        let propagated = SimpleStrategy.adjust(&feature, &p, NullRatePolicy::Propagate);
        assert_eq!(propagated.cause(), Some(UndefinedCause::NullPesticideRate));

        let zeroed = SimpleStrategy.adjust(&feature, &p, NullRatePolicy::TreatAsZero);
        assert_eq!(zeroed, Measure::Value(0.8));
    }

    #[test]
    fn test_no_clamping() {
        let feature = GeoFeature::new("hot", 1.4).with_pesticide_rate(Some(-0.5));
        let value = SimpleStrategy.adjust(&feature, &params("high", "optimistic", 1.0), NullRatePolicy::Propagate);
        assert!(value.value().unwrap() > 1.0);
    }

    #[test]
    fn test_compute_is_idempotent() {
        let store = Arc::new(FeatureStore::from_features(vec![
            GeoFeature::new("a", 0.31).with_pesticide_rate(Some(0.17)),
            GeoFeature::new("b", 0.93).with_pesticide_rate(Some(0.66)),
        ])
        .unwrap());
        let engine = AdjustmentEngine::new(ModelVariant::Simple, NullRatePolicy::Propagate);
        let p = params("medium", "pessimistic", 0.37);

        let first = engine.compute(&store, &p);
        let second = engine.compute(&store, &p);
        let bits = |a: &AdjustedFeatures| -> Vec<u64> {
            a.values().iter().map(|m| m.value().unwrap().to_bits()).collect()
        };
        assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn test_landscape_stats() {
        let stats = LandscapeStats::from_measures([
            Measure::Value(0.2),
            Measure::Value(1.2),
            Measure::Value(-0.1),
            Measure::Undefined(UndefinedCause::NullPesticideRate),
        ]);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.defined, 3);
        assert_eq!(stats.undefined, 1);
        assert_eq!(stats.min, Some(-0.1));
        assert_eq!(stats.max, Some(1.2));
        assert_eq!(stats.above_display_range, 1);
        assert_eq!(stats.below_display_range, 1);
        assert_relative_eq!(stats.mean.value().unwrap(), 1.3 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_landscape_stats_without_defined_values() {
        let stats = LandscapeStats::from_measures([
            Measure::Undefined(UndefinedCause::NullPesticideRate),
            Measure::Undefined(UndefinedCause::NullPesticideRate),
        ]);
        assert_eq!(stats.undefined, 2);
        assert_eq!(stats.min, None);
        assert_eq!(stats.mean.cause(), Some(UndefinedCause::NoDefinedValues));

        let empty = LandscapeStats::from_measures(std::iter::empty());
        assert_eq!(empty.total, 0);
        assert_eq!(empty.mean.cause(), Some(UndefinedCause::NoDefinedValues));
    }

    fn richness_strategy() -> impl Strategy<Value = Richness> {
        prop_oneof![Just(Richness::Low), Just(Richness::Medium), Just(Richness::High)]
    }

    fn climate_strategy() -> impl Strategy<Value = ClimateScenario> {
        prop_oneof![Just(ClimateScenario::Optimistic), Just(ClimateScenario::Pessimistic)]
    }

    proptest! {
        #[test]
        fn prop_unit_feature_equals_factor_product(
            richness in richness_strategy(),
            climate in climate_strategy(),
            pressure in 0.01f64..=1.0,
        ) {
            let p = params(richness.name(), climate.name(), pressure);
            let feature = GeoFeature::new("unit", 1.0).with_pesticide_rate(Some(0.0));
            let value = SimpleStrategy.adjust(&feature, &p, NullRatePolicy::Propagate);

            let expected = SimpleStrategy.richness_factor(richness).unwrap()
                * SimpleStrategy::climate_factor(climate);
            prop_assert_eq!(value, Measure::Value(expected));
        }

        #[test]
        fn prop_pressure_never_increases_service(
            base in 0.0f64..2.0,
            rate in 0.001f64..1.0,
            low in 0.01f64..=1.0,
            high in 0.01f64..=1.0,
            richness in richness_strategy(),
            climate in climate_strategy(),
        ) {
            let (low, high) = if low <= high { (low, high) } else { (high, low) };
            let feature = GeoFeature::new("f", base).with_pesticide_rate(Some(rate));

            let at_low = SimpleStrategy.adjust(&feature, &params(richness.name(), climate.name(), low), NullRatePolicy::Propagate);
            let at_high = SimpleStrategy.adjust(&feature, &params(richness.name(), climate.name(), high), NullRatePolicy::Propagate);
            prop_assert!(at_high.value().unwrap() <= at_low.value().unwrap());
        }
    }
}
