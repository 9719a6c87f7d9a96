//! The model facade: parameters in, adjusted landscape and crop widgets out.
//!
//! [`PollinationModel`] is the only thing the interaction layer and the
//! renderer talk to. Writes go through [`PollinationModel::set_parameter`]
//! (`&mut self`, single writer); reads take `&self` and may come from many
//! threads at once.

use crate::adjustment::{AdjustedFeatures, AdjustmentEngine, NullRatePolicy};
use crate::crops::{CropAggregator, CropCatalog, CropSummary};
use crate::error::{ModelError, ValidationError};
use crate::landscape::{BaselineLayout, FeatureStore, ModelVariant};
use crate::params::{ChangeSet, ParameterStore, ParameterUpdate, ParameterValue, ScenarioParameters};
use crate::reactive::{NodeKind, NodeState, ReactiveCache};
use pollinate_env::BaselineSource;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Landscapes at or above this size aggregate crops on the rayon pool.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 10_000;

/// Model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub null_rate_policy: NullRatePolicy,
    pub parallel_threshold: usize,
    pub layout: BaselineLayout,
    pub crops: CropCatalog,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            null_rate_policy: NullRatePolicy::default(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            layout: BaselineLayout::default(),
            crops: CropCatalog::default(),
        }
    }
}

impl ModelConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ModelError::config(format!("{}: {}", path.display(), e)))?;
        let config: ModelConfig = serde_json::from_str(&text)
            .map_err(|e| ModelError::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        self.crops.validate()
    }
}

type Cache = ReactiveCache<AdjustedFeatures, CropSummary>;

/// Scenario engine over one immutable landscape.
#[derive(Debug)]
pub struct PollinationModel {
    store: Arc<FeatureStore>,
    params: ParameterStore,
    engine: AdjustmentEngine,
    aggregator: CropAggregator,
    cache: Arc<Cache>,
}

impl PollinationModel {
    /// Builds a model over an already-assembled feature store.
    pub fn new(store: Arc<FeatureStore>, config: &ModelConfig) -> Result<Self, ModelError> {
        config.validate()?;

        let variant = store.variant();
        let mut params = ParameterStore::new(variant.richness_domain());
        let cache: Arc<Cache> = Arc::new(ReactiveCache::new());
        params.subscribe(cache.clone());

        let null_rates = store.null_rate_count();
        if null_rates > 0 {
            tracing::warn!(
                "{} of {} features have a null pesticide rate (policy: {})",
                null_rates,
                store.len(),
                config.null_rate_policy
            );
        }
        tracing::info!(
            "Model ready: {} features from {} ({} variant)",
            store.len(),
            store.origin(),
            variant
        );

        Ok(Self {
            engine: AdjustmentEngine::new(variant, config.null_rate_policy),
            aggregator: CropAggregator::new(config.crops.clone(), config.parallel_threshold),
            store,
            params,
            cache,
        })
    }

    /// Loads the baseline from a source and builds a model over it.
    pub fn load(source: &dyn BaselineSource, config: &ModelConfig) -> Result<Self, ModelError> {
        let store = FeatureStore::load(source, &config.layout, &config.crops)?;
        Self::new(Arc::new(store), config)
    }

    /// Current parameter snapshot.
    pub fn parameters(&self) -> ScenarioParameters {
        self.params.get()
    }

    /// Sets one parameter by name.
    ///
    /// # Returns
    /// * `Ok(changes)` - Fields that changed; empty if the value was already set
    /// * `Err(ValidationError)` - Nothing was written
    pub fn set_parameter(
        &mut self,
        name: &str,
        value: impl Into<ParameterValue>,
    ) -> Result<ChangeSet, ValidationError> {
        self.params.set_parameter(name, value)
    }

    /// Applies a multi-field update atomically.
    pub fn update(&mut self, update: &ParameterUpdate) -> Result<ChangeSet, ValidationError> {
        self.params.set(update)
    }

    /// Adjusted service value for every feature.
    pub fn adjusted_features(&self) -> Result<Arc<AdjustedFeatures>, ModelError> {
        let params = self.params.get();
        self.cache
            .adjusted()
            .get_or_compute(&params, || self.engine.compute(&self.store, &params))
    }

    /// Per-crop widgets, in display order.
    ///
    /// Reads the adjusted features first; that read is a cache hit unless a
    /// parameter they depend on changed.
    pub fn crop_aggregates(&self) -> Result<Arc<CropSummary>, ModelError> {
        let params = self.params.get();
        let adjusted = self.adjusted_features()?;
        self.cache
            .crops()
            .get_or_compute(&params, || self.aggregator.aggregate(&adjusted, &params))
    }

    pub fn node_state(&self, kind: NodeKind) -> NodeState {
        self.cache.node_state(kind)
    }

    /// Times `kind` has been computed.
    pub fn computations(&self, kind: NodeKind) -> u64 {
        self.cache.computations(kind)
    }

    /// Effective parameter updates so far.
    pub fn revision(&self) -> u64 {
        self.params.revision()
    }

    pub fn feature_store(&self) -> &Arc<FeatureStore> {
        &self.store
    }

    pub fn variant(&self) -> ModelVariant {
        self.store.variant()
    }

    pub fn crop_catalog(&self) -> &CropCatalog {
        self.aggregator.catalog()
    }
}
