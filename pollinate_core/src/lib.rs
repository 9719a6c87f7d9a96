//! Pollinate Core - Reactive Pollination-Service Scenario Engine
//!
//! Given an immutable baseline landscape, this library answers "what if"
//! questions about pollination services:
//! 1. **Parameters**: five validated scenario dials ([`ParameterStore`])
//! 2. **Adjustment**: per-feature service under a scenario, via a pluggable
//!    [`AdjustmentStrategy`] chosen by dataset shape
//! 3. **Crops**: per-crop means with catalog-driven display corrections
//!
//! Derived outputs are cached in a pull-based graph ([`reactive`]) and only
//! recomputed when a parameter they depend on actually changes.
//!
//! # Example
//!
//! ```ignore
//! use pollinate_core::{ModelConfig, PollinationModel};
//! use pollinate_env::JsonPackageSource;
//!
//! let source = JsonPackageSource::open("data/landscape.json")?;
//! let mut model = PollinationModel::load(&source, &ModelConfig::default())?;
//!
//! model.set_parameter("springVulnerability", 0.2)?;
//! for widget in model.crop_aggregates()?.iter() {
//!     println!("{}: {}", widget.label, widget.widget_text());
//! }
//! ```

pub mod adjustment;
pub mod crops;
pub mod display;
pub mod error;
pub mod landscape;
pub mod measure;
pub mod model;
pub mod params;
pub mod reactive;

// Re-export key types for convenience
pub use adjustment::{
    AdjustedFeatures, AdjustmentEngine, AdjustmentStrategy, LandscapeStats, NullRatePolicy,
};
pub use crops::{CorrectionPolicy, CropAggregate, CropAggregator, CropCatalog, CropProfile, CropSummary};
pub use error::{ModelError, ValidationError};
pub use landscape::{BaselineLayout, FeatureStore, GeoFeature, ModelVariant};
pub use measure::{Measure, UndefinedCause};
pub use model::{ModelConfig, PollinationModel};
pub use params::{
    ChangeSet, ClimateScenario, ParameterName, ParameterStore, ParameterUpdate, ParameterValue,
    Richness, RichnessDomain, ScenarioParameters,
};
pub use reactive::{NodeKind, NodeState};
