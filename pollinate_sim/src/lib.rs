//! Pollinate Headless Scenario Harness
//!
//! Drives the pollination engine without a dashboard: build (or load) a
//! baseline landscape, push preset scenarios through the parameter
//! boundary, and collect what the dashboard would have shown.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐     ┌──────────────────────────────────┐
//! │ SyntheticLandscape │────►│ PollinationModel                 │
//! │ (seeded ChaCha8)   │     │  ParameterStore ─► ReactiveCache │
//! └────────────────────┘     │  adjusted_features()             │
//! ┌────────────────────┐     │  crop_aggregates()               │
//! │ JsonPackageSource  │────►│                                  │
//! └────────────────────┘     └───────────────┬──────────────────┘
//!                                            │
//!                             ┌──────────────▼──────────────┐
//!                             │ ScenarioRunner ─► Reports   │
//!                             │ DashboardExport (JSON)      │
//!                             └─────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use pollinate_sim::{ScenarioRunner, SyntheticConfig, SyntheticLandscape};
//! use pollinate_sim::scenarios::ScenarioId;
//!
//! let source = SyntheticLandscape::new(42, SyntheticConfig::default())
//!     .generate(&config.layout, &config.crops);
//! let model = PollinationModel::load(&source, &config)?;
//! let report = ScenarioRunner::new(model).run(ScenarioId::WorstCase)?;
//! ```

mod error;
mod exporter;
mod landscape;
mod runner;
pub mod scenarios;

pub use error::SimError;
pub use exporter::DashboardExport;
pub use landscape::{SyntheticConfig, SyntheticLandscape};
pub use runner::{CropWidget, FeatureValue, ScenarioReport, ScenarioRunner, DEFAULT_COLOUR_BINS};
