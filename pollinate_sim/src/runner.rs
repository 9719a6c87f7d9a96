//! Scenario runner - drives presets through the model's parameter boundary.

use crate::error::SimError;
use crate::scenarios::ScenarioId;
use pollinate_core::display::{clip_unit, colour_bin};
use pollinate_core::{
    LandscapeStats, Measure, NodeKind, ParameterUpdate, PollinationModel, ScenarioParameters,
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Colour bins used when capturing per-feature output.
pub const DEFAULT_COLOUR_BINS: usize = 10;

/// One crop widget as the dashboard would show it.
#[derive(Debug, Clone, Serialize)]
pub struct CropWidget {
    pub crop: String,
    pub label: String,
    pub feature_count: usize,
    pub raw_mean: Measure,
    pub value: Measure,
    pub text: String,
}

/// One choropleth cell.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureValue {
    pub id: String,
    pub adjusted: Measure,
    /// Value after clipping to the display range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin: Option<usize>,
}

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Scenario that was run
    pub scenario: String,

    pub description: String,

    /// Parameters in force when the outputs were read
    pub parameters: ScenarioParameters,

    /// Parameter revision after the update
    pub revision: u64,

    pub stats: LandscapeStats,

    pub crops: Vec<CropWidget>,

    /// Node recomputations caused by this scenario
    pub adjusted_recomputations: u64,
    pub crop_recomputations: u64,

    /// Per-feature output, when capture is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<FeatureValue>>,

    /// Whether the model behaved as expected
    pub passed: bool,

    /// Failure message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Runs scenarios against one model.
pub struct ScenarioRunner {
    model: PollinationModel,

    /// Applied on top of every preset
    overrides: ParameterUpdate,

    /// Colour bins for per-feature capture; `None` disables capture
    capture_bins: Option<usize>,
}

impl ScenarioRunner {
    pub fn new(model: PollinationModel) -> Self {
        Self {
            model,
            overrides: ParameterUpdate::new(),
            capture_bins: None,
        }
    }

    /// Sets parameter overrides applied after each preset.
    pub fn with_overrides(mut self, overrides: ParameterUpdate) -> Self {
        self.overrides = overrides;
        self
    }

    /// Captures per-feature values into each report.
    pub fn with_feature_capture(mut self, bins: usize) -> Self {
        self.capture_bins = Some(bins);
        self
    }

    pub fn model(&self) -> &PollinationModel {
        &self.model
    }

    /// Runs a preset.
    ///
    /// A rejected update fails the report; only a failed model read is an
    /// error.
    pub fn run(&mut self, scenario: ScenarioId) -> Result<ScenarioReport, SimError> {
        self.run_update(scenario.name(), scenario.description(), &scenario.update())
    }

    /// Applies an update (plus overrides) and reads both outputs.
    pub fn run_update(
        &mut self,
        name: &str,
        description: &str,
        update: &ParameterUpdate,
    ) -> Result<ScenarioReport, SimError> {
        let adjusted_before = self.model.computations(NodeKind::AdjustedFeatures);
        let crops_before = self.model.computations(NodeKind::CropSummary);

        let mut failure = None;
        for step in [update, &self.overrides] {
            if step.is_empty() {
                continue;
            }
            if let Err(e) = self.model.update(step) {
                warn!("Scenario {} rejected: {}", name, e);
                failure = Some(e.to_string());
                break;
            }
        }

        debug!("Running {} with {}", name, self.model.parameters());
        let adjusted = self.model.adjusted_features()?;
        let summary = self.model.crop_aggregates()?;

        let adjusted_recomputations = self.model.computations(NodeKind::AdjustedFeatures) - adjusted_before;
        let crop_recomputations = self.model.computations(NodeKind::CropSummary) - crops_before;

        // A second read must be served from the cache
        if failure.is_none() {
            let again = self.model.crop_aggregates()?;
            if !std::sync::Arc::ptr_eq(&again, &summary)
                || self.model.computations(NodeKind::CropSummary) != crops_before + crop_recomputations
            {
                failure = Some("repeat read recomputed crop summary".to_string());
            }
        }
        if failure.is_none() && summary.len() != self.model.crop_catalog().len() {
            failure = Some(format!(
                "expected {} crop widgets, got {}",
                self.model.crop_catalog().len(),
                summary.len()
            ));
        }

        let stats = adjusted.stats();
        if stats.undefined > 0 {
            info!("{}: {} of {} features undefined", name, stats.undefined, stats.total);
        }

        let crops = summary
            .iter()
            .map(|aggregate| CropWidget {
                crop: aggregate.crop.clone(),
                label: aggregate.label.clone(),
                feature_count: aggregate.feature_count,
                raw_mean: aggregate.raw_mean,
                value: aggregate.display_value,
                text: aggregate.widget_text(),
            })
            .collect();

        let features = self.capture_bins.map(|bins| {
            adjusted
                .iter()
                .map(|(feature, value)| FeatureValue {
                    id: feature.id.clone(),
                    adjusted: value,
                    display: value.value().map(clip_unit),
                    bin: colour_bin(value, bins),
                })
                .collect()
        });

        Ok(ScenarioReport {
            scenario: name.to_string(),
            description: description.to_string(),
            parameters: self.model.parameters(),
            revision: self.model.revision(),
            stats,
            crops,
            adjusted_recomputations,
            crop_recomputations,
            features,
            passed: failure.is_none(),
            failure_reason: failure,
        })
    }
}
