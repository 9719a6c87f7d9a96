//! JSON exporter for dashboard snapshots.
//!
//! Bundles scenario reports with the landscape they were run against, for
//! offline plotting or regression comparison.

use crate::error::SimError;
use crate::runner::ScenarioReport;
use pollinate_core::{ModelVariant, NullRatePolicy, PollinationModel};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete run export.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardExport {
    /// Where the baseline came from
    pub source: String,

    /// Seed of a synthetic landscape
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    pub variant: ModelVariant,

    pub null_rate_policy: NullRatePolicy,

    pub feature_count: usize,

    /// Bounding box `[min_x, min_y, max_x, max_y]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[f64; 4]>,

    /// All reports, in run order
    pub reports: Vec<ScenarioReport>,

    /// Final results
    pub passed: bool,
}

impl DashboardExport {
    /// Creates an export container for a model.
    pub fn new(model: &PollinationModel, null_rate_policy: NullRatePolicy, seed: Option<u64>) -> Self {
        let store = model.feature_store();
        Self {
            source: store.origin().to_string(),
            seed,
            variant: model.variant(),
            null_rate_policy,
            feature_count: store.len(),
            bounds: store
                .bounds()
                .map(|r| [r.min().x, r.min().y, r.max().x, r.max().y]),
            reports: Vec::new(),
            passed: true,
        }
    }

    /// Adds a report.
    pub fn add_report(&mut self, report: ScenarioReport) {
        self.passed &= report.passed;
        self.reports.push(report);
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        let write_err = |source: std::io::Error| SimError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::create(path).map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landscape::{SyntheticConfig, SyntheticLandscape};
    use crate::runner::ScenarioRunner;
    use crate::scenarios::ScenarioId;
    use pollinate_core::{BaselineLayout, CropCatalog, ModelConfig};

    #[test]
    fn test_export_round_trip_to_disk() {
        let source = SyntheticLandscape::new(2, SyntheticConfig { features: 12, ..Default::default() })
            .generate(&BaselineLayout::default(), &CropCatalog::default());
        let model = PollinationModel::load(&source, &ModelConfig::default()).unwrap();

        let mut export = DashboardExport::new(&model, NullRatePolicy::Propagate, Some(2));
        let mut runner = ScenarioRunner::new(model);
        export.add_report(runner.run(ScenarioId::Baseline).unwrap());
        export.add_report(runner.run(ScenarioId::WorstCase).unwrap());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.json");
        export.write_to_file(&path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["feature_count"], 12);
        assert_eq!(written["variant"], "simple");
        assert_eq!(written["null_rate_policy"], "propagate");
        assert_eq!(written["reports"].as_array().unwrap().len(), 2);
        assert_eq!(written["reports"][1]["scenario"], "worst_case");
        assert_eq!(written["reports"][0]["crops"][0]["label"], "Apples");
        assert_eq!(written["passed"], true);
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let source = SyntheticLandscape::new(2, SyntheticConfig { features: 4, ..Default::default() })
            .generate(&BaselineLayout::default(), &CropCatalog::default());
        let model = PollinationModel::load(&source, &ModelConfig::default()).unwrap();
        let export = DashboardExport::new(&model, NullRatePolicy::Propagate, None);

        let dir = tempfile::tempdir().unwrap();
        let err = export.write_to_file(dir.path().join("missing").join("out.json"));
        assert!(matches!(err, Err(SimError::Write { .. })));
    }
}
