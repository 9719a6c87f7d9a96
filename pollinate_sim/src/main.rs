//! Pollinate Scenario CLI
//!
//! Run preset pollination scenarios headlessly against a baseline package
//! or a synthetic landscape.

use clap::Parser;
use pollinate_core::{ModelConfig, NullRatePolicy, ParameterName, ParameterUpdate, PollinationModel};
use pollinate_env::{BaselineSource, JsonPackageSource};
use pollinate_sim::scenarios::ScenarioId;
use pollinate_sim::{
    DashboardExport, ScenarioReport, ScenarioRunner, SimError, SyntheticConfig, SyntheticLandscape,
    DEFAULT_COLOUR_BINS,
};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Pollination scenario runner
#[derive(Parser, Debug)]
#[command(name = "pollinate-sim")]
#[command(about = "Run pollination-service scenarios headlessly", long_about = None)]
struct Args {
    /// Baseline layer package (JSON); omit to use a synthetic landscape
    #[arg(long)]
    source: Option<String>,

    /// Service layer name override
    #[arg(long)]
    service_layer: Option<String>,

    /// Pesticide layer name override
    #[arg(long)]
    pesticide_layer: Option<String>,

    /// Crop-location layer name override
    #[arg(long)]
    crop_layer: Option<String>,

    /// Number of synthetic features (ignored with --source)
    #[arg(long, default_value = "400")]
    synthetic: usize,

    /// Fraction of synthetic features with a null pesticide rate
    #[arg(long, default_value = "0.0")]
    null_fraction: f64,

    /// Give the synthetic landscape ssp1/ssp5 impact columns
    #[arg(long)]
    scenario_columns: bool,

    /// Seed for the synthetic landscape
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (baseline, pessimistic_climate, pesticide_surge,
    /// vulnerable_spring, buzz_collapse, low_diversity, best_case, worst_case, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Richness override (low, medium, high)
    #[arg(long)]
    richness: Option<String>,

    /// Climate scenario override (optimistic, pessimistic)
    #[arg(long)]
    climate: Option<String>,

    /// Pesticide pressure override [0.01, 1.00]
    #[arg(long)]
    pesticide: Option<f64>,

    /// Spring vulnerability override [0.01, 1.00]
    #[arg(long)]
    spring: Option<f64>,

    /// Buzz vulnerability override [0.01, 1.00]
    #[arg(long)]
    buzz: Option<f64>,

    /// Null pesticide rate policy (propagate, zero)
    #[arg(long)]
    null_rates: Option<NullRatePolicy>,

    /// Model configuration file (JSON)
    #[arg(long)]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,

    /// Export reports and per-feature values to a JSON file
    #[arg(long)]
    export: Option<String>,
}

impl Args {
    fn overrides(&self) -> ParameterUpdate {
        let mut update = ParameterUpdate::new();
        if let Some(v) = &self.richness {
            update = update.with(ParameterName::Richness, v.as_str());
        }
        if let Some(v) = &self.climate {
            update = update.with(ParameterName::ClimateScenario, v.as_str());
        }
        for (name, value) in [
            (ParameterName::PesticidePressure, self.pesticide),
            (ParameterName::SpringVulnerability, self.spring),
            (ParameterName::BuzzVulnerability, self.buzz),
        ] {
            if let Some(v) = value {
                update = update.with(name, v);
            }
        }
        update
    }

    fn model_config(&self) -> Result<ModelConfig, SimError> {
        let mut config = match &self.config {
            Some(path) => ModelConfig::from_json_file(path)?,
            None => ModelConfig::default(),
        };
        if let Some(policy) = self.null_rates {
            config.null_rate_policy = policy;
        }
        if let Some(layer) = &self.service_layer {
            config.layout.service_layer = layer.clone();
        }
        if let Some(layer) = &self.pesticide_layer {
            config.layout.pesticide_layer = Some(layer.clone());
        }
        if let Some(layer) = &self.crop_layer {
            config.layout.crop_layer = Some(layer.clone());
        }
        Ok(config)
    }

    fn scenarios(&self) -> Result<Vec<ScenarioId>, SimError> {
        if self.scenario == "all" {
            return Ok(ScenarioId::all());
        }
        self.scenario
            .split(',')
            .map(|s| s.trim().parse().map_err(SimError::invalid_argument))
            .collect()
    }
}

fn run(args: &Args) -> Result<Vec<ScenarioReport>, SimError> {
    let config = args.model_config()?;
    let scenarios = args.scenarios()?;

    let (model, seed) = match &args.source {
        Some(path) => {
            let source = JsonPackageSource::open(path)?;
            info!("Baseline: {} (layers: {:?})", source.describe(), source.layer_names());
            (PollinationModel::load(&source, &config)?, None)
        }
        None => {
            let synthetic = SyntheticConfig {
                features: args.synthetic,
                null_fraction: args.null_fraction,
                scenario_columns: args.scenario_columns,
                ..Default::default()
            };
            synthetic.validate()?;
            let source = SyntheticLandscape::new(args.seed, synthetic).generate(&config.layout, &config.crops);
            (PollinationModel::load(&source, &config)?, Some(args.seed))
        }
    };

    let mut export = args
        .export
        .as_ref()
        .map(|_| DashboardExport::new(&model, config.null_rate_policy, seed));

    let mut runner = ScenarioRunner::new(model).with_overrides(args.overrides());
    if export.is_some() {
        runner = runner.with_feature_capture(DEFAULT_COLOUR_BINS);
    }

    let mut reports = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let report = runner.run(scenario)?;

        if !args.json {
            if report.passed {
                info!("✓ {} ({})", scenario.name(), report.parameters);
                for widget in &report.crops {
                    info!("    {:<12} {} ({} features)", widget.label, widget.text, widget.feature_count);
                }
                info!(
                    "    landscape: mean {} | {} undefined | {} above / {} below display range",
                    report.stats.mean,
                    report.stats.undefined,
                    report.stats.above_display_range,
                    report.stats.below_display_range
                );
            } else {
                error!(
                    "✗ {} FAILED: {}",
                    scenario.name(),
                    report.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }

        if let Some(export) = export.as_mut() {
            export.add_report(report.clone());
        }
        reports.push(report);
    }

    if let (Some(export), Some(path)) = (&export, &args.export) {
        export.write_to_file(path)?;
        info!("Exported {} reports to {}", export.reports.len(), path);
    }

    Ok(reports)
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("Pollinate Scenario Runner v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let reports = match run(&args) {
        Ok(reports) => reports,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let total = reports.len();
    let failed_count = reports.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "results": reports,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!("Failed to serialize results: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} scenarios passed!", total);
        } else {
            error!("❌ {}/{} scenarios failed!", failed_count, total);
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
