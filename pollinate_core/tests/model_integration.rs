//! End-to-end checks of the model facade over an in-memory baseline.

use approx::assert_relative_eq;
use pollinate_core::{
    ModelConfig, ModelError, ModelVariant, NodeKind, NodeState, NullRatePolicy, PollinationModel,
    UndefinedCause, ValidationError,
};
use pollinate_env::{BaselineLayer, LayerFeature, MemorySource};
use serde_json::Value;
use std::sync::Arc;

const CROPS: [&str; 4] = ["apple", "blueberry", "alfalfa", "corn"];

/// One feature per crop, base 0.8, rate 0.2, split across the three layers.
fn four_crop_source() -> MemorySource {
    let services = CROPS
        .iter()
        .map(|crop| LayerFeature::new(*crop).with_property("sum", 0.8))
        .collect();
    let pesticides = CROPS
        .iter()
        .map(|crop| LayerFeature::new(*crop).with_property("kgPerArea", 0.2))
        .collect();
    let locations = CROPS
        .iter()
        .map(|crop| {
            CROPS.iter().fold(LayerFeature::new(*crop), |feature, column| {
                feature.with_property(*column, column == crop)
            })
        })
        .collect();

    MemorySource::new()
        .with_layer(BaselineLayer::new("baseServices", services))
        .with_layer(BaselineLayer::new("basePesticides", pesticides))
        .with_layer(BaselineLayer::new("cropLocations", locations))
}

fn scenario_model() -> PollinationModel {
    let mut model = PollinationModel::load(&four_crop_source(), &ModelConfig::default()).unwrap();
    model.set_parameter("richness", "high").unwrap();
    model.set_parameter("climateScenario", "optimistic").unwrap();
    model.set_parameter("pesticidePressure", 0.5).unwrap();
    model.set_parameter("springVulnerability", 0.2).unwrap();
    model
}

#[test]
fn test_scenario_example() {
    let model = scenario_model();
    assert_eq!(model.variant(), ModelVariant::Simple);

    let adjusted = model.adjusted_features().unwrap();
    assert_eq!(adjusted.len(), 4);
    for (_, value) in adjusted.iter() {
        assert_relative_eq!(value.value().unwrap(), 0.72, epsilon = 1e-12);
    }

    let crops = model.crop_aggregates().unwrap();
    let labels: Vec<&str> = crops.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["Apples", "Blueberries", "Alfalfa", "Corn"]);

    let apple = crops.get("apple").unwrap();
    assert_relative_eq!(apple.display_value.value().unwrap(), 0.648, epsilon = 1e-12);
    assert_eq!(apple.widget_text(), "Mean: 0.648");

    let alfalfa = crops.get("alfalfa").unwrap();
    assert_relative_eq!(alfalfa.display_value.value().unwrap(), 0.87, epsilon = 1e-12);
    assert_eq!(alfalfa.widget_text(), "Mean: 0.87");
}

#[test]
fn test_repeat_reads_do_not_recompute() {
    let model = scenario_model();
    let first = model.crop_aggregates().unwrap();
    let second = model.crop_aggregates().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(model.computations(NodeKind::AdjustedFeatures), 1);
    assert_eq!(model.computations(NodeKind::CropSummary), 1);
}

#[test]
fn test_spring_change_only_stales_crops() {
    let mut model = scenario_model();
    let before = model.adjusted_features().unwrap();
    model.crop_aggregates().unwrap();

    model.set_parameter("springVulnerability", 0.9).unwrap();
    assert_eq!(model.node_state(NodeKind::AdjustedFeatures), NodeState::Clean);
    assert_eq!(model.node_state(NodeKind::CropSummary), NodeState::Stale);

    let crops = model.crop_aggregates().unwrap();
    assert!(Arc::ptr_eq(&before, &model.adjusted_features().unwrap()));
    assert_eq!(model.computations(NodeKind::AdjustedFeatures), 1);
    assert_eq!(model.computations(NodeKind::CropSummary), 2);

    let apple = crops.get("apple").unwrap();
    assert_relative_eq!(apple.display_value.value().unwrap(), 0.72 - 0.9 * 0.72 / 2.0, epsilon = 1e-12);
}

#[test]
fn test_pressure_change_stales_both() {
    let mut model = scenario_model();
    model.crop_aggregates().unwrap();

    model.set_parameter("pesticidePressure", 0.1).unwrap();
    assert_eq!(model.node_state(NodeKind::AdjustedFeatures), NodeState::Stale);
    assert_eq!(model.node_state(NodeKind::CropSummary), NodeState::Stale);

    let crops = model.crop_aggregates().unwrap();
    assert_eq!(model.computations(NodeKind::AdjustedFeatures), 2);
    assert_relative_eq!(crops.get("corn").unwrap().raw_mean.value().unwrap(), 0.78, epsilon = 1e-12);
}

#[test]
fn test_same_value_keeps_cache() {
    let mut model = scenario_model();
    model.crop_aggregates().unwrap();
    let revision = model.revision();

    model.set_parameter("pesticidePressure", 0.5).unwrap();
    assert_eq!(model.revision(), revision);
    model.crop_aggregates().unwrap();
    assert_eq!(model.computations(NodeKind::CropSummary), 1);
}

#[test]
fn test_out_of_range_is_rejected_and_retained() {
    let mut model = scenario_model();
    model.crop_aggregates().unwrap();

    let err = model.set_parameter("pesticidePressure", 1.5).unwrap_err();
    assert!(matches!(err, ValidationError::OutOfRange { .. }));
    assert_eq!(model.parameters().pesticide_pressure.get(), 0.5);
    assert_eq!(model.node_state(NodeKind::CropSummary), NodeState::Clean);

    assert!(matches!(
        model.set_parameter("richness", "abundant"),
        Err(ValidationError::NotInSet { .. })
    ));
    assert!(matches!(
        model.set_parameter("climateScenario", 0.5),
        Err(ValidationError::WrongKind { .. })
    ));
    assert!(matches!(
        model.set_parameter("humidity", 0.5),
        Err(ValidationError::UnknownParameter(_))
    ));
}

#[test]
fn test_concurrent_readers_share_result() {
    let model = scenario_model();

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..6).map(|_| s.spawn(|| model.crop_aggregates().unwrap())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(model.computations(NodeKind::CropSummary), 1);
    assert_eq!(model.computations(NodeKind::AdjustedFeatures), 1);
    assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[test]
fn test_null_rate_policies() {
    let source = four_crop_source().with_layer(BaselineLayer::new(
        "basePesticides",
        CROPS
            .iter()
            .map(|crop| {
                let rate = if *crop == "corn" { Value::Null } else { Value::from(0.2) };
                LayerFeature::new(*crop).with_property("kgPerArea", rate)
            })
            .collect(),
    ));

    let propagate = PollinationModel::load(&source, &ModelConfig::default()).unwrap();
    let corn = propagate.crop_aggregates().unwrap().get("corn").cloned().unwrap();
    assert_eq!(corn.display_value.cause(), Some(UndefinedCause::NullPesticideRate));
    assert_eq!(corn.widget_text(), "Mean: N/A");
    assert!(propagate.crop_aggregates().unwrap().get("apple").unwrap().display_value.is_defined());

    let config = ModelConfig {
        null_rate_policy: NullRatePolicy::TreatAsZero,
        ..ModelConfig::default()
    };
    let zeroed = PollinationModel::load(&source, &config).unwrap();
    let corn = zeroed.crop_aggregates().unwrap().get("corn").cloned().unwrap();
    // 0.8 × 1.0 × 1.0 × 1.0, rounded, plus the corn buffer
    assert_relative_eq!(corn.display_value.value().unwrap(), 0.91, epsilon = 1e-12);
}

#[test]
fn test_scenario_columns_restrict_richness() {
    let source = MemorySource::new().with_layer(BaselineLayer::new(
        "baseServices",
        vec![LayerFeature::new("f")
            .with_property("sum", 0.8)
            .with_property("kgPerArea", 0.2)
            .with_property("ssp1", 0.2)
            .with_property("ssp5", 0.6)
            .with_property("apple", true)
            .with_property("blueberry", false)
            .with_property("alfalfa", false)
            .with_property("corn", false)],
    ));
    let mut model = PollinationModel::load(&source, &ModelConfig::default()).unwrap();
    assert_eq!(model.variant(), ModelVariant::ScenarioColumns);

    assert!(model.set_parameter("richness", "medium").is_err());
    model.set_parameter("richness", "low").unwrap();
    model.set_parameter("climateScenario", "pessimistic").unwrap();

    let value = model.adjusted_features().unwrap().value("f").unwrap().value().unwrap();
    // pressure stays at its 0.25 default
    assert_relative_eq!(value, 0.8 * 0.75 * (1.0 - 0.6 * 0.5) * (1.0 - 0.2 * 0.25), epsilon = 1e-12);
}

#[test]
fn test_missing_layer_is_fatal() {
    let source = MemorySource::new();
    let err = PollinationModel::load(&source, &ModelConfig::default()).unwrap_err();
    assert!(matches!(err, ModelError::Load(_)));
}
