//! Preset "what if" scenarios.
//!
//! Each preset is a complete parameter snapshot, so presets can run in any
//! order against the same model.

use pollinate_core::{ParameterName, ParameterUpdate, ScenarioParameters};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Default dials: high richness, optimistic climate, 0.25 everywhere
    Baseline,

    /// SSP5 climate pathway
    PessimisticClimate,

    /// Pesticide pressure near its maximum
    PesticideSurge,

    /// Spring-active bees highly vulnerable (apples suffer)
    VulnerableSpring,

    /// Buzz pollinators fully vulnerable (blueberries suffer)
    BuzzCollapse,

    /// Low bee species richness
    LowDiversity,

    /// Every dial at its most favourable value
    BestCase,

    /// Every dial at its least favourable value
    WorstCase,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::PessimisticClimate,
            ScenarioId::PesticideSurge,
            ScenarioId::VulnerableSpring,
            ScenarioId::BuzzCollapse,
            ScenarioId::LowDiversity,
            ScenarioId::BestCase,
            ScenarioId::WorstCase,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::PessimisticClimate => "pessimistic_climate",
            ScenarioId::PesticideSurge => "pesticide_surge",
            ScenarioId::VulnerableSpring => "vulnerable_spring",
            ScenarioId::BuzzCollapse => "buzz_collapse",
            ScenarioId::LowDiversity => "low_diversity",
            ScenarioId::BestCase => "best_case",
            ScenarioId::WorstCase => "worst_case",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "Default dials: high richness, optimistic climate, 0.25 pressure",
            ScenarioId::PessimisticClimate => "Pessimistic (SSP5) climate, other dials at default",
            ScenarioId::PesticideSurge => "Pesticide pressure raised to 0.9",
            ScenarioId::VulnerableSpring => "Spring-active bees at 0.9 vulnerability",
            ScenarioId::BuzzCollapse => "Buzz pollinators at full vulnerability",
            ScenarioId::LowDiversity => "Low bee species richness",
            ScenarioId::BestCase => "High richness, optimistic climate, every dial at 0.01",
            ScenarioId::WorstCase => "Low richness, pessimistic climate, every dial at 1.0",
        }
    }

    /// The full update this scenario applies.
    pub fn update(&self) -> ParameterUpdate {
        let base = ParameterUpdate::from_parameters(&ScenarioParameters::default());
        match self {
            ScenarioId::Baseline => base,
            ScenarioId::PessimisticClimate => {
                base.with(ParameterName::ClimateScenario, "pessimistic")
            }
            ScenarioId::PesticideSurge => base.with(ParameterName::PesticidePressure, 0.9),
            ScenarioId::VulnerableSpring => base.with(ParameterName::SpringVulnerability, 0.9),
            ScenarioId::BuzzCollapse => base.with(ParameterName::BuzzVulnerability, 1.0),
            ScenarioId::LowDiversity => base.with(ParameterName::Richness, "low"),
            ScenarioId::BestCase => base
                .with(ParameterName::PesticidePressure, 0.01)
                .with(ParameterName::SpringVulnerability, 0.01)
                .with(ParameterName::BuzzVulnerability, 0.01),
            ScenarioId::WorstCase => base
                .with(ParameterName::Richness, "low")
                .with(ParameterName::ClimateScenario, "pessimistic")
                .with(ParameterName::PesticidePressure, 1.0)
                .with(ParameterName::SpringVulnerability, 1.0)
                .with(ParameterName::BuzzVulnerability, 1.0),
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "baseline" | "default" => Ok(ScenarioId::Baseline),
            "pessimistic_climate" | "pessimistic" | "ssp5" => Ok(ScenarioId::PessimisticClimate),
            "pesticide_surge" | "pesticide" => Ok(ScenarioId::PesticideSurge),
            "vulnerable_spring" | "spring" => Ok(ScenarioId::VulnerableSpring),
            "buzz_collapse" | "buzz" => Ok(ScenarioId::BuzzCollapse),
            "low_diversity" | "low" => Ok(ScenarioId::LowDiversity),
            "best_case" | "best" => Ok(ScenarioId::BestCase),
            "worst_case" | "worst" => Ok(ScenarioId::WorstCase),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
