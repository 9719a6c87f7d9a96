//! Scenario parameters and the store that owns them.
//!
//! The parameter store is the only mutable state in the engine. Every write
//! goes through [`ParameterStore::set`], which validates the whole update
//! before touching anything and tells listeners exactly which fields moved.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// =============================================================================
// CATEGORICAL PARAMETERS
// =============================================================================

/// Bee species richness level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Richness {
    Low,
    Medium,
    High,
}

impl Richness {
    pub fn name(&self) -> &'static str {
        match self {
            Richness::Low => "low",
            Richness::Medium => "medium",
            Richness::High => "high",
        }
    }
}

impl fmt::Display for Richness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which richness levels a dataset supports.
///
/// Datasets carrying per-scenario climate-impact columns only calibrate a
/// low and a high richness level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RichnessDomain {
    /// low, medium, high
    Full,
    /// low, high
    Reduced,
}

impl RichnessDomain {
    /// Allowed levels, in display order.
    pub fn levels(&self) -> &'static [Richness] {
        match self {
            RichnessDomain::Full => &[Richness::High, Richness::Medium, Richness::Low],
            RichnessDomain::Reduced => &[Richness::High, Richness::Low],
        }
    }

    pub fn allows(&self, richness: Richness) -> bool {
        self.levels().contains(&richness)
    }

    fn names(&self) -> Vec<&'static str> {
        self.levels().iter().map(Richness::name).collect()
    }

    /// Parses a level name, rejecting names outside this domain.
    pub fn parse(&self, value: &str) -> Result<Richness, ValidationError> {
        let wanted = value.trim().to_lowercase();
        self.levels()
            .iter()
            .copied()
            .find(|level| level.name() == wanted)
            .ok_or_else(|| {
                ValidationError::not_in_set(ParameterName::Richness, value, &self.names())
            })
    }
}

/// Greenhouse-gas / socioeconomic trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClimateScenario {
    /// Reduced emissions, more equitable socioeconomic factors (SSP1)
    Optimistic,
    /// Fossil-fuelled development (SSP5)
    Pessimistic,
}

impl ClimateScenario {
    pub const ALL: [ClimateScenario; 2] = [ClimateScenario::Optimistic, ClimateScenario::Pessimistic];

    pub fn name(&self) -> &'static str {
        match self {
            ClimateScenario::Optimistic => "optimistic",
            ClimateScenario::Pessimistic => "pessimistic",
        }
    }
}

impl fmt::Display for ClimateScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ClimateScenario {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "optimistic" => Ok(ClimateScenario::Optimistic),
            "pessimistic" => Ok(ClimateScenario::Pessimistic),
            _ => Err(ValidationError::not_in_set(
                ParameterName::ClimateScenario,
                s,
                &["optimistic", "pessimistic"],
            )),
        }
    }
}

// =============================================================================
// BOUNDED DIALS
// =============================================================================

/// A slider value in `[0.01, 1.00]`.
///
/// Can only be constructed through [`Dial::new`], so a `Dial` in hand is
/// always in range.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Dial(f64);

impl Dial {
    pub const MIN: f64 = 0.01;
    pub const MAX: f64 = 1.00;

    /// Validates a value for the named dial.
    pub fn new(parameter: ParameterName, value: f64) -> Result<Self, ValidationError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::OutOfRange {
                parameter,
                value,
                min: Self::MIN,
                max: Self::MAX,
            })
        }
    }

    pub fn get(&self) -> f64 {
        self.0
    }

    /// Bit pattern, for snapshot keys.
    pub(crate) fn bits(&self) -> u64 {
        self.0.to_bits()
    }
}

impl fmt::Display for Dial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

// =============================================================================
// PARAMETER NAMES & VALUES
// =============================================================================

/// The five scenario parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParameterName {
    Richness,
    ClimateScenario,
    PesticidePressure,
    SpringVulnerability,
    BuzzVulnerability,
}

impl ParameterName {
    pub const ALL: [ParameterName; 5] = [
        ParameterName::Richness,
        ParameterName::ClimateScenario,
        ParameterName::PesticidePressure,
        ParameterName::SpringVulnerability,
        ParameterName::BuzzVulnerability,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ParameterName::Richness => "richness",
            ParameterName::ClimateScenario => "climateScenario",
            ParameterName::PesticidePressure => "pesticidePressure",
            ParameterName::SpringVulnerability => "springVulnerability",
            ParameterName::BuzzVulnerability => "buzzVulnerability",
        }
    }

    /// True for the two fields that take a categorical value.
    pub fn is_categorical(&self) -> bool {
        matches!(self, ParameterName::Richness | ParameterName::ClimateScenario)
    }
}

impl fmt::Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ParameterName {
    type Err = ValidationError;

    /// Accepts camelCase, snake_case and the short widget ids
    /// (`ssp`, `pesticide`, `spring_vuln`, `buzz_vuln`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "richness" => Ok(ParameterName::Richness),
            "climatescenario" | "climate" | "ssp" => Ok(ParameterName::ClimateScenario),
            "pesticidepressure" | "pesticide" => Ok(ParameterName::PesticidePressure),
            "springvulnerability" | "springvuln" | "spring" => Ok(ParameterName::SpringVulnerability),
            "buzzvulnerability" | "buzzvuln" | "buzz" => Ok(ParameterName::BuzzVulnerability),
            _ => Err(ValidationError::UnknownParameter(s.to_string())),
        }
    }
}

/// A raw value arriving from the interaction layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Categorical(String),
    Numeric(f64),
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Categorical(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Categorical(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Numeric(value)
    }
}

impl From<Richness> for ParameterValue {
    fn from(value: Richness) -> Self {
        ParameterValue::Categorical(value.name().to_string())
    }
}

impl From<ClimateScenario> for ParameterValue {
    fn from(value: ClimateScenario) -> Self {
        ParameterValue::Categorical(value.name().to_string())
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Categorical(s) => write!(f, "{}", s),
            ParameterValue::Numeric(v) => write!(f, "{}", v),
        }
    }
}

// =============================================================================
// SCENARIO PARAMETERS
// =============================================================================

/// A complete, always-valid parameter snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioParameters {
    pub richness: Richness,
    pub climate: ClimateScenario,
    pub pesticide_pressure: Dial,
    pub spring_vulnerability: Dial,
    pub buzz_vulnerability: Dial,
}

impl Default for ScenarioParameters {
    fn default() -> Self {
        Self {
            richness: Richness::High,
            climate: ClimateScenario::Optimistic,
            pesticide_pressure: Dial(0.25),
            spring_vulnerability: Dial(0.25),
            buzz_vulnerability: Dial(0.25),
        }
    }
}

impl ScenarioParameters {
    /// Current value of one field.
    pub fn value_of(&self, name: ParameterName) -> ParameterValue {
        match name {
            ParameterName::Richness => self.richness.into(),
            ParameterName::ClimateScenario => self.climate.into(),
            ParameterName::PesticidePressure => self.pesticide_pressure.get().into(),
            ParameterName::SpringVulnerability => self.spring_vulnerability.get().into(),
            ParameterName::BuzzVulnerability => self.buzz_vulnerability.get().into(),
        }
    }

    /// Fields whose values differ between two snapshots.
    pub fn diff(&self, other: &ScenarioParameters) -> ChangeSet {
        let mut changes = ChangeSet::default();
        if self.richness != other.richness {
            changes.insert(ParameterName::Richness);
        }
        if self.climate != other.climate {
            changes.insert(ParameterName::ClimateScenario);
        }
        if self.pesticide_pressure.bits() != other.pesticide_pressure.bits() {
            changes.insert(ParameterName::PesticidePressure);
        }
        if self.spring_vulnerability.bits() != other.spring_vulnerability.bits() {
            changes.insert(ParameterName::SpringVulnerability);
        }
        if self.buzz_vulnerability.bits() != other.buzz_vulnerability.bits() {
            changes.insert(ParameterName::BuzzVulnerability);
        }
        changes
    }
}

impl fmt::Display for ScenarioParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "richness={} climate={} pesticide={} spring={} buzz={}",
            self.richness,
            self.climate,
            self.pesticide_pressure,
            self.spring_vulnerability,
            self.buzz_vulnerability
        )
    }
}

// =============================================================================
// UPDATES & CHANGE SETS
// =============================================================================

/// A partial update: only the `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterUpdate {
    pub richness: Option<ParameterValue>,
    pub climate: Option<ParameterValue>,
    pub pesticide_pressure: Option<ParameterValue>,
    pub spring_vulnerability: Option<ParameterValue>,
    pub buzz_vulnerability: Option<ParameterValue>,
}

impl ParameterUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one field (builder style). Later writes to the same field win.
    pub fn with(mut self, name: ParameterName, value: impl Into<ParameterValue>) -> Self {
        let value = Some(value.into());
        match name {
            ParameterName::Richness => self.richness = value,
            ParameterName::ClimateScenario => self.climate = value,
            ParameterName::PesticidePressure => self.pesticide_pressure = value,
            ParameterName::SpringVulnerability => self.spring_vulnerability = value,
            ParameterName::BuzzVulnerability => self.buzz_vulnerability = value,
        }
        self
    }

    /// An update setting every field of a snapshot.
    pub fn from_parameters(params: &ScenarioParameters) -> Self {
        ParameterName::ALL
            .iter()
            .fold(Self::new(), |update, name| update.with(*name, params.value_of(*name)))
    }

    pub fn is_empty(&self) -> bool {
        self.richness.is_none()
            && self.climate.is_none()
            && self.pesticide_pressure.is_none()
            && self.spring_vulnerability.is_none()
            && self.buzz_vulnerability.is_none()
    }

    /// Validates the update against `base`, producing the candidate snapshot.
    ///
    /// Nothing is written anywhere; the first invalid field aborts.
    pub fn apply_to(
        &self,
        base: &ScenarioParameters,
        domain: RichnessDomain,
    ) -> Result<ScenarioParameters, ValidationError> {
        let mut next = *base;
        if let Some(value) = &self.richness {
            next.richness = domain.parse(categorical(ParameterName::Richness, value)?)?;
        }
        if let Some(value) = &self.climate {
            next.climate = categorical(ParameterName::ClimateScenario, value)?.parse()?;
        }
        if let Some(value) = &self.pesticide_pressure {
            next.pesticide_pressure = dial(ParameterName::PesticidePressure, value)?;
        }
        if let Some(value) = &self.spring_vulnerability {
            next.spring_vulnerability = dial(ParameterName::SpringVulnerability, value)?;
        }
        if let Some(value) = &self.buzz_vulnerability {
            next.buzz_vulnerability = dial(ParameterName::BuzzVulnerability, value)?;
        }
        Ok(next)
    }
}

fn categorical(parameter: ParameterName, value: &ParameterValue) -> Result<&str, ValidationError> {
    match value {
        ParameterValue::Categorical(s) => Ok(s.as_str()),
        ParameterValue::Numeric(_) => Err(ValidationError::WrongKind {
            parameter,
            expected: "categorical",
        }),
    }
}

fn dial(parameter: ParameterName, value: &ParameterValue) -> Result<Dial, ValidationError> {
    match value {
        ParameterValue::Numeric(v) => Dial::new(parameter, *v),
        ParameterValue::Categorical(_) => Err(ValidationError::WrongKind {
            parameter,
            expected: "numeric",
        }),
    }
}

/// The fields an effective update changed, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    fields: Vec<ParameterName>,
}

impl ChangeSet {
    pub fn insert(&mut self, name: ParameterName) {
        if let Err(pos) = self.fields.binary_search(&name) {
            self.fields.insert(pos, name);
        }
    }

    pub fn contains(&self, name: ParameterName) -> bool {
        self.fields.binary_search(&name).is_ok()
    }

    /// True if any of `names` changed.
    pub fn touches(&self, names: &[ParameterName]) -> bool {
        names.iter().any(|name| self.contains(*name))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ParameterName> + '_ {
        self.fields.iter().copied()
    }
}

impl FromIterator<ParameterName> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = ParameterName>>(iter: I) -> Self {
        let mut changes = ChangeSet::default();
        for name in iter {
            changes.insert(name);
        }
        changes
    }
}

// =============================================================================
// PARAMETER STORE
// =============================================================================

/// Something that must hear about effective parameter changes.
pub trait ParameterListener: Send + Sync {
    /// Called once per effective update, after the store has been written.
    fn parameters_changed(&self, changes: &ChangeSet, current: &ScenarioParameters);
}

/// Owner of the current scenario parameters.
pub struct ParameterStore {
    current: ScenarioParameters,
    domain: RichnessDomain,
    revision: u64,
    listeners: Vec<Arc<dyn ParameterListener>>,
}

impl ParameterStore {
    /// Creates a store holding the default parameters.
    ///
    /// The default richness (`high`) is valid in every domain.
    pub fn new(domain: RichnessDomain) -> Self {
        Self {
            current: ScenarioParameters::default(),
            domain,
            revision: 0,
            listeners: Vec::new(),
        }
    }

    /// Creates a store seeded with `initial`, which must fit the domain.
    pub fn with_parameters(
        domain: RichnessDomain,
        initial: ScenarioParameters,
    ) -> Result<Self, ValidationError> {
        if !domain.allows(initial.richness) {
            return Err(ValidationError::not_in_set(
                ParameterName::Richness,
                initial.richness.name(),
                &domain.names(),
            ));
        }
        Ok(Self {
            current: initial,
            ..Self::new(domain)
        })
    }

    /// Current snapshot.
    pub fn get(&self) -> ScenarioParameters {
        self.current
    }

    pub fn domain(&self) -> RichnessDomain {
        self.domain
    }

    /// Number of effective updates applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Registers a listener for effective changes.
    pub fn subscribe(&mut self, listener: Arc<dyn ParameterListener>) {
        self.listeners.push(listener);
    }

    /// Applies a partial update.
    ///
    /// # Returns
    /// * `Ok(changes)` - The fields whose values actually changed (possibly none)
    /// * `Err(ValidationError)` - Some field was out of domain; nothing was written
    pub fn set(&mut self, update: &ParameterUpdate) -> Result<ChangeSet, ValidationError> {
        let next = update.apply_to(&self.current, self.domain)?;
        let changes = self.current.diff(&next);

        if changes.is_empty() {
            tracing::trace!("Parameter update is a no-op");
            return Ok(changes);
        }

        self.current = next;
        self.revision += 1;
        tracing::debug!(
            "Parameters revision {}: {} ({} changed)",
            self.revision,
            self.current,
            changes.len()
        );

        for listener in &self.listeners {
            listener.parameters_changed(&changes, &self.current);
        }
        Ok(changes)
    }

    /// Sets one parameter by name.
    pub fn set_parameter(
        &mut self,
        name: &str,
        value: impl Into<ParameterValue>,
    ) -> Result<ChangeSet, ValidationError> {
        let name: ParameterName = name.parse()?;
        self.set(&ParameterUpdate::new().with(name, value))
    }
}

impl fmt::Debug for ParameterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterStore")
            .field("current", &self.current)
            .field("domain", &self.domain)
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
