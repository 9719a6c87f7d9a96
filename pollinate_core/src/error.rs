//! Error types for the scenario engine.

use crate::params::ParameterName;
use crate::reactive::NodeKind;
use pollinate_env::LoadError;
use thiserror::Error;

/// A parameter write that falls outside its declared domain.
///
/// Raised before any mutation: the parameter store is left exactly as it
/// was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The parameter name is not one of the five scenario parameters
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// A categorical value outside the allowed set
    #[error("Invalid value '{value}' for {parameter}: expected one of {allowed}")]
    NotInSet {
        parameter: ParameterName,
        value: String,
        allowed: String,
    },

    /// A numeric value outside its closed range
    #[error("{parameter} = {value} is outside [{min:.2}, {max:.2}]")]
    OutOfRange {
        parameter: ParameterName,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A numeric value given for a categorical field, or vice versa
    #[error("{parameter} expects a {expected} value")]
    WrongKind {
        parameter: ParameterName,
        expected: &'static str,
    },
}

impl ValidationError {
    /// Creates a not-in-set error listing the allowed values.
    pub fn not_in_set(parameter: ParameterName, value: impl Into<String>, allowed: &[&str]) -> Self {
        Self::NotInSet {
            parameter,
            value: value.into(),
            allowed: allowed.join(", "),
        }
    }
}

/// Top-level error for building and driving a model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The baseline could not be loaded (fatal at startup)
    #[error("Baseline load failed: {0}")]
    Load(#[from] LoadError),

    /// A parameter write was rejected
    #[error("Parameter rejected: {0}")]
    Validation(#[from] ValidationError),

    /// The model configuration is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// A node was read from inside its own computation
    #[error("Re-entrant read of {0} during its own computation")]
    ReentrantRead(NodeKind),
}

impl ModelError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
