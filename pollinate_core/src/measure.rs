//! Numeric-or-undefined values flowing through the derivation graph.
//!
//! An undefined result is not an error: it is carried as a value from the
//! node that produced it all the way to the display boundary, which decides
//! how to show it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a derivation has no numeric result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedCause {
    /// The feature's pesticide rate is null and was multiplied in
    NullPesticideRate,
    /// The scenario-column formula needs an impact value the feature lacks
    MissingClimateImpact,
    /// Mean over a crop with no features
    EmptyCropSubset,
    /// Landscape-wide statistic with no defined feature values
    NoDefinedValues,
    /// The richness level has no factor in the active formula
    UnsupportedRichness,
    /// Arithmetic produced NaN or infinity
    NonFinite,
}

impl UndefinedCause {
    /// Short label for logs and exports.
    pub fn label(&self) -> &'static str {
        match self {
            UndefinedCause::NullPesticideRate => "null pesticide rate",
            UndefinedCause::MissingClimateImpact => "missing climate impact",
            UndefinedCause::EmptyCropSubset => "no features grow this crop",
            UndefinedCause::NoDefinedValues => "no defined feature values",
            UndefinedCause::UnsupportedRichness => "richness level not supported by dataset",
            UndefinedCause::NonFinite => "non-finite result",
        }
    }
}

/// A derived quantity: either a finite number or an undefined marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Measure {
    Value(f64),
    Undefined(UndefinedCause),
}

impl Measure {
    /// Wraps a float, turning NaN/infinity into `Undefined(NonFinite)`.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Measure::Value(value)
        } else {
            Measure::Undefined(UndefinedCause::NonFinite)
        }
    }

    /// Returns the number, if defined.
    pub fn value(&self) -> Option<f64> {
        match self {
            Measure::Value(v) => Some(*v),
            Measure::Undefined(_) => None,
        }
    }

    /// Returns the cause, if undefined.
    pub fn cause(&self) -> Option<UndefinedCause> {
        match self {
            Measure::Value(_) => None,
            Measure::Undefined(cause) => Some(*cause),
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Measure::Value(_))
    }

    /// Applies `f` to a defined value; undefined passes through.
    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            Measure::Value(v) => Measure::from_f64(f(v)),
            undefined => undefined,
        }
    }

    /// Product of two measures; the left operand's cause wins if both are
    /// undefined.
    pub fn times(self, other: Measure) -> Self {
        match (self, other) {
            (Measure::Value(a), Measure::Value(b)) => Measure::from_f64(a * b),
            (Measure::Undefined(cause), _) | (_, Measure::Undefined(cause)) => {
                Measure::Undefined(cause)
            }
        }
    }

    /// Arithmetic mean of a sequence of measures.
    ///
    /// Empty input yields `Undefined(EmptyCropSubset)`. Any undefined member
    /// makes the mean undefined with that member's cause, the same way a
    /// NaN poisons a floating-point sum.
    pub fn mean<I>(measures: I) -> Self
    where
        I: IntoIterator<Item = Measure>,
    {
        let mut sum = 0.0;
        let mut count = 0usize;
        for measure in measures {
            match measure {
                Measure::Value(v) => {
                    sum += v;
                    count += 1;
                }
                undefined => return undefined,
            }
        }
        if count == 0 {
            Measure::Undefined(UndefinedCause::EmptyCropSubset)
        } else {
            Measure::from_f64(sum / count as f64)
        }
    }

    /// Rounds a defined value to `decimals` places (half away from zero).
    pub fn round_to(self, decimals: i32) -> Self {
        let scale = 10f64.powi(decimals);
        self.map(|v| (v * scale).round() / scale)
    }
}

impl From<f64> for Measure {
    fn from(value: f64) -> Self {
        Measure::from_f64(value)
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::Value(v) => write!(f, "{}", v),
            Measure::Undefined(_) => write!(f, "N/A"),
        }
    }
}
