//! Renderer-boundary helpers.
//!
//! The core never clamps. A renderer colouring the choropleth over `[0, 1]`
//! clips here.

use crate::measure::Measure;

/// Lower bound of the choropleth range.
pub const DISPLAY_MIN: f64 = 0.0;
/// Upper bound of the choropleth range.
pub const DISPLAY_MAX: f64 = 1.0;

/// Clamps into `[0, 1]`.
pub fn clip_unit(value: f64) -> f64 {
    value.clamp(DISPLAY_MIN, DISPLAY_MAX)
}

/// Index of the colour bin for a value after clipping.
///
/// Returns `None` for undefined values or `bins == 0`. A value of exactly
/// 1.0 lands in the last bin.
pub fn colour_bin(value: Measure, bins: usize) -> Option<usize> {
    if bins == 0 {
        return None;
    }
    let v = clip_unit(value.value()?);
    let index = (v * bins as f64).floor() as usize;
    Some(index.min(bins - 1))
}

/// Widget text for a measure: up to three decimals, trailing zeros trimmed,
/// `N/A` when undefined.
pub fn format_measure(value: Measure) -> String {
    match value {
        Measure::Value(v) => {
            let text = format!("{:.3}", v);
            let text = text.trim_end_matches('0').trim_end_matches('.');
            match text {
                "-0" | "" => "0".to_string(),
                other => other.to_string(),
            }
        }
        Measure::Undefined(_) => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::UndefinedCause;

    #[test]
    fn test_clip_unit() {
        assert_eq!(clip_unit(1.4), 1.0);
        assert_eq!(clip_unit(-0.2), 0.0);
        assert_eq!(clip_unit(0.42), 0.42);
    }

    #[test]
    fn test_colour_bin() {
        assert_eq!(colour_bin(Measure::Value(0.0), 10), Some(0));
        assert_eq!(colour_bin(Measure::Value(0.55), 10), Some(5));
        assert_eq!(colour_bin(Measure::Value(1.0), 10), Some(9));
        assert_eq!(colour_bin(Measure::Value(7.0), 10), Some(9));
        assert_eq!(colour_bin(Measure::Value(-3.0), 4), Some(0));
        assert_eq!(colour_bin(Measure::Undefined(UndefinedCause::NullPesticideRate), 10), None);
        assert_eq!(colour_bin(Measure::Value(0.5), 0), None);
    }

    #[test]
    fn test_format_measure() {
        assert_eq!(format_measure(Measure::Value(0.648)), "0.648");
        assert_eq!(format_measure(Measure::Value(0.87)), "0.87");
        assert_eq!(format_measure(Measure::Value(0.6480000000000001)), "0.648");
        assert_eq!(format_measure(Measure::Value(1.0)), "1");
        assert_eq!(format_measure(Measure::Value(0.0)), "0");
        assert_eq!(format_measure(Measure::Value(-0.0001)), "0");
        assert_eq!(format_measure(Measure::Undefined(UndefinedCause::EmptyCropSubset)), "N/A");
    }
}
