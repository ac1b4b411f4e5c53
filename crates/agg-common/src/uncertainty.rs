//! Tagged uncertainty result.

use serde::{Deserialize, Serialize};

/// Outcome of an uncertainty evaluation for one cell.
///
/// This replaces the historical convention of overloading the float range
/// (`NaN` = no data, `f64::MAX` = no calibrated uncertainty). Callers that
/// need the flat float contract can use [`UncertaintyValue::to_sentinel`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UncertaintyValue {
    /// Variance of the requested aggregate.
    Value(f64),
    /// A mean is available but no calibrated uncertainty exists
    /// (missing variogram or uneven coverage).
    NoUncertainty,
    /// The request lies outside the data extent.
    NoData,
}

impl UncertaintyValue {
    /// Flatten to the legacy sentinel convention:
    /// `NaN` = no data, `f64::MAX` = no calibrated uncertainty.
    pub fn to_sentinel(self) -> f64 {
        match self {
            UncertaintyValue::Value(v) => v,
            UncertaintyValue::NoUncertainty => f64::MAX,
            UncertaintyValue::NoData => f64::NAN,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            UncertaintyValue::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_no_data(self) -> bool {
        matches!(self, UncertaintyValue::NoData)
    }

    /// Scale the variance for a linear unit transform `y = scale*x + offset`.
    /// Variance scales by `scale^2`; the sentinels pass through unchanged.
    pub fn scale_variance(self, scale: f64) -> Self {
        match self {
            UncertaintyValue::Value(v) => UncertaintyValue::Value(v * scale * scale),
            other => other,
        }
    }
}
