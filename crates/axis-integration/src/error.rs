//! Error types for axis integration.

use thiserror::Error;

/// Errors that can occur constructing or querying axis integrators.
///
/// Out-of-extent coordinates are not errors; they classify as
/// `DataCoverage::OutOfData` and yield empty integration points.
#[derive(Error, Debug)]
pub enum AxisError {
    /// The raw axis values cannot form a valid coordinate axis.
    #[error("invalid axis: {0}")]
    InvalidAxis(String),

    /// A time projection was asked about a segment it cannot represent.
    #[error("invalid time segment: {0}")]
    InvalidSegment(String),
}

impl AxisError {
    pub fn invalid_axis(msg: impl Into<String>) -> Self {
        Self::InvalidAxis(msg.into())
    }

    pub fn invalid_segment(msg: impl Into<String>) -> Self {
        Self::InvalidSegment(msg.into())
    }
}

impl From<AxisError> for agg_common::AggError {
    fn from(err: AxisError) -> Self {
        agg_common::AggError::Configuration(err.to_string())
    }
}

/// Result type for axis integration operations.
pub type Result<T> = std::result::Result<T, AxisError>;
