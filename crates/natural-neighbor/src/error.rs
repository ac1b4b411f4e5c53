//! Error types for triangulation and weight derivation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TriangulationError {
    /// Fewer than three stations, or all stations collinear.
    #[error("degenerate station layout: {0}")]
    DegenerateInput(String),

    /// Station coordinates contain non-finite values.
    #[error("invalid station coordinates: {0}")]
    InvalidCoordinates(String),
}

impl TriangulationError {
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateInput(msg.into())
    }

    pub fn invalid_coordinates(msg: impl Into<String>) -> Self {
        Self::InvalidCoordinates(msg.into())
    }
}

impl From<TriangulationError> for agg_common::AggError {
    fn from(err: TriangulationError) -> Self {
        agg_common::AggError::Configuration(err.to_string())
    }
}

/// Result type for triangulation operations.
pub type Result<T> = std::result::Result<T, TriangulationError>;
