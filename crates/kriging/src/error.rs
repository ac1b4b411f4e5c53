//! Error types for variogram fitting and variance calculation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KrigingError {
    /// Variogram parameters are not a valid model.
    #[error("invalid variogram: {0}")]
    InvalidVariogram(String),

    /// Not enough observations or bins to fit a model.
    #[error("insufficient data for variogram fit: {0}")]
    InsufficientData(String),

    /// The nonlinear fit failed to converge.
    #[error("variogram fit diverged: {0}")]
    FitDiverged(String),

    /// The fit pool dropped a job before completion.
    #[error("fit pool closed: {0}")]
    PoolClosed(String),
}

impl KrigingError {
    pub fn invalid_variogram(msg: impl Into<String>) -> Self {
        Self::InvalidVariogram(msg.into())
    }

    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    pub fn fit_diverged(msg: impl Into<String>) -> Self {
        Self::FitDiverged(msg.into())
    }

    pub fn pool_closed(msg: impl Into<String>) -> Self {
        Self::PoolClosed(msg.into())
    }
}

impl From<KrigingError> for agg_common::AggError {
    fn from(err: KrigingError) -> Self {
        match err {
            KrigingError::InvalidVariogram(msg) => agg_common::AggError::Configuration(msg),
            other => agg_common::AggError::Internal(other.to_string()),
        }
    }
}

/// Result type for kriging operations.
pub type Result<T> = std::result::Result<T, KrigingError>;
