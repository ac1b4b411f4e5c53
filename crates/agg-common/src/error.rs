//! Common error taxonomy for the aggregation engine.
//!
//! Out-of-extent coordinates are *not* errors: they surface as NaN results
//! through [`crate::DataCoverage`]. Errors here are configuration failures
//! (caught at construction), storage failures and internal misuse.

use thiserror::Error;

/// Errors shared across the aggregation crates.
#[derive(Error, Debug)]
pub enum AggError {
    /// Axis or variable autodetection failed; raised at construction,
    /// never mid-batch.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The underlying array store failed after its own retry policy was
    /// exhausted. Fatal for the containing cluster.
    #[error("storage error: {0}")]
    Storage(String),

    /// A request referenced a variable the dataset does not declare.
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// Internal contract violation that is not recoverable per-cell.
    #[error("internal error: {0}")]
    Internal(String),

    /// The caller cancelled the batch; partial work is discarded.
    #[error("operation cancelled")]
    Cancelled,
}

impl AggError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type for aggregation operations.
pub type Result<T> = std::result::Result<T, AggError>;
