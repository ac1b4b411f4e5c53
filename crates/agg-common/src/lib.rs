//! Shared model types for the spatio-temporal aggregation engine.
//!
//! Everything that crosses crate boundaries lives here: cell requests and
//! their recurring time segments, the tri-state data coverage
//! classification, the tagged uncertainty result, and the common error
//! taxonomy. The heavier machinery (axis integration, kriging, clustering)
//! builds on these types without depending on each other.

pub mod cell;
pub mod coverage;
pub mod error;
pub mod uncertainty;

pub use cell::{CellRequest, TimeSegment};
pub use coverage::DataCoverage;
pub use error::{AggError, Result};
pub use uncertainty::UncertaintyValue;
