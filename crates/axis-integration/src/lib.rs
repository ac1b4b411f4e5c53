//! Axis integration for the aggregation engine.
//!
//! This crate turns coordinate intervals into *integration points* (IPs):
//! sparse weighted index sets over a single data axis, the shared currency
//! for every weighted mean and variance the engine computes.
//!
//! ```text
//! CellRequest interval
//!      │
//!      ▼
//! AxisIntegrator::integrate(min, max)
//!      │
//!      ├─► IntegrationPoints { weights, indices, bounding }
//!      │       Σweights == 1 whenever coverage != OutOfData
//!      │
//!      └─► DataCoverage (tri-state, combined across axes by the caller)
//! ```
//!
//! Longitude axes wrap through [`CycledLongitudeAxis`], which unwraps the
//! grid into a tripled virtual axis to resolve date-line-crossing and
//! globe-spanning requests. Time segments are projected onto the time axis
//! by a pluggable [`time::TimeProjection`] before the same integration
//! machinery applies.

pub mod axis;
pub mod error;
pub mod ips;
pub mod longitude;
pub mod time;

pub use axis::{AxisIntegration, AxisIntegrator, CoordinateAxis, WeightStrategy};
pub use error::{AxisError, Result};
pub use ips::{IndexBoundingBox, IntegrationPoints};
pub use longitude::CycledLongitudeAxis;
pub use time::{
    CalendarDaysProjection, Days360Projection, MonthlyMeansIntegrator, ProjectedTimeIntegrator,
    TimeIntegrator, TimeProjection,
};
