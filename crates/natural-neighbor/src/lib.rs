//! Natural-neighbor interpolation for scattered station data.
//!
//! Station locations for a time segment are triangulated once
//! ([`triangulation`]), then each target cell derives barycentric weights
//! over the triangulation ([`interpolator`]), averaged across a small
//! sub-sampling grid for area cells. The weights feed both the station
//! value mean and the scattered-point kriging variance.

pub mod error;
pub mod interpolator;
pub mod triangulation;

pub use error::{Result, TriangulationError};
pub use interpolator::{LinearWeight, NaturalNeighborInterpolator, StationNodes};
pub use triangulation::{Point2, Triangulation};
