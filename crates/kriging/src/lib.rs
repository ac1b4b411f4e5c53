//! Kriging-style uncertainty estimation.
//!
//! Variance of a weighted mean is propagated through a semivariance model:
//! parametric variograms ([`variogram`]), empirical estimation and fitting
//! from station scatter ([`empirical`], [`fit`]), block variance
//! calculators for the temporal and spherical cases ([`variance`]), and a
//! bounded CPU pool for the fits ([`fit_pool`]).

pub mod empirical;
pub mod error;
pub mod fit;
pub mod fit_pool;
pub mod variance;
pub mod variogram;

pub use empirical::{empirical_variogram, EmpiricalBin};
pub use error::{KrigingError, Result};
pub use fit::{fallback_from_bins, fit_or_fallback, fit_spherical};
pub use fit_pool::FitPool;
pub use variance::{
    haversine_km, separable_grid_variance, spherical_block_variance, temporal_block_variance,
    GeoCell, GeoPoint, EARTH_RADIUS_KM,
};
pub use variogram::{
    ExponentialVariogram, GaussianVariogram, SphericalVariogram, Variogram,
};
