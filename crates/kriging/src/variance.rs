//! Block kriging variance of weighted linear combinations.
//!
//! All calculators share one formula for the variance of the estimate
//! `Σ wi·zi` of the block mean over a target region:
//!
//! ```text
//! Var = Cov(0) + Σi Σj wi·wj·Cov(i,j) - 2·Σi wi·Cov(i, target)
//! ```
//!
//! The target term is averaged over a small sub-sample of points spanning
//! the requested interval or cell, so non-point queries get within-block
//! variance rather than the variance at a single centroid.

use serde::{Deserialize, Serialize};

use crate::variogram::Variogram;

/// Mean Earth radius in kilometres, matching the variogram distance unit.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Relative tolerance below which a negative variance is treated as float
/// noise rather than a programming error.
const NEGATIVITY_TOL: f64 = 1e-9;

/// A station or grid-node location in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A target cell in degrees; a point cell has equal bounds. `lon_max <
/// lon_min` means the cell crosses the date line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCell {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl GeoCell {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    pub fn point(lat: f64, lon: f64) -> Self {
        Self::new(lat, lat, lon, lon)
    }

    pub fn is_point(&self) -> bool {
        self.lat_min == self.lat_max && self.lon_min == self.lon_max
    }

    /// Sub-sample points spanning the cell on an `m x m` grid; a point cell
    /// collapses to its single coordinate.
    pub fn sub_samples(&self, m: usize) -> Vec<GeoPoint> {
        let m = m.max(1);
        let lon_max = if self.lon_max < self.lon_min {
            self.lon_max + 360.0
        } else {
            self.lon_max
        };
        let steps = |lo: f64, hi: f64| -> Vec<f64> {
            if hi <= lo || m == 1 {
                vec![0.5 * (lo + hi)]
            } else {
                (0..m)
                    .map(|k| lo + (hi - lo) * k as f64 / (m - 1) as f64)
                    .collect()
            }
        };
        let lats = steps(self.lat_min, self.lat_max);
        let lons = steps(self.lon_min, lon_max);
        let mut out = Vec::with_capacity(lats.len() * lons.len());
        for &lat in &lats {
            for &lon in &lons {
                out.push(GeoPoint::new(lat, lon));
            }
        }
        out
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lon.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lon.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let s = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * s.sqrt().min(1.0).asin()
}

/// Clamp float noise to zero; material negativity is a programming error.
fn finalize(variance: f64, scale: f64) -> f64 {
    debug_assert!(
        variance >= -NEGATIVITY_TOL * scale.max(1.0),
        "kriging variance materially negative: {variance}"
    );
    variance.max(0.0)
}

/// Variance of a weighted mean along the time axis.
///
/// `nodes` are `(time, weight)` pairs in the variogram's distance unit;
/// `interval` is the target span; `sub_samples` controls the block
/// discretization of the target term.
pub fn temporal_block_variance(
    variogram: &dyn Variogram,
    nodes: &[(f64, f64)],
    interval: (f64, f64),
    sub_samples: usize,
) -> f64 {
    if nodes.is_empty() {
        return 0.0;
    }
    let (a, b) = interval;
    let m = sub_samples.max(1);
    let targets: Vec<f64> = if b <= a || m == 1 {
        vec![0.5 * (a + b)]
    } else {
        (0..m)
            .map(|k| a + (b - a) * k as f64 / (m - 1) as f64)
            .collect()
    };

    let mut var = variogram.covariance(0.0);
    for &(ti, wi) in nodes {
        for &(tj, wj) in nodes {
            var += wi * wj * variogram.node_covariance((ti - tj).abs());
        }
        let mean_cov: f64 = targets
            .iter()
            .map(|&t| variogram.covariance((ti - t).abs()))
            .sum::<f64>()
            / targets.len() as f64;
        var -= 2.0 * wi * mean_cov;
    }
    finalize(var, variogram.sill())
}

/// Variance of a weighted mean over geographic nodes, great-circle metric.
///
/// `nodes` and `weights` are parallel; `sub_grid` is the side of the target
/// cell's sub-sample grid. Used both for grid IPs and for natural-neighbor
/// station weights.
pub fn spherical_block_variance(
    variogram: &dyn Variogram,
    nodes: &[GeoPoint],
    weights: &[f64],
    cell: &GeoCell,
    sub_grid: usize,
) -> f64 {
    debug_assert_eq!(nodes.len(), weights.len());
    if nodes.is_empty() {
        return 0.0;
    }
    let targets = cell.sub_samples(sub_grid);

    let mut var = variogram.covariance(0.0);
    for (i, (&pi, &wi)) in nodes.iter().zip(weights).enumerate() {
        for (j, (&pj, &wj)) in nodes.iter().zip(weights).enumerate() {
            let d = if i == j { 0.0 } else { haversine_km(pi, pj) };
            var += wi * wj * variogram.node_covariance(d);
        }
        let mean_cov: f64 = targets
            .iter()
            .map(|&t| variogram.covariance(haversine_km(pi, t)))
            .sum::<f64>()
            / targets.len() as f64;
        var -= 2.0 * wi * mean_cov;
    }
    finalize(var, variogram.sill())
}

/// Combine spatial and temporal block variances for gridded data under the
/// separability assumption: the temporal variance acts as a dimensionless
/// attenuation of the spatial block variance.
pub fn separable_grid_variance(spatial: f64, temporal: f64, temporal_sill: f64) -> f64 {
    if temporal_sill <= 0.0 {
        return spatial.max(0.0);
    }
    let attenuation = (temporal / temporal_sill).clamp(0.0, 1.0);
    (spatial * attenuation).max(0.0)
}
