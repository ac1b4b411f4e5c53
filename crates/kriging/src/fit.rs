//! Nonlinear least-squares fitting of spherical variogram parameters.
//!
//! Gauss-Newton with a small ridge term on the normal equations, pair-count
//! weighted residuals, and a coarse bin-derived fallback model when the fit
//! fails to converge.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::empirical::EmpiricalBin;
use crate::error::{KrigingError, Result};
use crate::variogram::SphericalVariogram;

const MAX_ITERATIONS: usize = 50;
const RIDGE: f64 = 1e-9;

/// Fit a spherical model to empirical bins by Gauss-Newton.
///
/// Residuals are weighted by the square root of each bin's pair count.
/// Diverging or non-finite iterates abort with `FitDiverged`.
pub fn fit_spherical(bins: &[EmpiricalBin]) -> Result<SphericalVariogram> {
    if bins.len() < 3 {
        return Err(KrigingError::insufficient_data(format!(
            "{} bins, need at least 3",
            bins.len()
        )));
    }

    let initial = fallback_from_bins(bins)?;
    // Parameters: nugget, partial sill (sill - nugget), range.
    let mut nugget = initial.nugget;
    let mut partial = (initial.sill - initial.nugget).max(1e-12);
    let mut range = initial.range;

    let weights: Vec<f64> = bins.iter().map(|b| (b.pairs as f64).sqrt()).collect();
    let mut last_cost = f64::INFINITY;

    for iteration in 0..MAX_ITERATIONS {
        let mut jac = DMatrix::zeros(bins.len(), 3);
        let mut res = DVector::zeros(bins.len());
        for (k, bin) in bins.iter().enumerate() {
            let d = bin.distance;
            let (model, d_nugget, d_partial, d_range) = if d >= range {
                (nugget + partial, 1.0, 1.0, 0.0)
            } else {
                let h = d / range;
                let shape = 1.5 * h - 0.5 * h * h * h;
                (
                    nugget + partial * shape,
                    1.0,
                    shape,
                    1.5 * partial / range * (h * h * h - h),
                )
            };
            let w = weights[k];
            res[k] = w * (model - bin.semivariance);
            jac[(k, 0)] = w * d_nugget;
            jac[(k, 1)] = w * d_partial;
            jac[(k, 2)] = w * d_range;
        }

        let cost = res.norm_squared();
        if !cost.is_finite() || cost > 10.0 * last_cost.max(1e-300) && iteration > 0 {
            return Err(KrigingError::fit_diverged(format!(
                "cost {cost} after {iteration} iterations"
            )));
        }
        last_cost = last_cost.min(cost);

        let jt = jac.transpose();
        let mut normal = &jt * &jac;
        for i in 0..3 {
            normal[(i, i)] += RIDGE * (1.0 + normal[(i, i)]);
        }
        let rhs = &jt * &res;
        let step = normal
            .lu()
            .solve(&rhs)
            .ok_or_else(|| KrigingError::fit_diverged("singular normal equations"))?;

        nugget = (nugget - step[0]).max(0.0);
        partial = (partial - step[1]).max(1e-12);
        range = (range - step[2]).max(f64::MIN_POSITIVE);
        if !(nugget.is_finite() && partial.is_finite() && range.is_finite()) {
            return Err(KrigingError::fit_diverged("non-finite parameters"));
        }

        let scale = 1.0 + nugget.abs() + partial.abs() + range.abs();
        if step.norm() < 1e-10 * scale {
            debug!(iteration, nugget, partial, range, "variogram fit converged");
            break;
        }
    }

    SphericalVariogram::new(nugget, nugget + partial, range)
}

/// Coarse model read straight off the bins: nugget from the first lag, sill
/// from the tail mean, range at the first lag reaching 95 % of the sill.
pub fn fallback_from_bins(bins: &[EmpiricalBin]) -> Result<SphericalVariogram> {
    if bins.is_empty() {
        return Err(KrigingError::insufficient_data("no bins"));
    }
    let tail_start = bins.len() - (bins.len() / 3).max(1);
    let sill = bins[tail_start..]
        .iter()
        .map(|b| b.semivariance)
        .sum::<f64>()
        / (bins.len() - tail_start) as f64;
    let sill = sill.max(1e-12);
    let nugget = bins[0].semivariance.clamp(0.0, sill);
    let range = bins
        .iter()
        .find(|b| b.semivariance >= 0.95 * sill)
        .map(|b| b.distance)
        .unwrap_or(bins[bins.len() - 1].distance)
        .max(f64::MIN_POSITIVE);
    SphericalVariogram::new(nugget, sill, range)
}

/// Fit with fallback: a diverged fit degrades to the coarse model rather
/// than failing the request.
pub fn fit_or_fallback(bins: &[EmpiricalBin]) -> Result<SphericalVariogram> {
    match fit_spherical(bins) {
        Ok(model) => Ok(model),
        Err(KrigingError::InsufficientData(msg)) => {
            Err(KrigingError::InsufficientData(msg))
        }
        Err(err) => {
            warn!(error = %err, "variogram fit failed, using bin-derived model");
            fallback_from_bins(bins)
        }
    }
}
