//! Empirical variogram estimation from scattered observations.

use crate::error::{KrigingError, Result};
use crate::variance::{haversine_km, GeoPoint};

/// One distance lag of the empirical variogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmpiricalBin {
    /// Mean pair distance within the lag.
    pub distance: f64,
    /// Mean semivariance `0.5 * (zi - zj)^2` within the lag.
    pub semivariance: f64,
    /// Number of contributing pairs.
    pub pairs: usize,
}

/// Bin pairwise semivariances of station observations into distance lags.
///
/// `max_distance` defaults to the largest pairwise distance. Empty lags are
/// dropped, so the result may hold fewer than `num_bins` entries.
pub fn empirical_variogram(
    stations: &[GeoPoint],
    values: &[f64],
    num_bins: usize,
    max_distance: Option<f64>,
) -> Result<Vec<EmpiricalBin>> {
    if stations.len() != values.len() {
        return Err(KrigingError::insufficient_data(format!(
            "{} stations but {} values",
            stations.len(),
            values.len()
        )));
    }
    if stations.len() < 2 || num_bins == 0 {
        return Err(KrigingError::insufficient_data(format!(
            "{} stations, {num_bins} bins",
            stations.len()
        )));
    }

    let n = stations.len();
    let mut pairs = Vec::with_capacity(n * (n - 1) / 2);
    let mut furthest = 0.0f64;
    for i in 0..n {
        for j in i + 1..n {
            let d = haversine_km(stations[i], stations[j]);
            furthest = furthest.max(d);
            let sv = 0.5 * (values[i] - values[j]).powi(2);
            pairs.push((d, sv));
        }
    }
    let cutoff = max_distance.unwrap_or(furthest);
    if cutoff <= 0.0 {
        return Err(KrigingError::insufficient_data(
            "all stations are co-located",
        ));
    }

    let width = cutoff / num_bins as f64;
    let mut dist_sum = vec![0.0f64; num_bins];
    let mut sv_sum = vec![0.0f64; num_bins];
    let mut counts = vec![0usize; num_bins];
    for (d, sv) in pairs {
        if d > cutoff {
            continue;
        }
        let k = ((d / width) as usize).min(num_bins - 1);
        dist_sum[k] += d;
        sv_sum[k] += sv;
        counts[k] += 1;
    }

    let bins: Vec<EmpiricalBin> = (0..num_bins)
        .filter(|&k| counts[k] > 0)
        .map(|k| EmpiricalBin {
            distance: dist_sum[k] / counts[k] as f64,
            semivariance: sv_sum[k] / counts[k] as f64,
            pairs: counts[k],
        })
        .collect();
    if bins.is_empty() {
        return Err(KrigingError::insufficient_data("no pairs within cutoff"));
    }
    Ok(bins)
}
