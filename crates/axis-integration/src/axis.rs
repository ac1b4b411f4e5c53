//! Coordinate axes and the generic interval integrator.

use agg_common::DataCoverage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AxisError, Result};
use crate::ips::{IndexBoundingBox, IntegrationPoints};

/// Relative tolerance for classifying an interval as extending beyond the
/// axis extent.
const EDGE_TOL: f64 = 1e-9;

/// How node weights are derived from the overlap of an interval with the
/// axis nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightStrategy {
    /// Weight proportional to overlap with each node's implicit cell,
    /// extending halfway to each neighbor. Nearest-neighbor-like averaging.
    Step,
    /// Weight proportional to trapezoidal overlap assuming linear ramps
    /// between adjacent nodes. A point query yields 1 or 2 nodes.
    #[default]
    Linear,
}

/// A validated, monotonic coordinate axis.
///
/// Descending input axes are normalized to ascending internally; output
/// indices are remapped back to the original order.
#[derive(Debug, Clone)]
pub struct CoordinateAxis {
    /// Node coordinates, always ascending.
    values: Vec<f64>,
    /// Whether the original input axis was descending.
    descending: bool,
}

impl CoordinateAxis {
    /// Build an axis from raw node coordinates.
    ///
    /// Fails fast on fewer than two nodes, non-finite values, or
    /// non-monotonic ordering; these are configuration errors and must
    /// never surface mid-batch.
    pub fn new(raw: Vec<f64>) -> Result<Self> {
        if raw.len() < 2 {
            return Err(AxisError::invalid_axis(format!(
                "axis needs at least 2 nodes, got {}",
                raw.len()
            )));
        }
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(AxisError::invalid_axis("axis contains non-finite values"));
        }
        let ascending = raw.windows(2).all(|w| w[0] < w[1]);
        let descending = raw.windows(2).all(|w| w[0] > w[1]);
        if !ascending && !descending {
            return Err(AxisError::invalid_axis("axis values are not strictly monotonic"));
        }
        let values = if descending {
            raw.into_iter().rev().collect()
        } else {
            raw
        };
        Ok(Self { values, descending })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        false // construction guarantees >= 2 nodes
    }

    pub fn is_descending(&self) -> bool {
        self.descending
    }

    /// Ascending node coordinates.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Map an internal (ascending) index to the original axis order.
    pub fn original_index(&self, ascending_index: usize) -> usize {
        if self.descending {
            self.values.len() - 1 - ascending_index
        } else {
            ascending_index
        }
    }

    /// Node coordinate for an index in the original axis order.
    pub fn position(&self, original_index: usize) -> f64 {
        let i = if self.descending {
            self.values.len() - 1 - original_index
        } else {
            original_index
        };
        self.values[i]
    }

    /// Midpoint between ascending nodes `i` and `i + 1`.
    fn mid(&self, i: usize) -> f64 {
        0.5 * (self.values[i] + self.values[i + 1])
    }
}

/// Integration points plus the coverage classification that qualifies them.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisIntegration {
    pub ips: IntegrationPoints,
    pub coverage: DataCoverage,
}

impl AxisIntegration {
    pub fn out_of_data() -> Self {
        Self {
            ips: IntegrationPoints::empty(),
            coverage: DataCoverage::OutOfData,
        }
    }
}

/// Converts coordinate intervals on one axis into integration points.
#[derive(Debug, Clone)]
pub struct AxisIntegrator {
    axis: CoordinateAxis,
    strategy: WeightStrategy,
}

impl AxisIntegrator {
    pub fn new(axis: CoordinateAxis, strategy: WeightStrategy) -> Self {
        Self { axis, strategy }
    }

    pub fn axis(&self) -> &CoordinateAxis {
        &self.axis
    }

    pub fn strategy(&self) -> WeightStrategy {
        self.strategy
    }

    /// Coordinate extent within which queries are in-data.
    ///
    /// Step cells extend half a spacing beyond the boundary nodes; linear
    /// ramps end at the boundary nodes themselves.
    pub fn extent(&self) -> (f64, f64) {
        let v = self.axis.values();
        let n = v.len();
        match self.strategy {
            WeightStrategy::Step => (
                v[0] - 0.5 * (v[1] - v[0]),
                v[n - 1] + 0.5 * (v[n - 1] - v[n - 2]),
            ),
            WeightStrategy::Linear => (v[0], v[n - 1]),
        }
    }

    /// Integration points for a single coordinate.
    pub fn integrate_point(&self, coord: f64) -> AxisIntegration {
        self.integrate(coord, coord)
    }

    /// Integration points for the interval `[min, max]`.
    ///
    /// Guarantees Σweights == 1 (±1e-12) whenever coverage is not
    /// `OutOfData`. An interval only partially inside the extent is
    /// renormalized over the covered portion and classified
    /// `DataWithoutUncertainty`.
    pub fn integrate(&self, min: f64, max: f64) -> AxisIntegration {
        debug_assert!(min <= max, "interval must be ordered");
        let (e0, e1) = self.extent();
        if max < e0 || min > e1 {
            debug!(min, max, "interval outside axis extent");
            return AxisIntegration::out_of_data();
        }

        let a = min.max(e0);
        let b = max.min(e1);
        let tol = EDGE_TOL * (e1 - e0).abs().max(1.0);
        let partial = min < e0 - tol || max > e1 + tol;
        let coverage = if partial {
            debug!(min, max, "interval partially covered, demoting coverage");
            DataCoverage::DataWithoutUncertainty
        } else {
            DataCoverage::DataWithUncertainty
        };

        let (weights, indices) = if b - a <= tol {
            self.point_weights(0.5 * (a + b))
        } else {
            match self.strategy {
                WeightStrategy::Step => self.step_cell_weights(a, b),
                WeightStrategy::Linear => self.linear_cell_weights(a, b),
            }
        };

        let ips = self.finish(weights, indices);
        AxisIntegration { ips, coverage }
    }

    /// Index bounding box for the interval, singular when out of data.
    pub fn bounding_box(&self, min: f64, max: f64) -> IndexBoundingBox {
        self.integrate(min, max).ips.bounding
    }

    /// Coverage classification without computing weights.
    pub fn coverage(&self, min: f64, max: f64) -> DataCoverage {
        let (e0, e1) = self.extent();
        if max < e0 || min > e1 {
            return DataCoverage::OutOfData;
        }
        let tol = EDGE_TOL * (e1 - e0).abs().max(1.0);
        if min < e0 - tol || max > e1 + tol {
            DataCoverage::DataWithoutUncertainty
        } else {
            DataCoverage::DataWithUncertainty
        }
    }

    /// Weights for a point query; coordinate must be inside the extent.
    fn point_weights(&self, x: f64) -> (Vec<f64>, Vec<usize>) {
        let v = self.axis.values();
        let n = v.len();
        match self.strategy {
            WeightStrategy::Step => {
                // Cell i spans [mid(i-1), mid(i)]; count midpoints <= x.
                let mut i = 0;
                while i < n - 1 && self.axis.mid(i) <= x {
                    i += 1;
                }
                (vec![1.0], vec![i])
            }
            WeightStrategy::Linear => {
                let hi = v.partition_point(|&node| node <= x);
                if hi == 0 {
                    return (vec![1.0], vec![0]);
                }
                if hi == n {
                    return (vec![1.0], vec![n - 1]);
                }
                let i = hi - 1;
                let t = (x - v[i]) / (v[i + 1] - v[i]);
                if t < 1e-12 {
                    (vec![1.0], vec![i])
                } else if t > 1.0 - 1e-12 {
                    (vec![1.0], vec![i + 1])
                } else {
                    (vec![1.0 - t, t], vec![i, i + 1])
                }
            }
        }
    }

    /// Step-function weights: overlap of `[a, b]` with each implicit cell.
    fn step_cell_weights(&self, a: f64, b: f64) -> (Vec<f64>, Vec<usize>) {
        let v = self.axis.values();
        let n = v.len();
        let (e0, e1) = self.extent();
        let mut weights = Vec::new();
        let mut indices = Vec::new();
        for i in 0..n {
            let left = if i == 0 { e0 } else { self.axis.mid(i - 1) };
            let right = if i == n - 1 { e1 } else { self.axis.mid(i) };
            let overlap = right.min(b) - left.max(a);
            if overlap > 0.0 {
                weights.push(overlap / (b - a));
                indices.push(i);
            }
        }
        (weights, indices)
    }

    /// Linear (trapezoidal) weights: integral of each node's hat function
    /// over `[a, b]`.
    fn linear_cell_weights(&self, a: f64, b: f64) -> (Vec<f64>, Vec<usize>) {
        let v = self.axis.values();
        let n = v.len();
        let mut acc = vec![0.0f64; n];
        for j in 0..n - 1 {
            let lo = a.max(v[j]);
            let hi = b.min(v[j + 1]);
            if hi <= lo {
                continue;
            }
            let d = v[j + 1] - v[j];
            // Left node: integral of (v[j+1] - x) / d over [lo, hi].
            acc[j] += ((v[j + 1] - lo).powi(2) - (v[j + 1] - hi).powi(2)) / (2.0 * d);
            // Right node: integral of (x - v[j]) / d over [lo, hi].
            acc[j + 1] += ((hi - v[j]).powi(2) - (lo - v[j]).powi(2)) / (2.0 * d);
        }
        let mut weights = Vec::new();
        let mut indices = Vec::new();
        for (i, w) in acc.into_iter().enumerate() {
            if w > 0.0 {
                weights.push(w / (b - a));
                indices.push(i);
            }
        }
        (weights, indices)
    }

    /// Normalize the weight sum to exactly 1 and remap indices to the
    /// original axis order.
    fn finish(&self, mut weights: Vec<f64>, indices: Vec<usize>) -> IntegrationPoints {
        let sum: f64 = weights.iter().sum();
        debug_assert!(sum > 0.0, "in-data interval produced zero total weight");
        if sum > 0.0 {
            for w in &mut weights {
                *w /= sum;
            }
        }
        let mut pairs: Vec<(usize, f64)> = indices
            .into_iter()
            .map(|i| self.axis.original_index(i))
            .zip(weights)
            .collect();
        pairs.sort_by_key(|(i, _)| *i);
        let (indices, weights) = pairs.into_iter().map(|(i, w)| (i, w)).unzip();
        IntegrationPoints::new(weights, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(values: &[f64]) -> CoordinateAxis {
        CoordinateAxis::new(values.to_vec()).unwrap()
    }

    #[test]
    fn test_axis_validation() {
        assert!(CoordinateAxis::new(vec![1.0]).is_err());
        assert!(CoordinateAxis::new(vec![1.0, f64::NAN]).is_err());
        assert!(CoordinateAxis::new(vec![1.0, 3.0, 2.0]).is_err());
        assert!(CoordinateAxis::new(vec![1.0, 1.0, 2.0]).is_err());
        assert!(CoordinateAxis::new(vec![3.0, 2.0, 1.0]).is_ok());
    }

    #[test]
    fn test_descending_axis_remap() {
        let a = axis(&[30.0, 20.0, 10.0]);
        assert!(a.is_descending());
        assert_eq!(a.position(0), 30.0);
        assert_eq!(a.position(2), 10.0);
    }

    #[test]
    fn test_linear_point_two_nodes() {
        let integ = AxisIntegrator::new(axis(&[0.0, 10.0, 20.0]), WeightStrategy::Linear);
        let r = integ.integrate_point(2.5);
        assert_eq!(r.coverage, DataCoverage::DataWithUncertainty);
        assert_eq!(r.ips.indices, vec![0, 1]);
        assert!((r.ips.weights[0] - 0.75).abs() < 1e-12);
        assert!((r.ips.weights[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_linear_point_on_node() {
        let integ = AxisIntegrator::new(axis(&[0.0, 10.0, 20.0]), WeightStrategy::Linear);
        let r = integ.integrate_point(10.0);
        assert_eq!(r.ips.indices, vec![1]);
        assert_eq!(r.ips.weights, vec![1.0]);
    }

    #[test]
    fn test_step_point_picks_nearest_cell() {
        let integ = AxisIntegrator::new(axis(&[0.0, 10.0, 20.0]), WeightStrategy::Step);
        assert_eq!(integ.integrate_point(4.9).ips.indices, vec![0]);
        assert_eq!(integ.integrate_point(5.1).ips.indices, vec![1]);
        assert_eq!(integ.integrate_point(16.0).ips.indices, vec![2]);
    }

    #[test]
    fn test_weight_sum_is_one_for_in_data_queries() {
        for strategy in [WeightStrategy::Step, WeightStrategy::Linear] {
            let integ = AxisIntegrator::new(axis(&[0.0, 1.0, 3.0, 7.0, 10.0]), strategy);
            for (lo, hi) in [(0.5, 2.5), (0.0, 10.0), (6.9, 7.1), (3.0, 3.0)] {
                let r = integ.integrate(lo, hi);
                assert_ne!(r.coverage, DataCoverage::OutOfData);
                assert!(
                    (r.ips.weight_sum() - 1.0).abs() < 1e-10,
                    "{strategy:?} [{lo},{hi}] sum = {}",
                    r.ips.weight_sum()
                );
            }
        }
    }

    #[test]
    fn test_out_of_data() {
        let integ = AxisIntegrator::new(axis(&[0.0, 10.0]), WeightStrategy::Linear);
        let r = integ.integrate(11.0, 12.0);
        assert_eq!(r.coverage, DataCoverage::OutOfData);
        assert!(r.ips.is_empty());
        assert!(r.ips.bounding.is_singular());
    }

    #[test]
    fn test_partial_overlap_is_uncalibrated() {
        let integ = AxisIntegrator::new(axis(&[0.0, 10.0, 20.0]), WeightStrategy::Linear);
        let r = integ.integrate(-5.0, 5.0);
        assert_eq!(r.coverage, DataCoverage::DataWithoutUncertainty);
        // Renormalized over the covered part [0, 5].
        assert!((r.ips.weight_sum() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_step_cell_overlap_weights() {
        // Cells: [-5,5], [5,15], [15,25] for nodes 0,10,20.
        let integ = AxisIntegrator::new(axis(&[0.0, 10.0, 20.0]), WeightStrategy::Step);
        let r = integ.integrate(0.0, 10.0);
        assert_eq!(r.ips.indices, vec![0, 1]);
        assert!((r.ips.weights[0] - 0.5).abs() < 1e-12);
        assert!((r.ips.weights[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_descending_axis_same_weights_as_ascending_mirror() {
        let asc = AxisIntegrator::new(axis(&[0.0, 10.0, 20.0, 30.0]), WeightStrategy::Linear);
        let desc = AxisIntegrator::new(axis(&[30.0, 20.0, 10.0, 0.0]), WeightStrategy::Linear);
        let ra = asc.integrate(5.0, 25.0);
        let rd = desc.integrate(5.0, 25.0);
        assert_eq!(ra.coverage, rd.coverage);
        // Same nodes, mirrored indices.
        let mirrored: Vec<usize> = ra.ips.indices.iter().map(|&i| 3 - i).rev().collect();
        assert_eq!(rd.ips.indices, mirrored);
        let mut wa = ra.ips.weights.clone();
        wa.reverse();
        for (x, y) in wa.iter().zip(&rd.ips.weights) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_point_bbox_within_cell_bbox() {
        let integ = AxisIntegrator::new(axis(&[0.0, 1.0, 3.0, 7.0, 10.0]), WeightStrategy::Linear);
        let cell = integ.bounding_box(1.5, 8.0);
        for x in [1.5, 2.0, 3.0, 5.5, 8.0] {
            let point = integ.bounding_box(x, x);
            assert!(
                cell.contains_box(&point),
                "bbox({x},{x}) = {point:?} not within {cell:?}"
            );
        }
    }
}
