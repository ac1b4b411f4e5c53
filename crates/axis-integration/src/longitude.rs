//! Cyclic longitude axes.
//!
//! A longitude axis wraps at the 360-degree period: a request for
//! `[350, 10]` crosses the date line and must draw weights from both ends
//! of the stored grid. The axis is unwrapped into a tripled virtual axis
//! (one copy shifted down a period, one in place, one shifted up), the
//! ordinary [`AxisIntegrator`] runs on the virtual axis, and the resulting
//! virtual indices are folded back modulo the grid size.

use agg_common::DataCoverage;

use crate::axis::{AxisIntegration, AxisIntegrator, CoordinateAxis, WeightStrategy};
use crate::error::{AxisError, Result};
use crate::ips::IntegrationPoints;

const PERIOD: f64 = 360.0;

/// A longitude axis with period-360 wrapping.
#[derive(Debug, Clone)]
pub struct CycledLongitudeAxis {
    /// The stored grid, ascending.
    base: CoordinateAxis,
    /// Integrator over the tripled virtual axis.
    virtual_integrator: AxisIntegrator,
}

impl CycledLongitudeAxis {
    pub fn new(raw: Vec<f64>, strategy: WeightStrategy) -> Result<Self> {
        let base = CoordinateAxis::new(raw)?;
        let v = base.values();
        let n = v.len();
        if v[n - 1] - v[0] >= PERIOD {
            return Err(AxisError::invalid_axis(format!(
                "longitude axis spans {} degrees, must be under {PERIOD}",
                v[n - 1] - v[0]
            )));
        }
        let mut tripled = Vec::with_capacity(3 * n);
        for shift in [-PERIOD, 0.0, PERIOD] {
            tripled.extend(v.iter().map(|x| x + shift));
        }
        let virtual_axis = CoordinateAxis::new(tripled)?;
        Ok(Self {
            base,
            virtual_integrator: AxisIntegrator::new(virtual_axis, strategy),
        })
    }

    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Node coordinate in the original axis order.
    pub fn position(&self, original_index: usize) -> f64 {
        self.base.position(original_index)
    }

    /// Integration points for a single longitude.
    pub fn integrate_point(&self, lon: f64) -> AxisIntegration {
        self.integrate(lon, lon)
    }

    /// Integration points for the longitude interval `[min, max]`.
    ///
    /// `min > max` means the interval crosses the wrap point. A span of a
    /// full period or more covers the whole axis. Longitude is cyclic, so
    /// the result is never `OutOfData` and never partial.
    pub fn integrate(&self, min: f64, max: f64) -> AxisIntegration {
        let span = if max >= min {
            max - min
        } else {
            max - min + PERIOD
        };
        if span >= PERIOD {
            return AxisIntegration {
                ips: self.whole_axis_weights(),
                coverage: DataCoverage::DataWithUncertainty,
            };
        }

        // Place the interval start inside the central copy of the grid.
        let v0 = self.base.values()[0];
        let mut a = min - PERIOD * ((min - v0) / PERIOD).floor();
        let mut b = a + span;
        let virtual_last = *self
            .virtual_integrator
            .axis()
            .values()
            .last()
            .unwrap_or(&v0);
        if b > virtual_last {
            a -= PERIOD;
            b -= PERIOD;
        }

        let virtual_result = self.virtual_integrator.integrate(a, b);
        debug_assert_ne!(virtual_result.coverage, DataCoverage::OutOfData);
        AxisIntegration {
            ips: self.fold(&virtual_result.ips),
            coverage: DataCoverage::DataWithUncertainty,
        }
    }

    /// Fold virtual indices back onto the stored grid, merging duplicates.
    fn fold(&self, virtual_ips: &IntegrationPoints) -> IntegrationPoints {
        let n = self.base.len();
        let mut acc = vec![0.0f64; n];
        for (j, w) in virtual_ips.iter() {
            acc[j % n] += w;
        }
        let mut pairs: Vec<(usize, f64)> = acc
            .into_iter()
            .enumerate()
            .filter(|(_, w)| *w > 0.0)
            .map(|(i, w)| (self.base.original_index(i), w))
            .collect();
        pairs.sort_by_key(|(i, _)| *i);
        let (indices, weights) = pairs.into_iter().map(|(i, w)| (i, w)).unzip();
        IntegrationPoints::new(weights, indices)
    }

    /// Whole-axis mean: every node weighted by its cyclic cell width.
    fn whole_axis_weights(&self) -> IntegrationPoints {
        let v = self.base.values();
        let n = v.len();
        let mut pairs: Vec<(usize, f64)> = (0..n)
            .map(|i| {
                let prev = if i == 0 { v[n - 1] - PERIOD } else { v[i - 1] };
                let next = if i == n - 1 { v[0] + PERIOD } else { v[i + 1] };
                (self.base.original_index(i), (next - prev) / (2.0 * PERIOD))
            })
            .collect();
        pairs.sort_by_key(|(i, _)| *i);
        let (indices, weights) = pairs.into_iter().map(|(i, w)| (i, w)).unzip();
        IntegrationPoints::new(weights, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eight_point_axis(strategy: WeightStrategy) -> CycledLongitudeAxis {
        CycledLongitudeAxis::new(
            (0..8).map(|i| i as f64 * 45.0).collect(),
            strategy,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_axis_spanning_full_period() {
        let result = CycledLongitudeAxis::new(vec![0.0, 180.0, 360.0], WeightStrategy::Linear);
        assert!(result.is_err());
    }

    #[test]
    fn test_plain_interval_matches_linear_axis() {
        let cyc = eight_point_axis(WeightStrategy::Linear);
        let plain = AxisIntegrator::new(
            CoordinateAxis::new((0..8).map(|i| i as f64 * 45.0).collect()).unwrap(),
            WeightStrategy::Linear,
        );
        let rc = cyc.integrate(60.0, 200.0);
        let rp = plain.integrate(60.0, 200.0);
        assert_eq!(rc.ips.indices, rp.ips.indices);
        for (a, b) in rc.ips.weights.iter().zip(&rp.ips.weights) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_wrap_crossing_interval() {
        for strategy in [WeightStrategy::Step, WeightStrategy::Linear] {
            let axis = eight_point_axis(strategy);
            let r = axis.integrate(350.0, 10.0);
            assert_eq!(r.coverage, DataCoverage::DataWithUncertainty);
            assert!((r.ips.weight_sum() - 1.0).abs() < 1e-10);
            assert!(r.ips.indices.contains(&7), "{strategy:?}: {:?}", r.ips.indices);
            assert!(r.ips.indices.contains(&0), "{strategy:?}: {:?}", r.ips.indices);
        }
    }

    #[test]
    fn test_point_beyond_last_node_wraps() {
        let axis = eight_point_axis(WeightStrategy::Linear);
        // 337.5 is halfway between node 7 (315) and node 0 wrapped to 360.
        let r = axis.integrate_point(337.5);
        assert_eq!(r.ips.indices, vec![0, 7]);
        assert!((r.ips.weights[0] - 0.5).abs() < 1e-12);
        assert!((r.ips.weights[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_negative_longitude_folds_in() {
        let axis = eight_point_axis(WeightStrategy::Linear);
        let a = axis.integrate_point(-90.0);
        let b = axis.integrate_point(270.0);
        assert_eq!(a.ips, b.ips);
        assert_eq!(a.ips.indices, vec![6]);
    }

    #[test]
    fn test_whole_globe_uniform_grid() {
        let axis = eight_point_axis(WeightStrategy::Linear);
        let r = axis.integrate(0.0, 360.0);
        assert_eq!(r.coverage, DataCoverage::DataWithUncertainty);
        assert_eq!(r.ips.len(), 8);
        assert!((r.ips.weight_sum() - 1.0).abs() < 1e-12);
        for w in &r.ips.weights {
            assert!((w - 0.125).abs() < 1e-12);
        }
    }

    #[test]
    fn test_whole_globe_nonuniform_grid_weights_by_cell_width() {
        let axis =
            CycledLongitudeAxis::new(vec![0.0, 90.0, 180.0, 270.0], WeightStrategy::Step).unwrap();
        let narrow =
            CycledLongitudeAxis::new(vec![0.0, 10.0, 180.0, 270.0], WeightStrategy::Step).unwrap();
        let u = axis.integrate(10.0, 500.0);
        let v = narrow.integrate(10.0, 500.0);
        assert!((u.ips.weight_sum() - 1.0).abs() < 1e-12);
        assert!((v.ips.weight_sum() - 1.0).abs() < 1e-12);
        // Node 1 sits in a much narrower cyclic cell on the second grid.
        assert!(v.ips.weights[1] < u.ips.weights[1]);
    }
}
