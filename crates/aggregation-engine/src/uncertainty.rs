//! Kriging-based uncertainty evaluation for gridded data.

use std::collections::HashMap;
use std::sync::Arc;

use agg_common::{CellRequest, DataCoverage, Result, UncertaintyValue};
use async_trait::async_trait;
use kriging::{
    separable_grid_variance, spherical_block_variance, temporal_block_variance, GeoCell, GeoPoint,
    Variogram,
};
use tracing::instrument;

use crate::cancel::CancelGuard;
use crate::config::EngineConfig;
use crate::dataset::GridDataset;
use crate::pipeline::BatchUncertaintySource;

/// Supplies per-variable variogram metadata. A `None` means the variable
/// has no calibrated model; its uncertainty is reported as unavailable,
/// never as an error.
pub trait VariogramProvider: Send + Sync {
    fn spatial(&self, variable: &str) -> Option<Arc<dyn Variogram>>;
    fn temporal(&self, variable: &str) -> Option<Arc<dyn Variogram>>;
}

/// Static provider backed by maps, for configuration-driven wiring.
#[derive(Default)]
pub struct StaticVariograms {
    spatial: HashMap<String, Arc<dyn Variogram>>,
    temporal: HashMap<String, Arc<dyn Variogram>>,
}

impl StaticVariograms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spatial(mut self, variable: impl Into<String>, v: Arc<dyn Variogram>) -> Self {
        self.spatial.insert(variable.into(), v);
        self
    }

    pub fn with_temporal(mut self, variable: impl Into<String>, v: Arc<dyn Variogram>) -> Self {
        self.temporal.insert(variable.into(), v);
        self
    }
}

impl VariogramProvider for StaticVariograms {
    fn spatial(&self, variable: &str) -> Option<Arc<dyn Variogram>> {
        self.spatial.get(variable).cloned()
    }

    fn temporal(&self, variable: &str) -> Option<Arc<dyn Variogram>> {
        self.temporal.get(variable).cloned()
    }
}

/// Terminal uncertainty source: block kriging variance from the same
/// integration points the mean uses, thinned to the configured cap.
///
/// Spatial and temporal variances are computed independently and combined
/// under the separability assumption; a variable with no spatial variogram
/// yields `NoUncertainty`, one with no temporal variogram gets the spatial
/// variance alone.
pub struct KrigingUncertaintyEvaluator {
    dataset: Arc<GridDataset>,
    variograms: Arc<dyn VariogramProvider>,
    config: EngineConfig,
}

impl KrigingUncertaintyEvaluator {
    pub fn new(
        dataset: Arc<GridDataset>,
        variograms: Arc<dyn VariogramProvider>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            dataset,
            variograms,
            config,
        })
    }

    fn evaluate_cell(&self, cell: &CellRequest) -> Result<UncertaintyValue> {
        let integ = self.dataset.integrate(cell)?;
        match integ.coverage() {
            DataCoverage::OutOfData => return Ok(UncertaintyValue::NoData),
            DataCoverage::DataWithoutUncertainty => return Ok(UncertaintyValue::NoUncertainty),
            DataCoverage::DataWithUncertainty => {}
        }
        let Some(spatial_model) = self.variograms.spatial(&cell.variable_name) else {
            return Ok(UncertaintyValue::NoUncertainty);
        };

        // Thinned IPs are a variance-only approximation; the mean always
        // uses the full set.
        let cap = self.config.thinning_cap;
        let lat_ips = integ.lat.ips.thin(cap);
        let lon_ips = integ.lon.ips.thin(cap);
        let time_ips = integ.time.ips.thin(cap);

        let mut nodes = Vec::with_capacity(lat_ips.len() * lon_ips.len());
        let mut weights = Vec::with_capacity(nodes.capacity());
        for (lai, law) in lat_ips.iter() {
            let lat = self.dataset.lat_position(lai);
            for (loi, low) in lon_ips.iter() {
                nodes.push(GeoPoint::new(lat, self.dataset.lon_position(loi)));
                weights.push(law * low);
            }
        }
        let target = GeoCell::new(cell.lat_min, cell.lat_max, cell.lon_min, cell.lon_max);
        let spatial_var = spherical_block_variance(
            spatial_model.as_ref(),
            &nodes,
            &weights,
            &target,
            self.config.sub_sample_grid,
        );

        let variance = match self.variograms.temporal(&cell.variable_name) {
            Some(temporal_model) => {
                let time_nodes: Vec<(f64, f64)> = time_ips
                    .iter()
                    .map(|(i, w)| (self.dataset.time_position(i), w))
                    .collect();
                // The node span stands in for the projected interval; the
                // step cells around the end nodes cover the remainder.
                let interval = time_nodes
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(t, _)| {
                        (lo.min(t), hi.max(t))
                    });
                let temporal_var = temporal_block_variance(
                    temporal_model.as_ref(),
                    &time_nodes,
                    interval,
                    self.config.sub_sample_grid * self.config.sub_sample_grid,
                );
                separable_grid_variance(spatial_var, temporal_var, temporal_model.sill())
            }
            None => spatial_var,
        };
        Ok(UncertaintyValue::Value(variance))
    }
}

#[async_trait]
impl BatchUncertaintySource for KrigingUncertaintyEvaluator {
    #[instrument(skip_all, fields(cells = cells.len()))]
    async fn evaluate_uncertainty(
        &self,
        cells: &[CellRequest],
        cancel: &CancelGuard,
    ) -> Result<Vec<UncertaintyValue>> {
        let mut out = Vec::with_capacity(cells.len());
        for cell in cells {
            cancel.check()?;
            out.push(self.evaluate_cell(cell)?);
        }
        Ok(out)
    }
}
