//! Scattered-station aggregation and uncertainty.
//!
//! Station layouts change per time segment, so each distinct segment owns
//! its derived objects: a triangulation-backed interpolator and a fitted
//! variogram, both memoized in the compute cache by structural identity.
//! Triangulation build and variogram fitting are CPU-bound and run on the
//! fit pool, off the I/O scheduler. The single cache-owned build per key
//! also enforces the single-writer discipline for triangulations.

use std::sync::Arc;

use agg_common::{AggError, CellRequest, Result, TimeSegment, UncertaintyValue};
use async_trait::async_trait;
use kriging::{
    empirical_variogram, fit_or_fallback, spherical_block_variance, FitPool, GeoCell, GeoPoint,
    SphericalVariogram,
};
use natural_neighbor::{NaturalNeighborInterpolator, StationNodes};
use tracing::{debug, instrument, warn};

use crate::cache::{ComputeCache, ContentKey};
use crate::cancel::CancelGuard;
use crate::config::EngineConfig;
use crate::pipeline::{BatchUncertaintySource, BatchValueSource};

/// Station observations for one variable and time segment.
#[derive(Debug, Clone, PartialEq)]
pub struct StationData {
    pub nodes: StationNodes,
    pub values: Vec<f64>,
}

/// Collaborator supplying station observations per time segment.
#[async_trait]
pub trait StationProvider: Send + Sync {
    async fn stations(&self, variable: &str, time: &TimeSegment) -> Result<StationData>;
    fn has_variable(&self, variable: &str) -> bool;
}

const EMPIRICAL_BINS: usize = 12;

pub struct ScatteredDataset {
    provider: Arc<dyn StationProvider>,
    interpolators: ComputeCache<ContentKey, Arc<NaturalNeighborInterpolator>>,
    variograms: ComputeCache<ContentKey, Arc<SphericalVariogram>>,
    fit_pool: FitPool,
    config: EngineConfig,
}

impl ScatteredDataset {
    pub fn new(provider: Arc<dyn StationProvider>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let fit_pool = match config.fit_pool_size {
            Some(size) => FitPool::new(size),
            None => FitPool::with_default_size(),
        };
        Ok(Self {
            provider,
            interpolators: ComputeCache::new(),
            variograms: ComputeCache::new(),
            fit_pool,
            config,
        })
    }

    pub fn has_variable(&self, variable: &str) -> bool {
        self.provider.has_variable(variable)
    }

    async fn interpolator(
        &self,
        data: &StationData,
        cancel: &CancelGuard,
    ) -> Result<Arc<NaturalNeighborInterpolator>> {
        let key = ContentKey::of(&data.nodes.content_bytes());
        self.interpolators
            .get_or_compute(key, || async {
                cancel.check()?;
                let nodes = data.nodes.clone();
                let built = self
                    .fit_pool
                    .run(move || NaturalNeighborInterpolator::build(&nodes))
                    .await
                    .map_err(AggError::from)??;
                debug!(stations = data.nodes.len(), "triangulation built");
                Ok(Arc::new(built))
            })
            .await
    }

    async fn fitted_variogram(
        &self,
        variable: &str,
        data: &StationData,
        cancel: &CancelGuard,
    ) -> Result<Option<Arc<SphericalVariogram>>> {
        let value_bytes: Vec<u8> = data
            .values
            .iter()
            .flat_map(|v| v.to_bits().to_le_bytes())
            .collect();
        let key = ContentKey::of_parts(&[
            variable.as_bytes(),
            &data.nodes.content_bytes(),
            &value_bytes,
        ]);
        let fitted = self
            .variograms
            .get_or_compute(key, || async {
                cancel.check()?;
                let stations = station_points(&data.nodes);
                let values = data.values.clone();
                let model = self
                    .fit_pool
                    .run(move || {
                        let bins = empirical_variogram(&stations, &values, EMPIRICAL_BINS, None)?;
                        fit_or_fallback(&bins)
                    })
                    .await
                    .map_err(AggError::from)?;
                model.map(Arc::new).map_err(AggError::from)
            })
            .await;
        match fitted {
            Ok(model) => Ok(Some(model)),
            // Too few stations to calibrate is not an error; the mean is
            // still reported.
            Err(AggError::Internal(msg)) => {
                warn!(variable, error = %msg, "variogram unavailable for segment");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

fn station_points(nodes: &StationNodes) -> Vec<GeoPoint> {
    nodes
        .lats
        .iter()
        .zip(&nodes.lons)
        .map(|(&lat, &lon)| GeoPoint::new(lat, lon))
        .collect()
}

#[async_trait]
impl BatchValueSource for ScatteredDataset {
    #[instrument(skip_all, fields(cells = cells.len()))]
    async fn aggregate_values(
        &self,
        cells: &[CellRequest],
        cancel: &CancelGuard,
    ) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(cells.len());
        for cell in cells {
            cancel.check()?;
            let data = self
                .provider
                .stations(&cell.variable_name, &cell.time)
                .await?;
            if data.nodes.len() < 3 {
                out.push(f64::NAN);
                continue;
            }
            let interpolator = self.interpolator(&data, cancel).await?;
            let weights = interpolator.weights_for_cell(
                cell.lat_min,
                cell.lat_max,
                cell.lon_min,
                cell.lon_max,
                self.config.sub_sample_grid,
            );
            match weights {
                Some(weights) => {
                    let mean: f64 = weights
                        .iter()
                        .map(|w| w.weight * data.values[w.index])
                        .sum();
                    out.push(mean);
                }
                None => out.push(f64::NAN),
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl BatchUncertaintySource for ScatteredDataset {
    #[instrument(skip_all, fields(cells = cells.len()))]
    async fn evaluate_uncertainty(
        &self,
        cells: &[CellRequest],
        cancel: &CancelGuard,
    ) -> Result<Vec<UncertaintyValue>> {
        let mut out = Vec::with_capacity(cells.len());
        for cell in cells {
            cancel.check()?;
            let data = self
                .provider
                .stations(&cell.variable_name, &cell.time)
                .await?;
            if data.nodes.len() < 3 {
                out.push(UncertaintyValue::NoData);
                continue;
            }
            let interpolator = self.interpolator(&data, cancel).await?;
            let Some(weights) = interpolator.weights_for_cell(
                cell.lat_min,
                cell.lat_max,
                cell.lon_min,
                cell.lon_max,
                self.config.sub_sample_grid,
            ) else {
                out.push(UncertaintyValue::NoData);
                continue;
            };
            let Some(model) = self
                .fitted_variogram(&cell.variable_name, &data, cancel)
                .await?
            else {
                out.push(UncertaintyValue::NoUncertainty);
                continue;
            };

            let stations = station_points(&data.nodes);
            let nodes: Vec<GeoPoint> = weights.iter().map(|w| stations[w.index]).collect();
            let w: Vec<f64> = weights.iter().map(|w| w.weight).collect();
            let target = GeoCell::new(cell.lat_min, cell.lat_max, cell.lon_min, cell.lon_max);
            let variance = spherical_block_variance(
                model.as_ref(),
                &nodes,
                &w,
                &target,
                self.config.sub_sample_grid,
            );
            out.push(UncertaintyValue::Value(variance));
        }
        Ok(out)
    }
}
