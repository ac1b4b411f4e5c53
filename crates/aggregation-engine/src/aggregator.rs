//! Clustered weighted-mean aggregation over gridded data.
//!
//! Cells are grouped by variable, clustered into I/O batches, and each
//! cluster issues one hyperslab read covering the union of its members'
//! bounding boxes. Cluster reads run in parallel and scatter results back
//! into the caller's order; a failed cluster NaNs only its own members.

use std::collections::HashMap;
use std::sync::Arc;

use agg_common::{AggError, CellRequest, DataCoverage, Result};
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{instrument, warn};

use crate::cancel::CancelGuard;
use crate::clustering::{cluster_requests, Cluster, ClusterItem};
use crate::config::EngineConfig;
use crate::dataset::{CellIntegration, DimOrder, GridDataset};
use crate::pipeline::BatchValueSource;
use crate::storage::RawArray;

pub struct ClusteringAggregator {
    dataset: Arc<GridDataset>,
    config: EngineConfig,
}

impl ClusteringAggregator {
    pub fn new(dataset: Arc<GridDataset>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { dataset, config })
    }

    /// Weighted mean of one member cell over the cluster's hyperslab.
    fn cell_mean(
        array: &RawArray,
        order: DimOrder,
        origin: &[usize],
        integ: &CellIntegration,
    ) -> f64 {
        let mut index = vec![0usize; 3];
        let mut mean = 0.0;
        for (ti, tw) in integ.time.ips.iter() {
            index[order.time] = ti - origin[order.time];
            for (lai, law) in integ.lat.ips.iter() {
                index[order.lat] = lai - origin[order.lat];
                for (loi, low) in integ.lon.ips.iter() {
                    index[order.lon] = loi - origin[order.lon];
                    mean += tw * law * low * array.get(&index);
                }
            }
        }
        mean
    }

    async fn run_cluster(
        &self,
        variable: &str,
        order: DimOrder,
        cluster: &Cluster,
        integrations: &HashMap<usize, CellIntegration>,
        cancel: &CancelGuard,
    ) -> Result<Vec<(usize, f64)>> {
        cancel.check()?;
        let bbox = &cluster.bbox;
        let mut origin = vec![0usize; 3];
        let mut shape = vec![0usize; 3];
        origin[order.time] = bbox.time.first as usize;
        origin[order.lat] = bbox.lat.first as usize;
        origin[order.lon] = bbox.lon.first as usize;
        shape[order.time] = bbox.time.extent() as usize;
        shape[order.lat] = bbox.lat.extent() as usize;
        shape[order.lon] = bbox.lon.extent() as usize;

        let array = self.dataset.store().get_data(variable, &origin, &shape).await?;
        Ok(cluster
            .members
            .iter()
            .map(|m| {
                let integ = &integrations[&m.position];
                (m.position, Self::cell_mean(&array, order, &origin, integ))
            })
            .collect())
    }
}

#[async_trait]
impl BatchValueSource for ClusteringAggregator {
    #[instrument(skip_all, fields(cells = cells.len()))]
    async fn aggregate_values(
        &self,
        cells: &[CellRequest],
        cancel: &CancelGuard,
    ) -> Result<Vec<f64>> {
        let mut out = vec![f64::NAN; cells.len()];
        let cap = self.config.cluster_element_cap()?;

        // Integrate everything up front; out-of-data cells stay NaN and
        // never reach storage.
        let mut integrations: HashMap<usize, CellIntegration> = HashMap::new();
        let mut by_variable: HashMap<&str, Vec<ClusterItem>> = HashMap::new();
        for (position, cell) in cells.iter().enumerate() {
            let integ = self.dataset.integrate(cell)?;
            if integ.coverage() == DataCoverage::OutOfData {
                continue;
            }
            by_variable
                .entry(cell.variable_name.as_str())
                .or_default()
                .push(ClusterItem {
                    position,
                    bbox: integ.bounding(),
                });
            integrations.insert(position, integ);
        }

        let mut futures = Vec::new();
        for (variable, items) in by_variable {
            cancel.check()?;
            let order = self.dataset.dim_order(variable)?;
            for cluster in cluster_requests(items, cap)? {
                let integrations = &integrations;
                futures.push(async move {
                    let result = self
                        .run_cluster(variable, order, &cluster, integrations, cancel)
                        .await;
                    (cluster, result)
                });
            }
        }

        for (cluster, result) in join_all(futures).await {
            match result {
                Ok(values) => {
                    for (position, value) in values {
                        out[position] = value;
                    }
                }
                Err(AggError::Cancelled) => return Err(AggError::Cancelled),
                Err(err) => {
                    let positions: Vec<usize> =
                        cluster.members.iter().map(|m| m.position).collect();
                    warn!(error = %err, cells = ?positions, "cluster failed, members yield NaN");
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ArrayStore, AxisSpec, DataSchema, VariableSchema};
    use agg_common::TimeSegment;
    use axis_integration::{CalendarDaysProjection, WeightStrategy};
    use chrono::NaiveDate;

    struct SliceStore {
        schema: DataSchema,
        field: RawArray, // full [time, lat, lon] cube
    }

    #[async_trait]
    impl ArrayStore for SliceStore {
        fn schema(&self) -> &DataSchema {
            &self.schema
        }

        async fn get_data(
            &self,
            _variable: &str,
            origin: &[usize],
            shape: &[usize],
        ) -> Result<RawArray> {
            let mut data = Vec::with_capacity(shape.iter().product());
            for t in 0..shape[0] {
                for la in 0..shape[1] {
                    for lo in 0..shape[2] {
                        data.push(self.field.get(&[
                            origin[0] + t,
                            origin[1] + la,
                            origin[2] + lo,
                        ]));
                    }
                }
            }
            RawArray::new(data, shape.to_vec())
        }
    }

    fn dataset(config: EngineConfig) -> (Arc<GridDataset>, ClusteringAggregator) {
        let times: Vec<f64> = (0..365).map(|d| d as f64 + 0.5).collect();
        let lats: Vec<f64> = (-8..=8).map(|i| i as f64 * 10.0).collect();
        let lons: Vec<f64> = (0..36).map(|i| i as f64 * 10.0).collect();
        // Separable synthetic field: value = lat + lon/10.
        let mut data = Vec::new();
        for _t in 0..times.len() {
            for &lat in &lats {
                for &lon in &lons {
                    data.push(lat + lon / 10.0);
                }
            }
        }
        let field = RawArray::new(data, vec![times.len(), lats.len(), lons.len()]).unwrap();
        let schema = DataSchema {
            axes: vec![
                AxisSpec {
                    name: "time".into(),
                    values: times,
                },
                AxisSpec {
                    name: "lat".into(),
                    values: lats,
                },
                AxisSpec {
                    name: "lon".into(),
                    values: lons,
                },
            ],
            variables: HashMap::from([(
                "tas".to_string(),
                VariableSchema {
                    dimensions: vec!["time".into(), "lat".into(), "lon".into()],
                },
            )]),
        };
        let store = Arc::new(SliceStore { schema, field });
        let projection =
            CalendarDaysProjection::new(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(), 1.0)
                .unwrap();
        let ds = Arc::new(
            GridDataset::new(store, WeightStrategy::Linear, Box::new(projection)).unwrap(),
        );
        let agg = ClusteringAggregator::new(ds.clone(), config).unwrap();
        (ds, agg)
    }

    fn cell(lat: f64, lon: f64) -> CellRequest {
        CellRequest::point("tas", lat, lon, TimeSegment::days(1990, 1990, 10, 20))
    }

    #[tokio::test]
    async fn test_point_means_match_field() {
        let (_ds, agg) = dataset(EngineConfig::default());
        let cells = vec![cell(0.0, 0.0), cell(35.0, 120.0), cell(-12.5, 185.0)];
        let out = agg
            .aggregate_values(&cells, &CancelGuard::none())
            .await
            .unwrap();
        assert!((out[0] - 0.0).abs() < 1e-9);
        assert!((out[1] - (35.0 + 12.0)).abs() < 1e-9);
        assert!((out[2] - (-12.5 + 18.5)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_clustering_is_value_invariant() {
        let cells: Vec<CellRequest> = (0..10)
            .map(|i| cell(-40.0 + i as f64 * 9.0, 10.0 + i as f64 * 30.0))
            .collect();

        let (_d, coarse) = dataset(EngineConfig::default());
        let one_batch = coarse
            .aggregate_values(&cells, &CancelGuard::none())
            .await
            .unwrap();

        // A tiny budget forces many clusters; values must not change.
        let tiny = EngineConfig {
            cluster_byte_budget: 16 * 8,
            ..Default::default()
        };
        let (_d, fine) = dataset(tiny);
        let many_batches = fine
            .aggregate_values(&cells, &CancelGuard::none())
            .await
            .unwrap();

        for (a, b) in one_batch.iter().zip(&many_batches) {
            assert!((a - b).abs() < 1e-9, "{a} != {b}");
        }
    }

    #[tokio::test]
    async fn test_out_of_extent_is_nan() {
        let (_ds, agg) = dataset(EngineConfig::default());
        let cells = vec![cell(89.0, 10.0), cell(0.0, 10.0)];
        let out = agg
            .aggregate_values(&cells, &CancelGuard::none())
            .await
            .unwrap();
        assert!(out[0].is_nan());
        assert!(!out[1].is_nan());
    }

    #[tokio::test]
    async fn test_nonexistent_day_cell_does_not_abort_batch() {
        let (_ds, agg) = dataset(EngineConfig::default());
        // Day 366 never exists in 1990; only that cell goes NaN.
        let bad = CellRequest::point("tas", 0.0, 0.0, TimeSegment::days(1990, 1990, 366, 366));
        let out = agg
            .aggregate_values(&[bad, cell(0.0, 10.0)], &CancelGuard::none())
            .await
            .unwrap();
        assert!(out[0].is_nan());
        assert!((out[1] - 1.0).abs() < 1e-9, "got {}", out[1]);
    }

    #[tokio::test]
    async fn test_cancelled_batch_aborts() {
        let (_ds, agg) = dataset(EngineConfig::default());
        let (handle, guard) = crate::cancel::cancellation();
        handle.cancel();
        let err = agg.aggregate_values(&[cell(0.0, 0.0)], &guard).await;
        assert!(matches!(err, Err(AggError::Cancelled)));
    }
}
