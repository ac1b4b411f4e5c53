//! Assembled grid engine: the standard decorator composition.

use std::collections::HashMap;
use std::sync::Arc;

use agg_common::{CellRequest, Result, UncertaintyValue};
use tracing::instrument;

use crate::aggregator::ClusteringAggregator;
use crate::cancel::CancelGuard;
use crate::config::EngineConfig;
use crate::dataset::GridDataset;
use crate::pipeline::{
    BatchUncertaintySource, BatchValueSource, GridUncertaintyConventions, LinearTransform,
    UnitTransform, VariablePresenceCheck,
};
use crate::uncertainty::{KrigingUncertaintyEvaluator, VariogramProvider};

/// The standard pipeline over one gridded dataset.
///
/// Value path: presence check, unit transform, clustered aggregation.
/// Uncertainty path: presence check, coverage conventions, kriging.
pub struct GridEngine {
    values: Arc<dyn BatchValueSource>,
    uncertainty: Arc<dyn BatchUncertaintySource>,
}

impl GridEngine {
    pub fn new(
        dataset: Arc<GridDataset>,
        variograms: Arc<dyn VariogramProvider>,
        transforms: HashMap<String, UnitTransform>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let values = VariablePresenceCheck::new(
            LinearTransform::new(
                ClusteringAggregator::new(dataset.clone(), config.clone())?,
                transforms.clone(),
            ),
            dataset.clone(),
        );
        let uncertainty = VariablePresenceCheck::new(
            GridUncertaintyConventions::new(
                LinearTransform::new(
                    KrigingUncertaintyEvaluator::new(dataset.clone(), variograms, config)?,
                    transforms,
                ),
                dataset.clone(),
            ),
            dataset,
        );
        Ok(Self {
            values: Arc::new(values),
            uncertainty: Arc::new(uncertainty),
        })
    }

    /// Weighted means, one per cell, NaN for no data.
    #[instrument(skip_all, fields(cells = cells.len()))]
    pub async fn aggregate_values(
        &self,
        cells: &[CellRequest],
        cancel: &CancelGuard,
    ) -> Result<Vec<f64>> {
        self.values.aggregate_values(cells, cancel).await
    }

    /// Tagged uncertainty, one per cell.
    #[instrument(skip_all, fields(cells = cells.len()))]
    pub async fn evaluate_uncertainty(
        &self,
        cells: &[CellRequest],
        cancel: &CancelGuard,
    ) -> Result<Vec<UncertaintyValue>> {
        self.uncertainty.evaluate_uncertainty(cells, cancel).await
    }

    /// Uncertainty flattened to the legacy float sentinels: NaN for no
    /// data, `f64::MAX` for no calibrated uncertainty.
    pub async fn evaluate_uncertainty_sentinels(
        &self,
        cells: &[CellRequest],
        cancel: &CancelGuard,
    ) -> Result<Vec<f64>> {
        Ok(self
            .evaluate_uncertainty(cells, cancel)
            .await?
            .into_iter()
            .map(UncertaintyValue::to_sentinel)
            .collect())
    }
}
