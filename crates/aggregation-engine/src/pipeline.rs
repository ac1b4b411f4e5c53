//! Batch contracts and the decorator stages composed around them.
//!
//! Every stage maps a cell sequence to a result sequence of the same
//! length and positional order; downstream consumers zip by position.
//! Stages that exclude cells (unknown variable, uncovered region) answer
//! for those cells themselves and forward only the remainder to the inner
//! source, scattering inner results back into place.

use std::collections::HashMap;
use std::sync::Arc;

use agg_common::{CellRequest, DataCoverage, Result, UncertaintyValue};
use async_trait::async_trait;
use tracing::warn;

use crate::cancel::CancelGuard;
use crate::dataset::GridDataset;

/// Batch weighted-mean contract: one value per input cell, NaN for no data.
#[async_trait]
pub trait BatchValueSource: Send + Sync {
    async fn aggregate_values(
        &self,
        cells: &[CellRequest],
        cancel: &CancelGuard,
    ) -> Result<Vec<f64>>;
}

/// Batch uncertainty contract: one tagged variance per input cell.
#[async_trait]
pub trait BatchUncertaintySource: Send + Sync {
    async fn evaluate_uncertainty(
        &self,
        cells: &[CellRequest],
        cancel: &CancelGuard,
    ) -> Result<Vec<UncertaintyValue>>;
}

/// Forward `cells` at `positions` to `run`, scattering the results back
/// over `out` by position.
async fn forward_subset<T, F, Fut>(
    cells: &[CellRequest],
    positions: &[usize],
    out: &mut [T],
    run: F,
) -> Result<()>
where
    T: Clone,
    F: FnOnce(Vec<CellRequest>) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<T>>>,
{
    if positions.is_empty() {
        return Ok(());
    }
    let subset: Vec<CellRequest> = positions.iter().map(|&p| cells[p].clone()).collect();
    let results = run(subset).await?;
    debug_assert_eq!(results.len(), positions.len());
    for (&p, value) in positions.iter().zip(results) {
        out[p] = value;
    }
    Ok(())
}

/// Answers for cells whose variable the dataset does not declare, so inner
/// stages can assume every variable resolves.
pub struct VariablePresenceCheck<S> {
    inner: S,
    known: Arc<GridDataset>,
}

impl<S> VariablePresenceCheck<S> {
    pub fn new(inner: S, dataset: Arc<GridDataset>) -> Self {
        Self {
            inner,
            known: dataset,
        }
    }

    fn split(&self, cells: &[CellRequest]) -> (Vec<usize>, Vec<usize>) {
        let (mut known, mut unknown) = (Vec::new(), Vec::new());
        for (p, cell) in cells.iter().enumerate() {
            if self.known.has_variable(&cell.variable_name) {
                known.push(p);
            } else {
                unknown.push(p);
            }
        }
        if !unknown.is_empty() {
            warn!(
                cells = unknown.len(),
                "batch references undeclared variables"
            );
        }
        (known, unknown)
    }
}

#[async_trait]
impl<S: BatchValueSource> BatchValueSource for VariablePresenceCheck<S> {
    async fn aggregate_values(
        &self,
        cells: &[CellRequest],
        cancel: &CancelGuard,
    ) -> Result<Vec<f64>> {
        let (known, _unknown) = self.split(cells);
        let mut out = vec![f64::NAN; cells.len()];
        forward_subset(cells, &known, &mut out, |subset| async move {
            self.inner.aggregate_values(&subset, cancel).await
        })
        .await?;
        Ok(out)
    }
}

#[async_trait]
impl<S: BatchUncertaintySource> BatchUncertaintySource for VariablePresenceCheck<S> {
    async fn evaluate_uncertainty(
        &self,
        cells: &[CellRequest],
        cancel: &CancelGuard,
    ) -> Result<Vec<UncertaintyValue>> {
        let (known, _unknown) = self.split(cells);
        let mut out = vec![UncertaintyValue::NoData; cells.len()];
        forward_subset(cells, &known, &mut out, |subset| async move {
            self.inner.evaluate_uncertainty(&subset, cancel).await
        })
        .await?;
        Ok(out)
    }
}

/// Applies the tri-state coverage convention on the uncertainty path:
/// out-of-data cells are no-data, partially covered cells get no calibrated
/// uncertainty, and only fully covered cells reach the inner evaluator.
pub struct GridUncertaintyConventions<S> {
    inner: S,
    dataset: Arc<GridDataset>,
}

impl<S> GridUncertaintyConventions<S> {
    pub fn new(inner: S, dataset: Arc<GridDataset>) -> Self {
        Self { inner, dataset }
    }
}

#[async_trait]
impl<S: BatchUncertaintySource> BatchUncertaintySource for GridUncertaintyConventions<S> {
    async fn evaluate_uncertainty(
        &self,
        cells: &[CellRequest],
        cancel: &CancelGuard,
    ) -> Result<Vec<UncertaintyValue>> {
        let mut out = vec![UncertaintyValue::NoData; cells.len()];
        let mut covered = Vec::new();
        for (p, cell) in cells.iter().enumerate() {
            match self.dataset.integrate(cell)?.coverage() {
                DataCoverage::OutOfData => {}
                DataCoverage::DataWithoutUncertainty => out[p] = UncertaintyValue::NoUncertainty,
                DataCoverage::DataWithUncertainty => covered.push(p),
            }
        }
        forward_subset(cells, &covered, &mut out, |subset| async move {
            self.inner.evaluate_uncertainty(&subset, cancel).await
        })
        .await?;
        Ok(out)
    }
}

/// Per-variable unit conversion `scale * x + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitTransform {
    pub scale: f64,
    pub offset: f64,
}

impl Default for UnitTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
        }
    }
}

/// Applies unit transforms after the inner source: values get the affine
/// map, variances scale quadratically and ignore the offset.
pub struct LinearTransform<S> {
    inner: S,
    transforms: HashMap<String, UnitTransform>,
}

impl<S> LinearTransform<S> {
    pub fn new(inner: S, transforms: HashMap<String, UnitTransform>) -> Self {
        Self { inner, transforms }
    }

    fn transform_for(&self, variable: &str) -> UnitTransform {
        self.transforms.get(variable).copied().unwrap_or_default()
    }
}

#[async_trait]
impl<S: BatchValueSource> BatchValueSource for LinearTransform<S> {
    async fn aggregate_values(
        &self,
        cells: &[CellRequest],
        cancel: &CancelGuard,
    ) -> Result<Vec<f64>> {
        let mut values = self.inner.aggregate_values(cells, cancel).await?;
        for (cell, value) in cells.iter().zip(&mut values) {
            let t = self.transform_for(&cell.variable_name);
            *value = t.scale * *value + t.offset; // NaN stays NaN
        }
        Ok(values)
    }
}

#[async_trait]
impl<S: BatchUncertaintySource> BatchUncertaintySource for LinearTransform<S> {
    async fn evaluate_uncertainty(
        &self,
        cells: &[CellRequest],
        cancel: &CancelGuard,
    ) -> Result<Vec<UncertaintyValue>> {
        let mut values = self.inner.evaluate_uncertainty(cells, cancel).await?;
        for (cell, value) in cells.iter().zip(&mut values) {
            let t = self.transform_for(&cell.variable_name);
            *value = value.scale_variance(t.scale);
        }
        Ok(values)
    }
}
