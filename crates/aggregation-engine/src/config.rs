//! Engine configuration.

use agg_common::{AggError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tunables for clustering, block discretization and fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Byte budget for one cluster's raw read.
    pub cluster_byte_budget: u64,
    /// Size of one stored element in bytes.
    pub element_size_bytes: u64,
    /// Side length of the block-kriging sub-sample grid.
    pub sub_sample_grid: usize,
    /// Maximum integration points kept per axis for variance estimation.
    pub thinning_cap: usize,
    /// Concurrent variogram fits; `None` means core count.
    pub fit_pool_size: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cluster_byte_budget: 64 * 1024 * 1024,
            element_size_bytes: 8,
            sub_sample_grid: 4,
            thinning_cap: 32,
            fit_pool_size: None,
        }
    }
}

impl EngineConfig {
    /// Build from `AGG_ENGINE_*` environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = read_env("AGG_ENGINE_CLUSTER_BYTE_BUDGET") {
            config.cluster_byte_budget = v;
        }
        if let Some(v) = read_env("AGG_ENGINE_ELEMENT_SIZE_BYTES") {
            config.element_size_bytes = v;
        }
        if let Some(v) = read_env("AGG_ENGINE_SUB_SAMPLE_GRID") {
            config.sub_sample_grid = v;
        }
        if let Some(v) = read_env("AGG_ENGINE_THINNING_CAP") {
            config.thinning_cap = v;
        }
        if let Some(v) = read_env("AGG_ENGINE_FIT_POOL_SIZE") {
            config.fit_pool_size = Some(v);
        }
        debug!(?config, "engine configuration loaded");
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.cluster_byte_budget == 0 {
            return Err(AggError::configuration("cluster_byte_budget must be > 0"));
        }
        if self.element_size_bytes == 0 {
            return Err(AggError::configuration("element_size_bytes must be > 0"));
        }
        if self.sub_sample_grid == 0 {
            return Err(AggError::configuration("sub_sample_grid must be > 0"));
        }
        if self.thinning_cap == 0 {
            return Err(AggError::configuration("thinning_cap must be > 0"));
        }
        if self.fit_pool_size == Some(0) {
            return Err(AggError::configuration("fit_pool_size must be > 0"));
        }
        Ok(())
    }

    /// Cluster cap in elements: byte budget over element size.
    pub fn cluster_element_cap(&self) -> Result<u64> {
        self.validate()?;
        let cap = self.cluster_byte_budget / self.element_size_bytes;
        if cap == 0 {
            return Err(AggError::configuration(format!(
                "byte budget {} cannot hold a single {}-byte element",
                self.cluster_byte_budget, self.element_size_bytes
            )));
        }
        Ok(cap)
    }
}

fn read_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
