//! Config-driven registry of dataset handler factories.
//!
//! Handler selection is a compile-time or configuration concern, not a
//! runtime plugin mechanism: callers register named factories once and
//! instantiate handlers by name.

use std::collections::HashMap;
use std::sync::Arc;

use agg_common::{AggError, Result};
use tracing::debug;

use crate::config::EngineConfig;
use crate::pipeline::{BatchUncertaintySource, BatchValueSource};

/// The pair of batch contracts one dataset handler exposes.
#[derive(Clone)]
pub struct DatasetHandles {
    pub values: Arc<dyn BatchValueSource>,
    pub uncertainty: Arc<dyn BatchUncertaintySource>,
}

pub type HandlerFactory = Arc<dyn Fn(&EngineConfig) -> Result<DatasetHandles> + Send + Sync>;

#[derive(Default)]
pub struct HandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: HandlerFactory) {
        let name = name.into();
        debug!(handler = %name, "registered dataset handler");
        self.factories.insert(name, factory);
    }

    pub fn create(&self, name: &str, config: &EngineConfig) -> Result<DatasetHandles> {
        let factory = self.factories.get(name).ok_or_else(|| {
            AggError::configuration(format!("no dataset handler named '{name}'"))
        })?;
        factory(config)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}
