//! An in-memory [`ArrayStore`] backed by full row-major cubes.
//!
//! Supports injected read failures so callers can exercise partial-batch
//! behavior without a flaky backend.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use agg_common::{AggError, Result};
use aggregation_engine::{ArrayStore, DataSchema, RawArray};
use async_trait::async_trait;

/// Holds one full cube per variable and serves arbitrary hyperslabs.
pub struct InMemoryStore {
    schema: DataSchema,
    cubes: HashMap<String, RawArray>,
    failing: HashSet<String>,
    fail_containing_origin: Option<Vec<usize>>,
    reads: AtomicUsize,
}

impl InMemoryStore {
    pub fn new(schema: DataSchema) -> Self {
        Self {
            schema,
            cubes: HashMap::new(),
            failing: HashSet::new(),
            fail_containing_origin: None,
            reads: AtomicUsize::new(0),
        }
    }

    /// Attach the full cube for `variable`. The shape must match the
    /// declared dimensions against the schema's axis lengths.
    pub fn with_cube(mut self, variable: &str, data: Vec<f64>) -> Self {
        let dims = &self.schema.variables[variable].dimensions;
        let shape: Vec<usize> = dims
            .iter()
            .map(|d| self.schema.axis(d).expect("axis declared in schema").values.len())
            .collect();
        let cube = RawArray::new(data, shape).expect("cube matches schema shape");
        self.cubes.insert(variable.to_string(), cube);
        self
    }

    /// Every read of `variable` fails with a storage error.
    pub fn with_failing_variable(mut self, variable: &str) -> Self {
        self.failing.insert(variable.to_string());
        self
    }

    /// Reads whose slab contains the given full-cube index fail. Lets a
    /// test break exactly the cluster covering one cell.
    pub fn with_failure_at(mut self, index: Vec<usize>) -> Self {
        self.fail_containing_origin = Some(index);
        self
    }

    /// Number of `get_data` calls served so far, including failed ones.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArrayStore for InMemoryStore {
    fn schema(&self) -> &DataSchema {
        &self.schema
    }

    async fn get_data(
        &self,
        variable: &str,
        origin: &[usize],
        shape: &[usize],
    ) -> Result<RawArray> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(variable) {
            return Err(AggError::storage(format!("injected failure for {variable}")));
        }
        if let Some(target) = &self.fail_containing_origin {
            let hit = target.len() == origin.len()
                && target
                    .iter()
                    .zip(origin.iter().zip(shape))
                    .all(|(&t, (&o, &s))| t >= o && t < o + s);
            if hit {
                return Err(AggError::storage(format!(
                    "injected failure for slab at {origin:?}"
                )));
            }
        }
        let cube = self
            .cubes
            .get(variable)
            .ok_or_else(|| AggError::storage(format!("no cube for {variable}")))?;
        if origin.len() != cube.shape.len() || shape.len() != cube.shape.len() {
            return Err(AggError::storage(format!(
                "rank mismatch: cube is {:?}, requested {origin:?}+{shape:?}",
                cube.shape
            )));
        }
        for ((&o, &s), &dim) in origin.iter().zip(shape).zip(&cube.shape) {
            if o + s > dim {
                return Err(AggError::storage(format!(
                    "slab {origin:?}+{shape:?} exceeds cube {:?}",
                    cube.shape
                )));
            }
        }
        let mut data = Vec::with_capacity(shape.iter().product());
        let mut index = vec![0usize; shape.len()];
        'outer: loop {
            let full: Vec<usize> = index.iter().zip(origin).map(|(&i, &o)| i + o).collect();
            data.push(cube.get(&full));
            for d in (0..shape.len()).rev() {
                index[d] += 1;
                if index[d] < shape[d] {
                    continue 'outer;
                }
                index[d] = 0;
                if d == 0 {
                    break 'outer;
                }
            }
        }
        RawArray::new(data, shape.to_vec())
    }
}
