//! The raw array-store contract.
//!
//! Storage is an external collaborator: it owns retry and backoff policy,
//! and the engine treats every read as a single best-effort attempt. The
//! schema declares named axes and per-variable dimension lists in storage
//! order, which is all the engine needs to address partial reads.

use std::collections::HashMap;

use agg_common::{AggError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One named coordinate axis and its node values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub name: String,
    pub values: Vec<f64>,
}

/// A variable's dimension names, in the order the data is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSchema {
    pub dimensions: Vec<String>,
}

/// Everything the engine learns about a dataset up front.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSchema {
    pub axes: Vec<AxisSpec>,
    pub variables: HashMap<String, VariableSchema>,
}

impl DataSchema {
    pub fn axis(&self, name: &str) -> Option<&AxisSpec> {
        self.axes.iter().find(|a| a.name == name)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }
}

/// A dense row-major hyperslab returned by a partial read.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArray {
    pub data: Vec<f64>,
    pub shape: Vec<usize>,
}

impl RawArray {
    pub fn new(data: Vec<f64>, shape: Vec<usize>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(AggError::internal(format!(
                "array of {} elements does not match shape {:?}",
                data.len(),
                shape
            )));
        }
        Ok(Self { data, shape })
    }

    /// Element at a multi-dimensional index, row-major.
    pub fn get(&self, index: &[usize]) -> f64 {
        debug_assert_eq!(index.len(), self.shape.len());
        let mut flat = 0;
        for (i, (&idx, &dim)) in index.iter().zip(&self.shape).enumerate() {
            debug_assert!(idx < dim, "index {idx} out of bounds in dim {i}");
            flat = flat * dim + idx;
        }
        self.data[flat]
    }
}

/// Read access to one dataset's raw arrays.
#[async_trait]
pub trait ArrayStore: Send + Sync {
    fn schema(&self) -> &DataSchema;

    /// Read a hyperslab of `variable` starting at `origin` with the given
    /// `shape`, both in the variable's declared dimension order.
    async fn get_data(&self, variable: &str, origin: &[usize], shape: &[usize])
        -> Result<RawArray>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_array_shape_check() {
        assert!(RawArray::new(vec![0.0; 6], vec![2, 3]).is_ok());
        assert!(RawArray::new(vec![0.0; 5], vec![2, 3]).is_err());
    }

    #[test]
    fn test_row_major_indexing() {
        let arr = RawArray::new((0..24).map(|v| v as f64).collect(), vec![2, 3, 4]).unwrap();
        assert_eq!(arr.get(&[0, 0, 0]), 0.0);
        assert_eq!(arr.get(&[0, 0, 3]), 3.0);
        assert_eq!(arr.get(&[0, 2, 0]), 8.0);
        assert_eq!(arr.get(&[1, 0, 0]), 12.0);
        assert_eq!(arr.get(&[1, 2, 3]), 23.0);
    }

    #[test]
    fn test_schema_lookup() {
        let schema = DataSchema {
            axes: vec![AxisSpec {
                name: "lat".to_string(),
                values: vec![0.0, 1.0],
            }],
            variables: HashMap::from([(
                "tas".to_string(),
                VariableSchema {
                    dimensions: vec!["time".to_string(), "lat".to_string(), "lon".to_string()],
                },
            )]),
        };
        assert!(schema.axis("lat").is_some());
        assert!(schema.axis("lon").is_none());
        assert!(schema.has_variable("tas"));
        assert!(!schema.has_variable("pr"));
    }
}
