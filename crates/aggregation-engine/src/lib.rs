//! Batch aggregation and uncertainty engine.
//!
//! Ties the axis-integration, kriging and natural-neighbor crates together
//! behind two order-preserving batch contracts: weighted means and tagged
//! uncertainty. Cell requests are clustered into I/O batches, raw reads run
//! in parallel per cluster, derived objects (triangulations, fitted
//! variograms) are memoized by structural content hash, and cross-cutting
//! policy (variable presence, coverage conventions, unit transforms) is
//! layered on as decorator stages.

pub mod aggregator;
pub mod cache;
pub mod cancel;
pub mod clustering;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod pipeline;
pub mod registry;
pub mod scattered;
pub mod storage;
pub mod uncertainty;

pub use aggregator::ClusteringAggregator;
pub use cache::{ComputeCache, ContentKey};
pub use cancel::{cancellation, CancelGuard, CancelHandle};
pub use clustering::{cluster_requests, BoundingBox3D, Cluster, ClusterItem};
pub use config::EngineConfig;
pub use dataset::{CellIntegration, DimOrder, GridDataset};
pub use engine::GridEngine;
pub use pipeline::{
    BatchUncertaintySource, BatchValueSource, GridUncertaintyConventions, LinearTransform,
    UnitTransform, VariablePresenceCheck,
};
pub use registry::{DatasetHandles, HandlerFactory, HandlerRegistry};
pub use scattered::{ScatteredDataset, StationData, StationProvider};
pub use storage::{ArrayStore, AxisSpec, DataSchema, RawArray, VariableSchema};
pub use uncertainty::{KrigingUncertaintyEvaluator, StaticVariograms, VariogramProvider};
