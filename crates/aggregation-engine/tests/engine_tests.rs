//! End-to-end tests of the assembled grid engine over an in-memory store.
//!
//! Fields are separable so the exact weighted mean of any cell is known in
//! closed form.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agg_common::{AggError, CellRequest, Result, TimeSegment, UncertaintyValue};
use aggregation_engine::{
    cancellation, AxisSpec, BatchUncertaintySource, CancelGuard, DataSchema, EngineConfig,
    GridDataset, GridEngine, GridUncertaintyConventions, StaticVariograms, UnitTransform,
    VariableSchema,
};
use async_trait::async_trait;
use axis_integration::{CalendarDaysProjection, WeightStrategy};
use chrono::NaiveDate;
use kriging::SphericalVariogram;
use test_utils::{daily_time_axis, global_lat_axis, global_lon_axis, separable_field, InMemoryStore};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn schema() -> DataSchema {
    DataSchema {
        axes: vec![
            AxisSpec {
                name: "time".to_string(),
                values: daily_time_axis(365),
            },
            AxisSpec {
                name: "lat".to_string(),
                values: global_lat_axis(),
            },
            AxisSpec {
                name: "lon".to_string(),
                values: global_lon_axis(),
            },
        ],
        variables: HashMap::from([(
            "tas".to_string(),
            VariableSchema {
                dimensions: vec!["time".to_string(), "lat".to_string(), "lon".to_string()],
            },
        )]),
    }
}

/// Cube of `lat + lon / 10`, constant in time.
fn store() -> InMemoryStore {
    let cube = separable_field(
        &daily_time_axis(365),
        &global_lat_axis(),
        &global_lon_axis(),
        |_t| 0.0,
        |lat| lat,
        |lon| lon / 10.0,
    );
    InMemoryStore::new(schema()).with_cube("tas", cube)
}

fn engine_with(store: InMemoryStore, config: EngineConfig) -> GridEngine {
    engine_full(store, config, StaticVariograms::new(), HashMap::new())
}

fn engine_full(
    store: InMemoryStore,
    config: EngineConfig,
    variograms: StaticVariograms,
    transforms: HashMap<String, UnitTransform>,
) -> GridEngine {
    let projection =
        CalendarDaysProjection::new(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(), 1.0).unwrap();
    let dataset = Arc::new(
        GridDataset::new(Arc::new(store), WeightStrategy::Linear, Box::new(projection)).unwrap(),
    );
    GridEngine::new(dataset, Arc::new(variograms), transforms, config).unwrap()
}

fn summer() -> TimeSegment {
    TimeSegment::days(1990, 1990, 100, 150)
}

#[tokio::test]
async fn test_point_mean_matches_field() {
    let engine = engine_with(store(), EngineConfig::default());
    let cells = vec![
        CellRequest::point("tas", 10.0, 40.0, summer()),
        CellRequest::point("tas", -40.0, 200.0, summer()),
    ];
    let values = engine
        .aggregate_values(&cells, &CancelGuard::none())
        .await
        .unwrap();
    assert!((values[0] - 14.0).abs() < 1e-9, "got {}", values[0]);
    assert!((values[1] - (-20.0)).abs() < 1e-9, "got {}", values[1]);
}

#[tokio::test]
async fn test_area_mean_is_exact_for_linear_field() {
    // Trapezoidal weights integrate a linear field exactly, so the mean of
    // lat over [0, 20] is 10 and of lon/10 over [30, 50] is 4.
    let engine = engine_with(store(), EngineConfig::default());
    let cell = CellRequest::new("tas", 0.0, 20.0, 30.0, 50.0, summer());
    let values = engine
        .aggregate_values(&[cell], &CancelGuard::none())
        .await
        .unwrap();
    assert!((values[0] - 14.0).abs() < 1e-9, "got {}", values[0]);
}

#[tokio::test]
async fn test_dateline_cell_folds_weights() {
    // [350, 10] spans the wrap: nodes 350, 0 and 10 get trapezoid weights
    // 1/4, 1/2, 1/4 against field values 35, 0 and 1.
    let engine = engine_with(store(), EngineConfig::default());
    let cell = CellRequest::new("tas", 10.0, 10.0, 350.0, 10.0, summer());
    let values = engine
        .aggregate_values(&[cell], &CancelGuard::none())
        .await
        .unwrap();
    let expected = 10.0 + (0.25 * 35.0 + 0.5 * 0.0 + 0.25 * 1.0);
    assert!((values[0] - expected).abs() < 1e-9, "got {}", values[0]);
}

#[tokio::test]
async fn test_unknown_variable_stays_nan_in_order() {
    let engine = engine_with(store(), EngineConfig::default());
    let cells = vec![
        CellRequest::point("tas", 10.0, 40.0, summer()),
        CellRequest::point("pr", 10.0, 40.0, summer()),
        CellRequest::point("tas", -40.0, 200.0, summer()),
    ];
    let values = engine
        .aggregate_values(&cells, &CancelGuard::none())
        .await
        .unwrap();
    assert_eq!(values.len(), 3);
    assert!((values[0] - 14.0).abs() < 1e-9);
    assert!(values[1].is_nan());
    assert!((values[2] - (-20.0)).abs() < 1e-9);

    let vars = engine
        .evaluate_uncertainty_sentinels(&cells, &CancelGuard::none())
        .await
        .unwrap();
    assert!(vars[1].is_nan());
}

#[tokio::test]
async fn test_unit_transform_applied_to_means() {
    let transforms = HashMap::from([(
        "tas".to_string(),
        UnitTransform {
            scale: 1.8,
            offset: 32.0,
        },
    )]);
    let engine = engine_full(
        store(),
        EngineConfig::default(),
        StaticVariograms::new(),
        transforms,
    );
    let cell = CellRequest::point("tas", 10.0, 40.0, summer());
    let values = engine
        .aggregate_values(&[cell], &CancelGuard::none())
        .await
        .unwrap();
    assert!((values[0] - (1.8 * 14.0 + 32.0)).abs() < 1e-9, "got {}", values[0]);
}

#[tokio::test]
async fn test_failed_cluster_isolates_to_its_members() {
    init_tracing();
    // Budget of one year per cluster keeps the two points in separate
    // clusters; the injected failure hits only the first one's slab.
    // Day 100 is time index 99; lat 10 is index 9, lon 40 is index 4.
    let store = store().with_failure_at(vec![99, 9, 4]);
    let config = EngineConfig {
        cluster_byte_budget: 365 * 8,
        ..Default::default()
    };
    let engine = engine_with(store, config);
    let cells = vec![
        CellRequest::point("tas", 10.0, 40.0, summer()),
        CellRequest::point("tas", -40.0, 200.0, summer()),
    ];
    let values = engine
        .aggregate_values(&cells, &CancelGuard::none())
        .await
        .unwrap();
    assert!(values[0].is_nan(), "failed cluster should yield NaN");
    assert!((values[1] - (-20.0)).abs() < 1e-9, "got {}", values[1]);
}

#[tokio::test]
async fn test_failing_variable_nans_only_its_cells() {
    init_tracing();
    // Two variables share the grid; every read of one of them fails.
    let mut schema = schema();
    schema.variables.insert(
        "pr".to_string(),
        VariableSchema {
            dimensions: vec!["time".to_string(), "lat".to_string(), "lon".to_string()],
        },
    );
    let cube = separable_field(
        &daily_time_axis(365),
        &global_lat_axis(),
        &global_lon_axis(),
        |_t| 0.0,
        |lat| lat,
        |lon| lon / 10.0,
    );
    let store = InMemoryStore::new(schema)
        .with_cube("tas", cube.clone())
        .with_cube("pr", cube)
        .with_failing_variable("pr");
    let engine = engine_with(store, EngineConfig::default());
    let cells = vec![
        CellRequest::point("pr", 10.0, 40.0, summer()),
        CellRequest::point("tas", 10.0, 40.0, summer()),
        CellRequest::point("pr", -40.0, 200.0, summer()),
    ];
    let values = engine
        .aggregate_values(&cells, &CancelGuard::none())
        .await
        .unwrap();
    assert!(values[0].is_nan());
    assert!((values[1] - 14.0).abs() < 1e-9, "got {}", values[1]);
    assert!(values[2].is_nan());
}

#[tokio::test]
async fn test_means_invariant_under_cluster_budget() {
    let cells = vec![
        CellRequest::new("tas", 0.0, 20.0, 30.0, 50.0, summer()),
        CellRequest::new("tas", 10.0, 30.0, 40.0, 60.0, summer()),
        CellRequest::point("tas", -40.0, 200.0, summer()),
    ];
    let coarse = engine_with(store(), EngineConfig::default())
        .aggregate_values(&cells, &CancelGuard::none())
        .await
        .unwrap();
    let tiny_budget = EngineConfig {
        cluster_byte_budget: 8,
        ..Default::default()
    };
    let fine = engine_with(store(), tiny_budget)
        .aggregate_values(&cells, &CancelGuard::none())
        .await
        .unwrap();
    for (a, b) in coarse.iter().zip(&fine) {
        assert!((a - b).abs() < 1e-12, "{a} != {b}");
    }
}

#[tokio::test]
async fn test_uncertainty_sentinel_conventions() {
    let variograms = StaticVariograms::new()
        .with_spatial("tas", Arc::new(SphericalVariogram::new(0.05, 1.0, 2000.0).unwrap()));
    let engine = engine_full(store(), EngineConfig::default(), variograms, HashMap::new());
    let cells = vec![
        // Fully covered, calibrated model: a finite variance.
        CellRequest::new("tas", 0.0, 20.0, 30.0, 50.0, summer()),
        // Pole-ward of the last node: out of data.
        CellRequest::point("tas", 89.0, 0.0, summer()),
        // Straddles the northern extent: partial coverage.
        CellRequest::new("tas", 80.0, 89.0, 30.0, 50.0, summer()),
    ];
    let vars = engine
        .evaluate_uncertainty_sentinels(&cells, &CancelGuard::none())
        .await
        .unwrap();
    assert!(vars[0].is_finite() && vars[0] >= 0.0, "got {}", vars[0]);
    assert!(vars[1].is_nan());
    assert_eq!(vars[2], f64::MAX);
}

struct RecordingSource {
    cells_seen: Arc<AtomicUsize>,
}

#[async_trait]
impl BatchUncertaintySource for RecordingSource {
    async fn evaluate_uncertainty(
        &self,
        cells: &[CellRequest],
        _cancel: &CancelGuard,
    ) -> Result<Vec<UncertaintyValue>> {
        self.cells_seen.fetch_add(cells.len(), Ordering::SeqCst);
        Ok(vec![UncertaintyValue::Value(1.0); cells.len()])
    }
}

#[tokio::test]
async fn test_conventions_forward_only_covered_cells() {
    let projection =
        CalendarDaysProjection::new(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(), 1.0).unwrap();
    let dataset = Arc::new(
        GridDataset::new(
            Arc::new(store()),
            WeightStrategy::Linear,
            Box::new(projection),
        )
        .unwrap(),
    );
    let cells_seen = Arc::new(AtomicUsize::new(0));
    let stage = GridUncertaintyConventions::new(
        RecordingSource {
            cells_seen: cells_seen.clone(),
        },
        dataset,
    );
    let cells = vec![
        CellRequest::new("tas", 0.0, 20.0, 30.0, 50.0, summer()),
        CellRequest::point("tas", 89.0, 0.0, summer()),
        CellRequest::new("tas", 80.0, 89.0, 30.0, 50.0, summer()),
    ];
    let out = stage
        .evaluate_uncertainty(&cells, &CancelGuard::none())
        .await
        .unwrap();
    assert_eq!(out[0], UncertaintyValue::Value(1.0));
    assert_eq!(out[1], UncertaintyValue::NoData);
    assert_eq!(out[2], UncertaintyValue::NoUncertainty);
    // Only the covered cell reached the inner evaluator.
    assert_eq!(cells_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancelled_batch_aborts() {
    let engine = engine_with(store(), EngineConfig::default());
    let (handle, guard) = cancellation();
    handle.cancel();
    let cell = CellRequest::point("tas", 10.0, 40.0, summer());
    let err = engine.aggregate_values(&[cell], &guard).await;
    assert!(matches!(err, Err(AggError::Cancelled)));
}
