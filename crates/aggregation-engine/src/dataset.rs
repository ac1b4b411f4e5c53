//! Gridded dataset wiring: axis autodetection and per-cell integration.

use std::collections::HashMap;
use std::sync::Arc;

use agg_common::{AggError, CellRequest, DataCoverage, Result};
use axis_integration::{
    AxisIntegration, AxisIntegrator, CoordinateAxis, CycledLongitudeAxis, ProjectedTimeIntegrator,
    TimeIntegrator, TimeProjection, WeightStrategy,
};
use tracing::debug;

use crate::clustering::BoundingBox3D;
use crate::storage::ArrayStore;

const LAT_NAMES: [&str; 2] = ["lat", "latitude"];
const LON_NAMES: [&str; 2] = ["lon", "longitude"];
const TIME_NAMES: [&str; 2] = ["time", "t"];

/// Positions of the time, lat and lon dimensions in one variable's storage
/// order.
#[derive(Debug, Clone, Copy)]
pub struct DimOrder {
    pub time: usize,
    pub lat: usize,
    pub lon: usize,
}

/// Per-cell integration results across the three axes.
#[derive(Debug, Clone)]
pub struct CellIntegration {
    pub time: AxisIntegration,
    pub lat: AxisIntegration,
    pub lon: AxisIntegration,
}

impl CellIntegration {
    /// Worst-case coverage across the independent axes.
    pub fn coverage(&self) -> DataCoverage {
        self.time
            .coverage
            .combine(self.lat.coverage)
            .combine(self.lon.coverage)
    }

    pub fn bounding(&self) -> BoundingBox3D {
        BoundingBox3D::new(
            self.time.ips.bounding,
            self.lat.ips.bounding,
            self.lon.ips.bounding,
        )
    }
}

/// A gridded dataset: the store plus integrators for its detected axes.
pub struct GridDataset {
    store: Arc<dyn ArrayStore>,
    lat: AxisIntegrator,
    lon: CycledLongitudeAxis,
    time: Arc<dyn TimeIntegrator>,
    time_values: Vec<f64>,
    dim_orders: HashMap<String, DimOrder>,
}

impl GridDataset {
    /// Detect the lat, lon and time axes from the store's schema and build
    /// the integrators. Fails fast on a missing or malformed axis; batch
    /// operations never hit detection errors.
    pub fn new(
        store: Arc<dyn ArrayStore>,
        strategy: WeightStrategy,
        projection: Box<dyn TimeProjection>,
    ) -> Result<Self> {
        let schema = store.schema();
        let find = |names: &[&str]| {
            schema
                .axes
                .iter()
                .find(|a| names.iter().any(|n| a.name.eq_ignore_ascii_case(n)))
        };
        let lat_axis = find(&LAT_NAMES)
            .ok_or_else(|| AggError::configuration("no latitude axis in schema"))?;
        let lon_axis = find(&LON_NAMES)
            .ok_or_else(|| AggError::configuration("no longitude axis in schema"))?;
        let time_axis =
            find(&TIME_NAMES).ok_or_else(|| AggError::configuration("no time axis in schema"))?;

        let lat = AxisIntegrator::new(CoordinateAxis::new(lat_axis.values.clone())?, strategy);
        let lon = CycledLongitudeAxis::new(lon_axis.values.clone(), strategy)?;
        let time_values = time_axis.values.clone();
        let time_integrator = AxisIntegrator::new(
            CoordinateAxis::new(time_values.clone())?,
            WeightStrategy::Step,
        );
        let time: Arc<dyn TimeIntegrator> =
            Arc::new(ProjectedTimeIntegrator::new(projection, time_integrator));

        let (lat_name, lon_name, time_name) = (
            lat_axis.name.clone(),
            lon_axis.name.clone(),
            time_axis.name.clone(),
        );
        let mut dim_orders = HashMap::new();
        for (variable, var_schema) in &schema.variables {
            let pos = |name: &str| var_schema.dimensions.iter().position(|d| d == name);
            if let (Some(t), Some(la), Some(lo)) =
                (pos(&time_name), pos(&lat_name), pos(&lon_name))
            {
                dim_orders.insert(
                    variable.clone(),
                    DimOrder {
                        time: t,
                        lat: la,
                        lon: lo,
                    },
                );
            }
        }
        if dim_orders.is_empty() {
            return Err(AggError::configuration(
                "no variable spans the detected time/lat/lon axes",
            ));
        }
        debug!(
            variables = dim_orders.len(),
            lat = %lat_name,
            lon = %lon_name,
            time = %time_name,
            "grid dataset constructed"
        );

        Ok(Self {
            store,
            lat,
            lon,
            time,
            time_values,
            dim_orders,
        })
    }

    pub fn store(&self) -> &Arc<dyn ArrayStore> {
        &self.store
    }

    pub fn has_variable(&self, variable: &str) -> bool {
        self.dim_orders.contains_key(variable)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.dim_orders.keys().map(|k| k.as_str())
    }

    pub fn dim_order(&self, variable: &str) -> Result<DimOrder> {
        self.dim_orders
            .get(variable)
            .copied()
            .ok_or_else(|| AggError::UnknownVariable(variable.to_string()))
    }

    /// Integrate one cell over all three axes.
    pub fn integrate(&self, cell: &CellRequest) -> Result<CellIntegration> {
        if !self.has_variable(&cell.variable_name) {
            return Err(AggError::UnknownVariable(cell.variable_name.clone()));
        }
        Ok(CellIntegration {
            time: self.time.integrate(&cell.time)?,
            lat: self.lat.integrate(cell.lat_min, cell.lat_max),
            lon: self.lon.integrate(cell.lon_min, cell.lon_max),
        })
    }

    pub fn lat_position(&self, index: usize) -> f64 {
        self.lat.axis().position(index)
    }

    pub fn lon_position(&self, index: usize) -> f64 {
        self.lon.position(index)
    }

    pub fn time_position(&self, index: usize) -> f64 {
        self.time_values[index]
    }
}
