//! Shared test helpers for the aggregation workspace.
//!
//! Not published; pulled in as a dev-dependency by the crates that need
//! synthetic datasets or a controllable array store.

pub mod generators;
pub mod store;

pub use generators::{
    daily_time_axis, global_lat_axis, global_lon_axis, linear_axis, planar_station_grid,
    separable_field,
};
pub use store::InMemoryStore;
