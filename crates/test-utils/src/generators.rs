//! Deterministic generators for synthetic axes, fields and stations.
//!
//! Fields are separable (`value = f(t) + g(lat) + h(lon)`) so expected
//! weighted means can be computed analytically in assertions.

use natural_neighbor::StationNodes;

/// Evenly spaced axis values `start, start + step, ...` of length `n`.
pub fn linear_axis(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

/// A daily time axis with nodes at noon, `n` days from day zero.
pub fn daily_time_axis(n: usize) -> Vec<f64> {
    (0..n).map(|d| d as f64 + 0.5).collect()
}

/// A global latitude axis from -80 to 80 in 10-degree steps.
pub fn global_lat_axis() -> Vec<f64> {
    linear_axis(-80.0, 10.0, 17)
}

/// A global longitude axis from 0 to 350 in 10-degree steps.
pub fn global_lon_axis() -> Vec<f64> {
    linear_axis(0.0, 10.0, 36)
}

/// Row-major `[time, lat, lon]` cube of a separable field.
pub fn separable_field<F, G, H>(
    times: &[f64],
    lats: &[f64],
    lons: &[f64],
    f: F,
    g: G,
    h: H,
) -> Vec<f64>
where
    F: Fn(f64) -> f64,
    G: Fn(f64) -> f64,
    H: Fn(f64) -> f64,
{
    let mut data = Vec::with_capacity(times.len() * lats.len() * lons.len());
    for &t in times {
        for &lat in lats {
            for &lon in lons {
                data.push(f(t) + g(lat) + h(lon));
            }
        }
    }
    data
}

/// A rectangular station grid with values from a planar field, which a
/// barycentric interpolator reproduces exactly inside the hull.
pub fn planar_station_grid(
    lat0: f64,
    lon0: f64,
    spacing: f64,
    side: usize,
) -> (StationNodes, Vec<f64>) {
    let mut lats = Vec::with_capacity(side * side);
    let mut lons = Vec::with_capacity(side * side);
    let mut values = Vec::with_capacity(side * side);
    for i in 0..side {
        for j in 0..side {
            let (lat, lon) = (lat0 + i as f64 * spacing, lon0 + j as f64 * spacing);
            lats.push(lat);
            lons.push(lon);
            values.push(2.0 * lat - 0.5 * lon);
        }
    }
    (
        StationNodes::new(lats, lons).expect("matching coordinate lengths"),
        values,
    )
}
