//! Natural-neighbor weight derivation over station triangulations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TriangulationError};
use crate::triangulation::{Point2, Triangulation};

/// Station locations for one time segment, in degrees.
///
/// Structural identity: two node sets with identical coordinates are the
/// same interpolation context regardless of provenance, which is what
/// `content_bytes` feeds the compute cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationNodes {
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
}

impl StationNodes {
    pub fn new(lats: Vec<f64>, lons: Vec<f64>) -> Result<Self> {
        if lats.len() != lons.len() {
            return Err(TriangulationError::invalid_coordinates(format!(
                "{} latitudes but {} longitudes",
                lats.len(),
                lons.len()
            )));
        }
        Ok(Self { lats, lons })
    }

    pub fn len(&self) -> usize {
        self.lats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lats.is_empty()
    }

    /// Stable byte representation for structural content hashing.
    pub fn content_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 * self.lats.len() + 8);
        out.extend_from_slice(&(self.lats.len() as u64).to_le_bytes());
        for v in self.lats.iter().chain(&self.lons) {
            out.extend_from_slice(&v.to_bits().to_le_bytes());
        }
        out
    }
}

/// One station's contribution to a target cell's weighted mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearWeight {
    pub index: usize,
    pub weight: f64,
}

/// Derives per-cell station weights from a Delaunay triangulation.
///
/// Longitudes are scaled by the cosine of the mean station latitude before
/// triangulating, so planar distances roughly track ground distances.
/// Immutable once built; share via `Arc` across requests of the owning
/// time segment.
#[derive(Debug, Clone)]
pub struct NaturalNeighborInterpolator {
    triangulation: Triangulation,
    lon_scale: f64,
}

impl NaturalNeighborInterpolator {
    pub fn build(nodes: &StationNodes) -> Result<Self> {
        let mean_lat = nodes.lats.iter().sum::<f64>() / nodes.len().max(1) as f64;
        let lon_scale = mean_lat.to_radians().cos().max(0.01);
        let points: Vec<Point2> = nodes
            .lats
            .iter()
            .zip(&nodes.lons)
            .map(|(&lat, &lon)| Point2::new(lon * lon_scale, lat))
            .collect();
        Ok(Self {
            triangulation: Triangulation::build(points)?,
            lon_scale,
        })
    }

    /// Weights for a point query; `None` outside the station hull.
    pub fn weights_for_point(&self, lat: f64, lon: f64) -> Option<Vec<LinearWeight>> {
        let bary = self
            .triangulation
            .barycentric(Point2::new(lon * self.lon_scale, lat))?;
        Some(
            bary.iter()
                .filter(|(_, w)| *w > 0.0)
                .map(|&(index, weight)| LinearWeight { index, weight })
                .collect(),
        )
    }

    /// Weights for an area query, averaged over an `m x m` sub-sample grid.
    ///
    /// Sub-samples outside the hull contribute nothing; when any sample
    /// hits, weights are renormalized so Σweights == 1. All samples outside
    /// means no data for this cell.
    pub fn weights_for_cell(
        &self,
        lat_min: f64,
        lat_max: f64,
        lon_min: f64,
        lon_max: f64,
        m: usize,
    ) -> Option<Vec<LinearWeight>> {
        if lat_min == lat_max && lon_min == lon_max {
            return self.weights_for_point(lat_min, lon_min);
        }
        let m = m.max(2);
        let mut acc: BTreeMap<usize, f64> = BTreeMap::new();
        let mut hits = 0usize;
        for i in 0..m {
            let lat = lat_min + (lat_max - lat_min) * i as f64 / (m - 1) as f64;
            for j in 0..m {
                let lon = lon_min + (lon_max - lon_min) * j as f64 / (m - 1) as f64;
                if let Some(weights) = self.weights_for_point(lat, lon) {
                    hits += 1;
                    for w in weights {
                        *acc.entry(w.index).or_insert(0.0) += w.weight;
                    }
                }
            }
        }
        if hits == 0 {
            return None;
        }
        let sum: f64 = acc.values().sum();
        Some(
            acc.into_iter()
                .map(|(index, weight)| LinearWeight {
                    index,
                    weight: weight / sum,
                })
                .collect(),
        )
    }
}
