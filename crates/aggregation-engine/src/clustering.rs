//! Greedy clustering of cell requests for batched I/O.
//!
//! Each request reduces to a 3-D index bounding box; a cluster is read from
//! storage as one hyperslab covering the union of its members. Optimal
//! bin-covering is NP-hard, so clusters are formed greedily: seed with the
//! largest remaining request, then absorb requests (in size order) whose
//! union keeps the cluster within the element cap. An oversized request
//! becomes its own singleton cluster.

use agg_common::{AggError, Result};
use axis_integration::IndexBoundingBox;
use tracing::debug;

/// Index bounding boxes along the time, lat and lon axes of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox3D {
    pub time: IndexBoundingBox,
    pub lat: IndexBoundingBox,
    pub lon: IndexBoundingBox,
}

impl BoundingBox3D {
    pub fn new(time: IndexBoundingBox, lat: IndexBoundingBox, lon: IndexBoundingBox) -> Self {
        Self { time, lat, lon }
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_singular() || self.lat.is_singular() || self.lon.is_singular()
    }

    /// Number of elements covered; `None` on overflow.
    pub fn element_count(&self) -> Option<u64> {
        self.time
            .extent()
            .checked_mul(self.lat.extent())?
            .checked_mul(self.lon.extent())
    }

    pub fn union(&self, other: &BoundingBox3D) -> BoundingBox3D {
        BoundingBox3D {
            time: self.time.union(&other.time),
            lat: self.lat.union(&other.lat),
            lon: self.lon.union(&other.lon),
        }
    }
}

/// One request entering the clusterer, tagged with its position in the
/// caller's batch so results scatter back in order.
#[derive(Debug, Clone, Copy)]
pub struct ClusterItem {
    pub position: usize,
    pub bbox: BoundingBox3D,
}

/// A group of requests served by one raw read.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub members: Vec<ClusterItem>,
    pub bbox: BoundingBox3D,
}

/// Partition `items` into clusters whose union stays within `cap_elements`,
/// except for oversized singletons which form clusters of their own.
pub fn cluster_requests(mut items: Vec<ClusterItem>, cap_elements: u64) -> Result<Vec<Cluster>> {
    if cap_elements == 0 {
        return Err(AggError::configuration("cluster cap of zero elements"));
    }
    let volume = |bbox: &BoundingBox3D| -> Result<u64> {
        bbox.element_count().ok_or_else(|| {
            AggError::internal(format!("bounding box volume overflows u64: {bbox:?}"))
        })
    };
    for item in &items {
        volume(&item.bbox)?;
    }
    // Descending by volume; unwrap is safe, volumes were just validated.
    items.sort_by_key(|item| std::cmp::Reverse(item.bbox.element_count().unwrap_or(u64::MAX)));

    let mut clusters = Vec::new();
    let mut remaining = items;
    while let Some(seed) = remaining.first().copied() {
        let seed_volume = volume(&seed.bbox)?;
        let effective_cap = seed_volume.max(cap_elements);
        let mut bbox = seed.bbox;
        let mut members = vec![seed];
        let mut rejected = Vec::with_capacity(remaining.len());

        for item in remaining.drain(..).skip(1) {
            let merged = bbox.union(&item.bbox);
            if volume(&merged)? <= effective_cap {
                bbox = merged;
                members.push(item);
            } else {
                rejected.push(item);
            }
        }
        clusters.push(Cluster { members, bbox });
        remaining = rejected;
    }

    debug!(
        clusters = clusters.len(),
        cap_elements, "clustered batch for I/O"
    );
    Ok(clusters)
}
