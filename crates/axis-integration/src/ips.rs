//! Integration points: sparse weighted index sets over one data axis.

use serde::{Deserialize, Serialize};

/// Inclusive index range along one axis. Singular (empty) iff `first > last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexBoundingBox {
    pub first: i64,
    pub last: i64,
}

impl IndexBoundingBox {
    pub fn new(first: i64, last: i64) -> Self {
        Self { first, last }
    }

    /// The empty range.
    pub fn singular() -> Self {
        Self { first: 0, last: -1 }
    }

    pub fn is_singular(&self) -> bool {
        self.first > self.last
    }

    /// Number of indices covered; 0 for a singular box.
    pub fn extent(&self) -> u64 {
        if self.is_singular() {
            0
        } else {
            (self.last - self.first) as u64 + 1
        }
    }

    pub fn contains(&self, index: i64) -> bool {
        index >= self.first && index <= self.last
    }

    /// Whether `other` lies entirely within this range.
    pub fn contains_box(&self, other: &IndexBoundingBox) -> bool {
        other.is_singular() || (self.contains(other.first) && self.contains(other.last))
    }

    /// Smallest range covering both inputs; singular inputs are neutral.
    pub fn union(&self, other: &IndexBoundingBox) -> IndexBoundingBox {
        if self.is_singular() {
            *other
        } else if other.is_singular() {
            *self
        } else {
            IndexBoundingBox::new(self.first.min(other.first), self.last.max(other.last))
        }
    }

    /// Build from an iterator of indices; singular if the iterator is empty.
    pub fn from_indices<I: IntoIterator<Item = usize>>(indices: I) -> Self {
        let mut bb = Self::singular();
        for i in indices {
            let i = i as i64;
            if bb.is_singular() {
                bb = Self::new(i, i);
            } else {
                bb.first = bb.first.min(i);
                bb.last = bb.last.max(i);
            }
        }
        bb
    }
}

/// A sparse weighted index set over one data axis.
///
/// Used to compute `Σ weight·value` along the axis. For a normalized mean
/// the weights sum to 1 (within 1e-12 at construction; later stages tolerate
/// up to 1e-7 after thinning).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationPoints {
    pub weights: Vec<f64>,
    pub indices: Vec<usize>,
    pub bounding: IndexBoundingBox,
}

impl IntegrationPoints {
    pub fn new(weights: Vec<f64>, indices: Vec<usize>) -> Self {
        debug_assert_eq!(weights.len(), indices.len());
        let bounding = IndexBoundingBox::from_indices(indices.iter().copied());
        Self {
            weights,
            indices,
            bounding,
        }
    }

    /// Empty set with a singular bounding box.
    pub fn empty() -> Self {
        Self {
            weights: Vec::new(),
            indices: Vec::new(),
            bounding: IndexBoundingBox::singular(),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn weight_sum(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Iterate `(index, weight)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.weights.iter().copied())
    }

    /// Reduce to at most `max_count` points by repeated binary halving.
    ///
    /// Adjacent points are merged pairwise, the merged point keeping the
    /// index of its heavier member; when the count is odd, the leftover is
    /// absorbed into the pair at alternating ends on successive passes. The
    /// weight sum is preserved exactly (up to float addition error).
    ///
    /// This is an approximation usable only for variance estimation, never
    /// for computing the final mean.
    pub fn thin(&self, max_count: usize) -> IntegrationPoints {
        if max_count == 0 || self.len() <= max_count {
            return self.clone();
        }

        let mut weights = self.weights.clone();
        let mut indices = self.indices.clone();
        let mut absorb_front = true;

        while weights.len() > max_count {
            let n = weights.len();
            let mut new_w = Vec::with_capacity(n / 2);
            let mut new_i = Vec::with_capacity(n / 2);

            let merge = |w: &[f64], i: &[usize], new_w: &mut Vec<f64>, new_i: &mut Vec<usize>| {
                let weight: f64 = w.iter().sum();
                // Keep the heaviest member's index as the representative.
                let mut best = 0;
                for (k, wk) in w.iter().enumerate() {
                    if *wk > w[best] {
                        best = k;
                    }
                }
                new_w.push(weight);
                new_i.push(i[best]);
            };

            if n % 2 == 0 {
                for p in (0..n).step_by(2) {
                    merge(&weights[p..p + 2], &indices[p..p + 2], &mut new_w, &mut new_i);
                }
            } else if absorb_front {
                merge(&weights[0..3], &indices[0..3], &mut new_w, &mut new_i);
                for p in (3..n).step_by(2) {
                    merge(&weights[p..p + 2], &indices[p..p + 2], &mut new_w, &mut new_i);
                }
            } else {
                for p in (0..n - 3).step_by(2) {
                    merge(&weights[p..p + 2], &indices[p..p + 2], &mut new_w, &mut new_i);
                }
                merge(&weights[n - 3..n], &indices[n - 3..n], &mut new_w, &mut new_i);
            }

            absorb_front = !absorb_front;
            weights = new_w;
            indices = new_i;
        }

        IntegrationPoints::new(weights, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singular_bounding_box() {
        let bb = IndexBoundingBox::singular();
        assert!(bb.is_singular());
        assert_eq!(bb.extent(), 0);
        assert!(!bb.contains(0));
    }

    #[test]
    fn test_bounding_box_union() {
        let a = IndexBoundingBox::new(2, 5);
        let b = IndexBoundingBox::new(4, 9);
        assert_eq!(a.union(&b), IndexBoundingBox::new(2, 9));
        assert_eq!(a.union(&IndexBoundingBox::singular()), a);
        assert_eq!(IndexBoundingBox::singular().union(&b), b);
    }

    #[test]
    fn test_bounding_box_containment() {
        let outer = IndexBoundingBox::new(0, 10);
        assert!(outer.contains_box(&IndexBoundingBox::new(3, 7)));
        assert!(outer.contains_box(&IndexBoundingBox::singular()));
        assert!(!outer.contains_box(&IndexBoundingBox::new(8, 12)));
    }

    #[test]
    fn test_ips_weight_sum() {
        let ips = IntegrationPoints::new(vec![0.25, 0.5, 0.25], vec![3, 4, 5]);
        assert!((ips.weight_sum() - 1.0).abs() < 1e-12);
        assert_eq!(ips.bounding, IndexBoundingBox::new(3, 5));
    }

    #[test]
    fn test_thin_preserves_weight_sum() {
        for n in [5usize, 8, 13, 100, 257] {
            let weights: Vec<f64> = (0..n).map(|i| (i as f64 + 1.0) / ((n * (n + 1) / 2) as f64)).collect();
            let indices: Vec<usize> = (0..n).collect();
            let ips = IntegrationPoints::new(weights, indices);
            let sum_before = ips.weight_sum();

            for k in [1usize, 2, 4, 7] {
                let thinned = ips.thin(k);
                assert!(
                    thinned.len() <= k,
                    "thin({}) of {} points left {}",
                    k,
                    n,
                    thinned.len()
                );
                assert!(
                    (thinned.weight_sum() - sum_before).abs() < 1e-7,
                    "weight sum drifted: {} vs {}",
                    thinned.weight_sum(),
                    sum_before
                );
            }
        }
    }

    #[test]
    fn test_thin_noop_when_small() {
        let ips = IntegrationPoints::new(vec![0.5, 0.5], vec![0, 1]);
        let thinned = ips.thin(4);
        assert_eq!(thinned, ips);
    }

    #[test]
    fn test_thin_indices_stay_within_bounds() {
        let ips = IntegrationPoints::new(vec![0.1; 10], vec![10, 11, 12, 13, 14, 15, 16, 17, 18, 19]);
        let thinned = ips.thin(3);
        for &i in &thinned.indices {
            assert!((10..20).contains(&i));
        }
        assert!(ips.bounding.contains_box(&thinned.bounding));
    }
}
