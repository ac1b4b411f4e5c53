//! Content-hash memoization of derived objects.
//!
//! Triangulations, fitted variograms and interpolation contexts are keyed
//! by the structural content of their inputs, so two reference-distinct but
//! byte-identical node sets share one entry. Concurrent requesters of the
//! same key await a single in-flight computation. Failures are never
//! cached, so a later caller retries. No eviction: the key space is bounded
//! by the dataset's own variables and time segments.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use agg_common::Result;
use tokio::sync::OnceCell;
use xxhash_rust::xxh3::xxh3_128;

/// 128-bit structural identity of a cached input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentKey(pub u128);

impl ContentKey {
    pub fn of(bytes: &[u8]) -> Self {
        Self(xxh3_128(bytes))
    }

    /// Hash several parts with length framing, so `("ab", "c")` and
    /// `("a", "bc")` produce different keys.
    pub fn of_parts(parts: &[&[u8]]) -> Self {
        let mut buf = Vec::with_capacity(parts.iter().map(|p| p.len() + 8).sum());
        for part in parts {
            buf.extend_from_slice(&(part.len() as u64).to_le_bytes());
            buf.extend_from_slice(part);
        }
        Self::of(&buf)
    }
}

/// An async memoizing map with at-most-one computation per key.
pub struct ComputeCache<K, V> {
    entries: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for ComputeCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ComputeCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached value for `key`, computing it at most once across
    /// all concurrent callers. An `Err` from `compute` is returned to the
    /// caller and leaves the entry uninitialized.
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.entry(key).or_default().clone()
        };
        cell.get_or_try_init(compute).await.cloned()
    }

    /// Number of keys ever requested (initialized or not).
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
