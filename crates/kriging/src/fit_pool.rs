//! Bounded-concurrency executor for CPU-bound variogram fits.
//!
//! Fits run on the rayon pool, never on the async I/O scheduler, and the
//! number in flight is capped so a burst of distinct time segments cannot
//! occupy every worker thread.

use std::sync::Arc;

use tokio::sync::{oneshot, Semaphore};
use tracing::debug;

use crate::error::{KrigingError, Result};

#[derive(Clone)]
pub struct FitPool {
    permits: Arc<Semaphore>,
}

impl FitPool {
    /// Pool admitting at most `size` concurrent jobs.
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    /// Pool sized to the machine's core count.
    pub fn with_default_size() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        debug!(cores, "sizing fit pool to core count");
        Self::new(cores)
    }

    /// Run a CPU-bound job on the rayon pool and await its result.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| KrigingError::pool_closed("semaphore closed"))?;
        let (tx, rx) = oneshot::channel();
        rayon::spawn(move || {
            let result = job();
            drop(permit);
            // Receiver dropped means the caller gave up; nothing to report.
            let _ = tx.send(result);
        });
        rx.await
            .map_err(|_| KrigingError::pool_closed("fit job dropped before completion"))
    }
}
