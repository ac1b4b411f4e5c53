//! Cooperative batch cancellation.
//!
//! Checked between clusters and before each fit, not mid-read: an already
//! issued storage request runs to completion.

use agg_common::{AggError, Result};
use tokio::sync::watch;

/// Caller-held handle that cancels an in-flight batch.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Engine-held view of the cancellation state.
#[derive(Clone)]
pub struct CancelGuard {
    rx: watch::Receiver<bool>,
}

impl CancelGuard {
    /// A guard that never cancels.
    pub fn none() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AggError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A linked handle/guard pair for one batch.
pub fn cancellation() -> (CancelHandle, CancelGuard) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelGuard { rx })
}
