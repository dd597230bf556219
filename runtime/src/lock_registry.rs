//! Per-request mutual exclusion.
//!
//! Every mutation of an existing request (claim, expiry, cancel, post
//! write-back) runs while holding that request's lock, so for one id these
//! operations are totally ordered by acquisition. Different ids never contend.
//!
//! The table itself sits behind a short registry-wide mutex held only for the
//! lookup-or-insert. Entries are never evicted; the id space seen by one process
//! is assumed to stay small.

use shiftmatch_core::types::RequestId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily created, shared per-id locks.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<RequestId, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock object for `id`, registering a new one if absent.
    ///
    /// Every caller asking for the same id receives the same lock.
    pub async fn acquire(&self, id: RequestId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(id).or_default())
    }

    /// Acquire and hold the lock for `id`.
    ///
    /// The guard is owned so it can be held across store round-trips; dropping
    /// it releases the lock. There is no timeout.
    pub async fn lock(&self, id: RequestId) -> OwnedMutexGuard<()> {
        self.acquire(id).await.lock_owned().await
    }

    /// Number of registered locks.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Whether no lock has been registered yet.
    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}
