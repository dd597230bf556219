//! In-memory catalog source

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Only poisoned locks panic

use shiftmatch_core::catalog::RawCatalog;
use shiftmatch_core::error::CatalogError;
use shiftmatch_core::store::{BoxFuture, CatalogSource};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

/// Catalog source returning whatever rows the test last set.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    data: RwLock<RawCatalog>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
    fetches: AtomicUsize,
}

impl StaticCatalog {
    /// Source serving `data`.
    #[must_use]
    pub fn new(data: RawCatalog) -> Self {
        Self {
            data: RwLock::new(data),
            ..Self::default()
        }
    }

    /// Replace the rows served by subsequent fetches.
    pub fn set(&self, data: RawCatalog) {
        *self.data.write().unwrap() = data;
    }

    /// Make fetches fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every fetch, to keep a refresh in flight.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Number of fetches attempted, failed ones included.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl CatalogSource for StaticCatalog {
    fn fetch_all(&self) -> BoxFuture<'_, Result<RawCatalog, CatalogError>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(CatalogError("static catalog switched off".into()));
            }
            Ok(self.data.read().unwrap().clone())
        })
    }
}
