//! Durable store and catalog source contracts.
//!
//! # Dyn Compatibility
//!
//! Both traits return `Pin<Box<dyn Future>>` instead of using `async fn` so the
//! runtime can hold them as `Arc<dyn RequestStore>` / `Arc<dyn CatalogSource>`
//! and tests can swap in the in-memory implementations.
//!
//! # Locking
//!
//! A store need not serialize `update_fields` calls itself. Every mutation of an
//! existing request goes through the runtime's per-request lock, so a store
//! only has to make each single call atomic.

use crate::catalog::RawCatalog;
use crate::error::{CatalogError, StoreError};
use crate::types::{NewRequest, Request, RequestId, RequestPatch, RowHandle, UserId, UserProfile};
use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future borrowed from the collaborator.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable record of requests and users.
pub trait RequestStore: Send + Sync {
    /// Create a new request with `status = open` and no claimants.
    ///
    /// The id is unique and greater than every id seen before. Implementations
    /// that compute it as `max(id) + 1` are not safe against appends from
    /// several processes at once.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend fails.
    fn append(&self, request: NewRequest) -> BoxFuture<'_, Result<(RequestId, RowHandle), StoreError>>;

    /// Point lookup. `Ok(None)` when the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on I/O failure or
    /// [`StoreError::Corrupt`] if the record cannot be decoded.
    fn find(&self, id: RequestId) -> BoxFuture<'_, Result<Option<Request>, StoreError>>;

    /// Apply a partial update in one call.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the id is unknown, or
    /// [`StoreError::Unavailable`] on I/O failure.
    fn update_fields(&self, id: RequestId, patch: RequestPatch) -> BoxFuture<'_, Result<(), StoreError>>;

    /// All requests whose stored status is neither `expired` nor `cancelled`.
    ///
    /// Records that fail to decode are skipped by the implementation (and
    /// logged) rather than failing the whole listing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on I/O failure.
    fn list_active(&self) -> BoxFuture<'_, Result<Vec<Request>, StoreError>>;

    /// Insert or replace a user profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on I/O failure.
    fn upsert_user(&self, profile: UserProfile) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Look up a user profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on I/O failure.
    fn find_user(&self, id: UserId) -> BoxFuture<'_, Result<Option<UserProfile>, StoreError>>;
}

/// Bulk source of the reference catalog.
pub trait CatalogSource: Send + Sync {
    /// Read every shop row and station-area row.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the source cannot be read.
    fn fetch_all(&self) -> BoxFuture<'_, Result<RawCatalog, CatalogError>>;
}
