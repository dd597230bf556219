//! In-memory request store
//!
//! A `BTreeMap`-backed [`RequestStore`] with knobs for the failure modes the
//! engine has to survive: an unreachable backend, per-request update
//! failures, artificial latency (to widen race windows) and an external
//! writer that tampers with a record right after an update.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Only poisoned mutexes panic

use shiftmatch_core::error::StoreError;
use shiftmatch_core::store::{BoxFuture, RequestStore};
use shiftmatch_core::types::{NewRequest, Request, RequestId, RequestPatch, RowHandle, UserId, UserProfile};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Tamper = Box<dyn Fn(&mut Request) + Send + Sync>;

/// In-memory [`RequestStore`] for fast, deterministic tests.
///
/// # Example
///
/// ```
/// use shiftmatch_testing::InMemoryRequestStore;
/// use shiftmatch_testing::builders::RequestBuilder;
/// use shiftmatch_core::types::RequestId;
///
/// let store = InMemoryRequestStore::new();
/// store.insert(RequestBuilder::director(3).build());
/// assert!(store.get(RequestId::new(3)).is_some());
/// ```
#[derive(Default)]
pub struct InMemoryRequestStore {
    requests: Mutex<BTreeMap<RequestId, Request>>,
    users: Mutex<HashMap<UserId, UserProfile>>,
    unavailable: AtomicBool,
    failing_updates: Mutex<HashSet<RequestId>>,
    latency: Mutex<Option<Duration>>,
    tamper: Mutex<HashMap<RequestId, Tamper>>,
    appends: AtomicUsize,
    updates: AtomicUsize,
}

impl InMemoryRequestStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing `append`.
    pub fn insert(&self, request: Request) {
        self.requests.lock().unwrap().insert(request.id, request);
    }

    /// Current copy of a record.
    #[must_use]
    pub fn get(&self, id: RequestId) -> Option<Request> {
        self.requests.lock().unwrap().get(&id).cloned()
    }

    /// Every record, ordered by id.
    #[must_use]
    pub fn all(&self) -> Vec<Request> {
        self.requests.lock().unwrap().values().cloned().collect()
    }

    /// Seed a user profile.
    pub fn insert_user(&self, profile: UserProfile) {
        self.users.lock().unwrap().insert(profile.id, profile);
    }

    /// Current copy of a user profile.
    #[must_use]
    pub fn get_user(&self, id: UserId) -> Option<UserProfile> {
        self.users.lock().unwrap().get(&id).cloned()
    }

    /// Make every call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `update_fields` fail for one request.
    pub fn fail_updates_for(&self, id: RequestId) {
        self.failing_updates.lock().unwrap().insert(id);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Run `tamper` on the record right after each successful update of `id`,
    /// as an external writer would.
    pub fn tamper_after_update(&self, id: RequestId, tamper: impl Fn(&mut Request) + Send + Sync + 'static) {
        self.tamper.lock().unwrap().insert(id, Box::new(tamper));
    }

    /// Number of successful appends.
    #[must_use]
    pub fn append_count(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    /// Number of successful updates.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store switched off".into()))
        } else {
            Ok(())
        }
    }
}

impl RequestStore for InMemoryRequestStore {
    fn append(&self, request: NewRequest) -> BoxFuture<'_, Result<(RequestId, RowHandle), StoreError>> {
        Box::pin(async move {
            self.pause().await;
            self.check_available()?;
            let mut requests = self.requests.lock().unwrap();
            let next = requests.keys().next_back().map_or(1, |id| id.value() + 1);
            let id = RequestId::new(next);
            requests.insert(id, request.into_request(id));
            self.appends.fetch_add(1, Ordering::SeqCst);
            Ok((id, RowHandle(requests.len() as u64 + 1)))
        })
    }

    fn find(&self, id: RequestId) -> BoxFuture<'_, Result<Option<Request>, StoreError>> {
        Box::pin(async move {
            self.pause().await;
            self.check_available()?;
            Ok(self.get(id))
        })
    }

    fn update_fields(&self, id: RequestId, patch: RequestPatch) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.pause().await;
            self.check_available()?;
            if self.failing_updates.lock().unwrap().contains(&id) {
                return Err(StoreError::Unavailable(format!("update of {id} rejected")));
            }
            let mut requests = self.requests.lock().unwrap();
            let request = requests.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            patch.apply_to(request);
            if let Some(tamper) = self.tamper.lock().unwrap().get(&id) {
                tamper(request);
            }
            self.updates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn list_active(&self) -> BoxFuture<'_, Result<Vec<Request>, StoreError>> {
        Box::pin(async move {
            self.pause().await;
            self.check_available()?;
            Ok(self
                .requests
                .lock()
                .unwrap()
                .values()
                .filter(|r| !r.status.is_closed())
                .cloned()
                .collect())
        })
    }

    fn upsert_user(&self, profile: UserProfile) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            self.insert_user(profile);
            Ok(())
        })
    }

    fn find_user(&self, id: UserId) -> BoxFuture<'_, Result<Option<UserProfile>, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.get_user(id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::RequestBuilder;
    use shiftmatch_core::types::RequestStatus;

    #[tokio::test]
    async fn append_assigns_max_plus_one() {
        let store = InMemoryRequestStore::new();
        store.insert(RequestBuilder::director(41).build());

        let new_request = RequestBuilder::director(0).build_new();
        let (id, _) = store.append(new_request).await.unwrap();
        assert_eq!(id, RequestId::new(42));
        assert_eq!(store.get(id).unwrap().status, RequestStatus::Open);
    }

    #[tokio::test]
    async fn list_active_skips_closed_records() {
        let store = InMemoryRequestStore::new();
        store.insert(RequestBuilder::director(1).build());
        store.insert(RequestBuilder::director(2).status(RequestStatus::Expired).build());
        store.insert(RequestBuilder::director(3).claimants(&[5, 6, 7, 8, 9]).build());

        let ids: Vec<_> = store.list_active().await.unwrap().iter().map(|r| r.id.value()).collect();
        assert_eq!(ids, [1, 3]);
    }

    #[tokio::test]
    async fn update_of_missing_request_is_not_found() {
        let store = InMemoryRequestStore::new();
        let result = store.update_fields(RequestId::new(9), RequestPatch::default()).await;
        assert_eq!(result, Err(StoreError::NotFound(RequestId::new(9))));
    }
}
