//! The matching engine: request submission, the claim state machine and
//! author cancellation.
//!
//! Every mutation of an existing request happens under that request's lock
//! from the [`LockRegistry`] and starts by re-reading the record from the
//! store; callers' snapshots are never trusted. Side effects are collected
//! while the lock is held and emitted only after it has been released and the
//! store write has completed.

use crate::cache::ReferenceCache;
use crate::effects::EffectSender;
use crate::lock_registry::LockRegistry;
use crate::metrics::{ClaimMetrics, SweepMetrics};
use crate::render;
use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use serde::Serialize;
use shiftmatch_core::effect::SideEffect;
use shiftmatch_core::environment::Clock;
use shiftmatch_core::error::{CancelError, ClaimError, StoreError, SubmitError};
use shiftmatch_core::store::RequestStore;
use shiftmatch_core::types::{
    Capacity, NewRequest, PostRef, Request, RequestDraft, RequestId, RequestPatch, RequestStatus, ShiftWindow, UserId,
    UserProfile,
};
use std::sync::Arc;
use std::time::Instant;

/// Matching engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Capacity given to new requests
    pub default_capacity: Capacity,
    /// How long after shift end a request stays claimable
    pub grace_period: Duration,
    /// Offset of the local time shift windows are expressed in
    pub utc_offset: FixedOffset,
    /// How many days ahead a shift may be posted
    pub date_window_days: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_capacity: Capacity::default(),
            grace_period: Duration::minutes(1),
            utc_offset: FixedOffset::east_opt(3 * 3600).unwrap_or_else(|| Utc.fix()),
            date_window_days: 90,
        }
    }
}

/// Result of an accepted claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimOutcome {
    /// Claimed request
    pub request_id: RequestId,
    /// Status after the claim (`open` or `filled`)
    pub status: RequestStatus,
    /// Claimants after the claim
    pub filled_slots: usize,
    /// Slot limit
    pub capacity: usize,
}

impl From<&Request> for ClaimOutcome {
    fn from(request: &Request) -> Self {
        Self {
            request_id: request.id,
            status: request.status,
            filled_slots: request.filled_slots,
            capacity: request.capacity.value(),
        }
    }
}

/// Serializes and applies claims, submissions and cancellations.
pub struct MatchingEngine {
    store: Arc<dyn RequestStore>,
    cache: Arc<ReferenceCache>,
    locks: Arc<LockRegistry>,
    clock: Arc<dyn Clock>,
    effects: EffectSender,
    settings: EngineSettings,
}

impl MatchingEngine {
    /// Wire an engine to its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn RequestStore>,
        cache: Arc<ReferenceCache>,
        locks: Arc<LockRegistry>,
        clock: Arc<dyn Clock>,
        effects: EffectSender,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            cache,
            locks,
            clock,
            effects,
            settings,
        }
    }

    /// Engine configuration.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Validate a draft and create an open request.
    ///
    /// No lock is taken: a request being created has no other contender.
    /// The posting is published afterwards by the side effect worker.
    ///
    /// # Errors
    ///
    /// - [`SubmitError::InvalidShiftWindow`] if the window fails validation
    /// - [`SubmitError::MissingPosition`] if the position is blank
    /// - [`SubmitError::UnknownShop`] if the shop is missing or inactive
    /// - [`SubmitError::Store`] if the append fails
    ///
    /// Nothing is written when validation fails.
    pub async fn submit(&self, draft: RequestDraft) -> Result<RequestId, SubmitError> {
        let result = self.submit_inner(draft).await;
        ClaimMetrics::record_submission(match &result {
            Ok(_) => "accepted",
            Err(SubmitError::InvalidShiftWindow(_)) => "invalid_shift",
            Err(SubmitError::MissingPosition) => "missing_position",
            Err(SubmitError::UnknownShop(_)) => "unknown_shop",
            Err(SubmitError::Store(_)) => "store_unavailable",
        });
        result
    }

    async fn submit_inner(&self, draft: RequestDraft) -> Result<RequestId, SubmitError> {
        let now = self.clock.now();
        let now_local = now.with_timezone(&self.settings.utc_offset).naive_local();
        let shift = ShiftWindow::validate(
            draft.date,
            draft.start,
            draft.end,
            now_local,
            self.settings.date_window_days,
        )?;

        let position = draft.position.trim();
        if position.is_empty() {
            return Err(SubmitError::MissingPosition);
        }

        let shop_name = match draft.shop_id {
            Some(shop_id) => {
                let snapshot = self.cache.get().await;
                let shop = snapshot.active_shop(shop_id).ok_or(SubmitError::UnknownShop(shop_id))?;
                Some(shop.name.clone())
            }
            None => None,
        };

        let new_request = NewRequest {
            kind: draft.kind,
            shift,
            ends_at: shift.ends_at(self.settings.utc_offset),
            shop_id: draft.shop_id,
            shop_name,
            station: draft.station,
            position: position.to_string(),
            note: draft.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            author_id: draft.author_id,
            capacity: self.settings.default_capacity,
            created_at: now,
        };

        let (id, _row) = self.store.append(new_request.clone()).await?;
        let request = new_request.into_request(id);

        tracing::info!(
            request_id = %id,
            kind = %request.kind,
            author = %request.author_id,
            "Request submitted"
        );

        self.effects.emit_all([
            SideEffect::Publish {
                request_id: id,
                text: render::post_text(&request),
                affordance: render::affordance(&request),
            },
            SideEffect::Notify {
                user: request.author_id,
                text: render::published_notice(&request),
            },
        ]);
        Ok(id)
    }

    /// Claim one slot of a request.
    ///
    /// `post` is the posting the claim came from, if known; it is persisted as
    /// the request's post handle.
    ///
    /// # Errors
    ///
    /// Expected rejections, checked in this order under the request lock:
    /// [`ClaimError::NotFound`], [`ClaimError::SelfClaim`],
    /// [`ClaimError::Expired`] (stored as expired, or shift end plus grace has
    /// passed, in which case the request is expired now),
    /// [`ClaimError::AlreadyTerminal`] (cancelled), [`ClaimError::DuplicateClaim`],
    /// [`ClaimError::Full`]. Store failures surface as [`ClaimError::Store`].
    ///
    /// Capacity is re-checked after the write. If another writer pushed the
    /// request over capacity the claim reports `Full` even though its own write
    /// has already happened; there is no rollback.
    pub async fn claim(
        &self,
        id: RequestId,
        claimant: UserId,
        post: Option<PostRef>,
    ) -> Result<ClaimOutcome, ClaimError> {
        let started = Instant::now();
        let mut effects = Vec::new();
        let result = self.claim_locked(id, claimant, post, &mut effects).await;

        ClaimMetrics::record_claim(
            result.as_ref().map_or_else(ClaimError::label, |_| "accepted"),
            started.elapsed(),
        );

        let outcome = match result {
            Ok(request) => {
                tracing::info!(
                    request_id = %id,
                    claimant = %claimant,
                    filled = request.filled_slots,
                    capacity = request.capacity.value(),
                    status = %request.status,
                    "Claim accepted"
                );
                effects.extend(self.claim_effects(&request, claimant).await);
                Ok(ClaimOutcome::from(&request))
            }
            Err(e) => {
                tracing::info!(request_id = %id, claimant = %claimant, reason = e.label(), "Claim rejected");
                Err(e)
            }
        };

        self.effects.emit_all(effects);
        outcome
    }

    async fn claim_locked(
        &self,
        id: RequestId,
        claimant: UserId,
        post: Option<PostRef>,
        effects: &mut Vec<SideEffect>,
    ) -> Result<Request, ClaimError> {
        let _guard = self.locks.lock(id).await;

        let request = self.store.find(id).await?.ok_or(ClaimError::NotFound(id))?;

        if request.author_id == claimant {
            return Err(ClaimError::SelfClaim(id));
        }
        match request.status {
            RequestStatus::Expired => return Err(ClaimError::Expired(id)),
            RequestStatus::Cancelled => {
                return Err(ClaimError::AlreadyTerminal {
                    id,
                    status: request.status,
                });
            }
            RequestStatus::Open | RequestStatus::Filled => {}
        }

        let now = self.clock.now();
        if request.is_past_grace(now, self.settings.grace_period) {
            effects.extend(self.expire_locked(&request, now).await?);
            return Err(ClaimError::Expired(id));
        }

        if request.has_claimant(claimant) {
            return Err(ClaimError::DuplicateClaim(id));
        }
        let capacity = request.capacity.value();
        if request.is_full() {
            return Err(ClaimError::Full { id, capacity });
        }

        let mut claimant_ids = request.claimant_ids.clone();
        claimant_ids.push(claimant);
        let filled_slots = claimant_ids.len();
        let status = if filled_slots >= capacity {
            RequestStatus::Filled
        } else {
            RequestStatus::Open
        };

        let patch = RequestPatch {
            status: Some(status),
            claimant_ids: Some(claimant_ids),
            filled_slots: Some(filled_slots),
            channel_post_ref: Some(post.or(request.channel_post_ref)),
            updated_at: Some(now),
        };
        self.store.update_fields(id, patch).await?;

        let fresh = self.store.find(id).await?.ok_or(ClaimError::NotFound(id))?;
        if fresh.filled_slots > fresh.capacity.value() || fresh.claimant_ids.len() > fresh.capacity.value() {
            tracing::error!(
                request_id = %id,
                filled = fresh.filled_slots,
                capacity = fresh.capacity.value(),
                "Request over capacity after claim write"
            );
            effects.push(SideEffect::Alert {
                text: format!(
                    "Request {id} is over capacity ({}/{}) after a concurrent write",
                    fresh.filled_slots,
                    fresh.capacity.value()
                ),
            });
            return Err(ClaimError::Full {
                id,
                capacity: fresh.capacity.value(),
            });
        }
        Ok(fresh)
    }

    async fn claim_effects(&self, request: &Request, claimant: UserId) -> Vec<SideEffect> {
        let claimant_contact = self.contact(claimant).await;
        let author_contact = self.contact(request.author_id).await;
        let (to_author, to_claimant) = render::claim_notices(request, &claimant_contact, &author_contact);

        let mut effects = vec![
            SideEffect::Notify {
                user: request.author_id,
                text: to_author,
            },
            SideEffect::Notify {
                user: claimant,
                text: to_claimant,
            },
        ];
        if let Some(post) = request.channel_post_ref {
            effects.push(SideEffect::UpdatePost {
                post,
                text: render::post_text(request),
                affordance: render::affordance(request),
            });
        }
        effects
    }

    async fn contact(&self, user: UserId) -> String {
        match self.store.find_user(user).await {
            Ok(Some(profile)) => profile.contact_line(),
            Ok(None) => format!("user #{user}"),
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "Failed to load contact details");
                format!("user #{user}")
            }
        }
    }

    /// Move a request to `expired`. The caller must hold the request's lock
    /// and pass a record read under it.
    ///
    /// Returns the effects to emit once the lock is released.
    pub(crate) async fn expire_locked(
        &self,
        request: &Request,
        now: DateTime<Utc>,
    ) -> Result<Vec<SideEffect>, StoreError> {
        let patch = RequestPatch {
            status: Some(RequestStatus::Expired),
            channel_post_ref: Some(None),
            updated_at: Some(now),
            ..RequestPatch::default()
        };
        self.store.update_fields(request.id, patch).await?;
        SweepMetrics::record_expired();
        tracing::info!(request_id = %request.id, "Request expired");

        let mut effects = Vec::with_capacity(2);
        if let Some(post) = request.channel_post_ref {
            effects.push(SideEffect::RetractPost { post });
        }
        effects.push(SideEffect::Notify {
            user: request.author_id,
            text: render::expired_notice(request),
        });
        Ok(effects)
    }

    /// Withdraw an open request. Only its author may do this.
    ///
    /// # Errors
    ///
    /// [`CancelError::NotFound`], [`CancelError::NotAuthor`],
    /// [`CancelError::AlreadyTerminal`] if the request is no longer open, or
    /// [`CancelError::Store`].
    pub async fn cancel(&self, id: RequestId, actor: UserId) -> Result<(), CancelError> {
        let effects = {
            let _guard = self.locks.lock(id).await;

            let request = self.store.find(id).await?.ok_or(CancelError::NotFound(id))?;
            if request.author_id != actor {
                return Err(CancelError::NotAuthor(id));
            }
            if request.status != RequestStatus::Open {
                return Err(CancelError::AlreadyTerminal {
                    id,
                    status: request.status,
                });
            }

            let patch = RequestPatch {
                status: Some(RequestStatus::Cancelled),
                channel_post_ref: Some(None),
                updated_at: Some(self.clock.now()),
                ..RequestPatch::default()
            };
            self.store.update_fields(id, patch).await?;

            let notice = render::cancelled_notice(&request);
            request
                .channel_post_ref
                .map(|post| SideEffect::RetractPost { post })
                .into_iter()
                .chain(request.claimant_ids.iter().map(|&user| SideEffect::Notify {
                    user,
                    text: notice.clone(),
                }))
                .collect::<Vec<_>>()
        };

        ClaimMetrics::record_cancellation();
        tracing::info!(request_id = %id, "Request cancelled by author");
        self.effects.emit_all(effects);
        Ok(())
    }

    /// Read a request as currently stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the lookup fails.
    pub async fn request(&self, id: RequestId) -> Result<Option<Request>, StoreError> {
        self.store.find(id).await
    }

    /// Register or update a user's contact details.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    pub async fn register_user(&self, profile: UserProfile) -> Result<(), StoreError> {
        self.store.upsert_user(profile).await
    }

    pub(crate) fn store(&self) -> &Arc<dyn RequestStore> {
        &self.store
    }

    pub(crate) fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) const fn effects(&self) -> &EffectSender {
        &self.effects
    }
}
