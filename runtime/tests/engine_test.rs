//! Matching engine behavior against the in-memory store.
//!
//! Covers submission validation, every claim rejection, lazy expiry on claim,
//! the post-write capacity check and author cancellation.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{at, test_env};
use shiftmatch_core::effect::SideEffect;
use shiftmatch_core::error::{CancelError, ClaimError, ShiftWindowError, SubmitError};
use shiftmatch_core::types::{
    PostRef, RequestId, RequestKind, RequestStatus, ShopId, UserId, UserProfile,
};
use shiftmatch_testing::builders::{DEFAULT_AUTHOR, RequestBuilder, draft, hm};
use shiftmatch_testing::test_time;

const AUTHOR: UserId = UserId::new(DEFAULT_AUTHOR);

fn uid(id: i64) -> UserId {
    UserId::new(id)
}

fn rid(id: i64) -> RequestId {
    RequestId::new(id)
}

// ============================================================================
// Submission
// ============================================================================

#[tokio::test]
async fn submit_creates_open_request_and_queues_publication() {
    let mut env = test_env();

    let id = env.market.engine.submit(draft(RequestKind::Director, DEFAULT_AUTHOR)).await.unwrap();

    let stored = env.store.get(id).unwrap();
    assert_eq!(stored.status, RequestStatus::Open);
    assert_eq!(stored.filled_slots, 0);
    assert!(stored.claimant_ids.is_empty());
    assert_eq!(stored.capacity.value(), 5);
    // 17:00 Moscow time is 14:00 UTC
    assert_eq!(stored.ends_at, Some(at("2025-01-02T14:00:00Z")));
    assert_eq!(stored.created_at, test_time());

    let effects = env.drain_effects();
    assert_eq!(effects.len(), 2);
    assert!(matches!(&effects[0], SideEffect::Publish { request_id, .. } if *request_id == id));
    assert!(matches!(&effects[1], SideEffect::Notify { user, .. } if *user == AUTHOR));
}

#[tokio::test]
async fn submit_assigns_increasing_ids() {
    let env = test_env();
    let first = env.market.engine.submit(draft(RequestKind::Director, 1)).await.unwrap();
    let second = env.market.engine.submit(draft(RequestKind::Worker, 2)).await.unwrap();
    assert_eq!(first, rid(1));
    assert_eq!(second, rid(2));
}

#[tokio::test]
async fn submit_rejects_off_grid_times_without_writing() {
    let mut env = test_env();
    let mut d = draft(RequestKind::Director, DEFAULT_AUTHOR);
    d.start = hm("10:07");
    d.end = hm("10:22");

    let result = env.market.engine.submit(d).await;

    assert_eq!(
        result,
        Err(SubmitError::InvalidShiftWindow(ShiftWindowError::NotOnQuarterHour))
    );
    assert_eq!(env.store.append_count(), 0);
    assert!(env.drain_effects().is_empty());
}

#[tokio::test]
async fn submit_rejects_past_date_and_passed_start() {
    let env = test_env();

    let mut past = draft(RequestKind::Director, DEFAULT_AUTHOR);
    past.date = past.date.pred_opt().unwrap().pred_opt().unwrap();
    assert_eq!(
        env.market.engine.submit(past).await,
        Err(SubmitError::InvalidShiftWindow(ShiftWindowError::DateInPast))
    );

    // It is 03:00 local on 2025-01-01.
    let mut today = draft(RequestKind::Director, DEFAULT_AUTHOR);
    today.date = today.date.pred_opt().unwrap();
    today.start = hm("02:00");
    today.end = hm("04:00");
    assert_eq!(
        env.market.engine.submit(today).await,
        Err(SubmitError::InvalidShiftWindow(ShiftWindowError::StartInPast))
    );
    assert_eq!(env.store.append_count(), 0);
}

#[tokio::test]
async fn submit_rejects_short_and_long_shifts() {
    let env = test_env();

    let mut short = draft(RequestKind::Worker, DEFAULT_AUTHOR);
    short.start = hm("10:00");
    short.end = hm("10:45");
    assert_eq!(
        env.market.engine.submit(short).await,
        Err(SubmitError::InvalidShiftWindow(ShiftWindowError::TooShort))
    );

    let mut long = draft(RequestKind::Worker, DEFAULT_AUTHOR);
    long.start = hm("06:00");
    long.end = hm("18:15");
    assert_eq!(
        env.market.engine.submit(long).await,
        Err(SubmitError::InvalidShiftWindow(ShiftWindowError::TooLong))
    );
}

#[tokio::test]
async fn submit_resolves_active_shop_name() {
    let env = test_env();
    let mut d = draft(RequestKind::Director, DEFAULT_AUTHOR);
    d.shop_id = Some(ShopId::new(10));

    let id = env.market.engine.submit(d).await.unwrap();

    let stored = env.store.get(id).unwrap();
    assert_eq!(stored.shop_id, Some(ShopId::new(10)));
    assert_eq!(stored.shop_name.as_deref(), Some("Alpha"));
}

#[tokio::test]
async fn submit_rejects_unknown_and_inactive_shops() {
    let env = test_env();

    for shop in [11, 99] {
        let mut d = draft(RequestKind::Director, DEFAULT_AUTHOR);
        d.shop_id = Some(ShopId::new(shop));
        assert_eq!(
            env.market.engine.submit(d).await,
            Err(SubmitError::UnknownShop(ShopId::new(shop)))
        );
    }
    assert_eq!(env.store.append_count(), 0);
}

#[tokio::test]
async fn submit_rejects_blank_position() {
    let env = test_env();
    let mut d = draft(RequestKind::Worker, DEFAULT_AUTHOR);
    d.position = "   ".into();
    assert_eq!(env.market.engine.submit(d).await, Err(SubmitError::MissingPosition));
}

#[tokio::test]
async fn submit_surfaces_store_failure() {
    let env = test_env();
    env.store.set_unavailable(true);
    let result = env.market.engine.submit(draft(RequestKind::Director, DEFAULT_AUTHOR)).await;
    assert!(matches!(result, Err(SubmitError::Store(_))));
}

// ============================================================================
// Claims
// ============================================================================

#[tokio::test]
async fn claim_appends_claimant_and_notifies_both_parties() {
    let mut env = test_env();
    env.store.insert(RequestBuilder::director(1).build());
    env.store.insert_user(UserProfile {
        id: uid(7),
        role: Some(RequestKind::Worker),
        username: Some("anna".into()),
        phone_number: None,
        first_name: Some("Anna".into()),
        last_name: None,
        updated_at: test_time(),
    });

    let outcome = env.market.engine.claim(rid(1), uid(7), Some(PostRef::new(55))).await.unwrap();

    assert_eq!(outcome.status, RequestStatus::Open);
    assert_eq!(outcome.filled_slots, 1);
    assert_eq!(outcome.capacity, 5);

    let stored = env.store.get(rid(1)).unwrap();
    assert_eq!(stored.claimant_ids.as_slice(), &[uid(7)]);
    assert_eq!(stored.channel_post_ref, Some(PostRef::new(55)));
    assert_eq!(stored.updated_at, test_time());

    let effects = env.drain_effects();
    let to_author = effects.iter().find_map(|e| match e {
        SideEffect::Notify { user, text } if *user == AUTHOR => Some(text.clone()),
        _ => None,
    });
    assert!(to_author.unwrap().contains("Anna @anna"));
    assert!(effects.iter().any(|e| matches!(e, SideEffect::Notify { user, .. } if *user == uid(7))));
    assert!(effects.iter().any(|e| matches!(e, SideEffect::UpdatePost { post, .. } if *post == PostRef::new(55))));
}

#[tokio::test]
async fn claim_keeps_existing_post_when_none_given() {
    let env = test_env();
    env.store.insert(RequestBuilder::director(1).post(77).build());

    env.market.engine.claim(rid(1), uid(7), None).await.unwrap();

    assert_eq!(env.store.get(rid(1)).unwrap().channel_post_ref, Some(PostRef::new(77)));
}

#[tokio::test]
async fn claim_of_missing_request_is_not_found() {
    let env = test_env();
    assert_eq!(
        env.market.engine.claim(rid(404), uid(7), None).await,
        Err(ClaimError::NotFound(rid(404)))
    );
}

#[tokio::test]
async fn author_cannot_claim_own_request_in_any_status() {
    let env = test_env();
    env.store.insert(RequestBuilder::director(1).build());
    env.store.insert(RequestBuilder::director(2).status(RequestStatus::Cancelled).build());
    env.store.insert(RequestBuilder::director(3).claimants(&[1, 2, 3, 4, 5]).build());

    for id in [1, 2, 3] {
        assert_eq!(
            env.market.engine.claim(rid(id), AUTHOR, None).await,
            Err(ClaimError::SelfClaim(rid(id)))
        );
    }
    assert_eq!(env.store.update_count(), 0);
}

#[tokio::test]
async fn second_claim_by_same_user_is_duplicate() {
    let env = test_env();
    env.store.insert(RequestBuilder::worker(1).build());

    env.market.engine.claim(rid(1), uid(7), None).await.unwrap();
    assert_eq!(
        env.market.engine.claim(rid(1), uid(7), None).await,
        Err(ClaimError::DuplicateClaim(rid(1)))
    );
    assert_eq!(env.store.get(rid(1)).unwrap().claimant_ids.as_slice(), &[uid(7)]);
}

#[tokio::test]
async fn last_slot_fills_request_and_further_claims_are_full() {
    let env = test_env();
    env.store.insert(RequestBuilder::director(1).capacity(2).build());

    let first = env.market.engine.claim(rid(1), uid(7), None).await.unwrap();
    assert_eq!(first.status, RequestStatus::Open);

    let second = env.market.engine.claim(rid(1), uid(8), None).await.unwrap();
    assert_eq!(second.status, RequestStatus::Filled);
    assert_eq!(second.filled_slots, 2);

    assert_eq!(
        env.market.engine.claim(rid(1), uid(9), None).await,
        Err(ClaimError::Full { id: rid(1), capacity: 2 })
    );
    let stored = env.store.get(rid(1)).unwrap();
    assert_eq!(stored.status, RequestStatus::Filled);
    assert_eq!(stored.claimant_ids.as_slice(), &[uid(7), uid(8)]);
}

#[tokio::test]
async fn closed_requests_reject_claims_without_changes() {
    let env = test_env();
    env.store.insert(RequestBuilder::director(1).claimants(&[7]).status(RequestStatus::Expired).build());
    env.store.insert(RequestBuilder::director(2).claimants(&[7]).status(RequestStatus::Cancelled).build());

    assert_eq!(
        env.market.engine.claim(rid(1), uid(8), None).await,
        Err(ClaimError::Expired(rid(1)))
    );
    assert_eq!(
        env.market.engine.claim(rid(2), uid(8), None).await,
        Err(ClaimError::AlreadyTerminal {
            id: rid(2),
            status: RequestStatus::Cancelled
        })
    );

    assert_eq!(env.store.get(rid(1)).unwrap().claimant_ids.as_slice(), &[uid(7)]);
    assert_eq!(env.store.get(rid(2)).unwrap().claimant_ids.as_slice(), &[uid(7)]);
    assert_eq!(env.store.update_count(), 0);
}

#[tokio::test]
async fn claim_within_grace_is_accepted() {
    let env = test_env();
    env.store.insert(RequestBuilder::director(1).build());
    // Shift ended 30 seconds ago; grace is one minute.
    env.clock.set(at("2025-01-01T15:00:30Z"));

    assert!(env.market.engine.claim(rid(1), uid(7), None).await.is_ok());
}

#[tokio::test]
async fn claim_after_grace_expires_request_lazily() {
    let mut env = test_env();
    env.store.insert(RequestBuilder::director(1).post(90).claimants(&[7]).build());
    env.clock.set(at("2025-01-01T15:02:00Z"));

    assert_eq!(
        env.market.engine.claim(rid(1), uid(8), None).await,
        Err(ClaimError::Expired(rid(1)))
    );

    let stored = env.store.get(rid(1)).unwrap();
    assert_eq!(stored.status, RequestStatus::Expired);
    assert_eq!(stored.channel_post_ref, None);
    assert_eq!(stored.claimant_ids.as_slice(), &[uid(7)]);

    let effects = env.drain_effects();
    assert_eq!(
        effects[0],
        SideEffect::RetractPost {
            post: PostRef::new(90)
        }
    );
    assert!(matches!(&effects[1], SideEffect::Notify { user, .. } if *user == AUTHOR));
}

#[tokio::test]
async fn claim_surfaces_store_failure() {
    let env = test_env();
    env.store.insert(RequestBuilder::director(1).build());
    env.store.set_unavailable(true);

    let result = env.market.engine.claim(rid(1), uid(7), None).await;
    assert!(matches!(result, Err(ClaimError::Store(_))));
}

#[tokio::test]
async fn concurrent_outside_write_past_capacity_reports_full_and_alerts() {
    let mut env = test_env();
    env.store.insert(RequestBuilder::director(1).capacity(2).claimants(&[7]).build());
    // Another writer squeezes two more claimants in right after our write.
    env.store.tamper_after_update(rid(1), |request| {
        request.claimant_ids.push(UserId::new(70));
        request.claimant_ids.push(UserId::new(71));
        request.filled_slots = request.claimant_ids.len();
    });

    let result = env.market.engine.claim(rid(1), uid(8), None).await;

    assert_eq!(result, Err(ClaimError::Full { id: rid(1), capacity: 2 }));
    // No rollback: our write stands.
    assert!(env.store.get(rid(1)).unwrap().has_claimant(uid(8)));

    let effects = env.drain_effects();
    assert!(effects.iter().any(|e| matches!(e, SideEffect::Alert { .. })));
    assert!(!effects.iter().any(|e| matches!(e, SideEffect::Notify { .. })));
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn author_cancels_open_request() {
    let mut env = test_env();
    env.store.insert(RequestBuilder::director(1).post(90).claimants(&[7, 8]).build());

    env.market.engine.cancel(rid(1), AUTHOR).await.unwrap();

    let stored = env.store.get(rid(1)).unwrap();
    assert_eq!(stored.status, RequestStatus::Cancelled);
    assert_eq!(stored.channel_post_ref, None);

    let effects = env.drain_effects();
    assert_eq!(
        effects[0],
        SideEffect::RetractPost {
            post: PostRef::new(90)
        }
    );
    let notified: Vec<_> = effects
        .iter()
        .filter_map(|e| match e {
            SideEffect::Notify { user, .. } => Some(*user),
            _ => None,
        })
        .collect();
    assert_eq!(notified, [uid(7), uid(8)]);
}

#[tokio::test]
async fn cancel_rejects_strangers_and_closed_requests() {
    let env = test_env();
    env.store.insert(RequestBuilder::director(1).build());
    env.store.insert(RequestBuilder::director(2).claimants(&[1, 2, 3, 4, 5]).build());

    assert_eq!(
        env.market.engine.cancel(rid(1), uid(7)).await,
        Err(CancelError::NotAuthor(rid(1)))
    );
    assert_eq!(
        env.market.engine.cancel(rid(2), AUTHOR).await,
        Err(CancelError::AlreadyTerminal {
            id: rid(2),
            status: RequestStatus::Filled
        })
    );
    assert_eq!(
        env.market.engine.cancel(rid(3), AUTHOR).await,
        Err(CancelError::NotFound(rid(3)))
    );

    env.market.engine.cancel(rid(1), AUTHOR).await.unwrap();
    assert_eq!(
        env.market.engine.cancel(rid(1), AUTHOR).await,
        Err(CancelError::AlreadyTerminal {
            id: rid(1),
            status: RequestStatus::Cancelled
        })
    );
}

#[tokio::test]
async fn claimed_request_can_no_longer_be_claimed_after_cancel() {
    let env = test_env();
    env.store.insert(RequestBuilder::worker(1).build());
    env.market.engine.claim(rid(1), uid(7), None).await.unwrap();
    env.market.engine.cancel(rid(1), AUTHOR).await.unwrap();

    let result = env.market.engine.claim(rid(1), uid(8), None).await;
    assert!(matches!(result, Err(ClaimError::AlreadyTerminal { .. })));
}
