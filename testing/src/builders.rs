//! Request and draft builders
//!
//! Defaults: author `1000`, shift on 2025-01-01 from 09:00 to 18:00 Moscow
//! time (ending 15:00 UTC), capacity 5, no shop, created at [`test_time`].

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Hardcoded dates always parse

use crate::mocks::test_time;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use shiftmatch_core::types::{
    Capacity, ClaimantIds, NewRequest, PostRef, Request, RequestDraft, RequestKind, RequestStatus, ShiftWindow,
    ShopId, UserId,
};

/// Author id used by builders unless overridden.
pub const DEFAULT_AUTHOR: i64 = 1000;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

/// Fluent builder for stored [`Request`] records.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    fn new(id: i64, kind: RequestKind) -> Self {
        let shift = ShiftWindow::restore(date("2025-01-01"), time("09:00"), time("18:00"));
        let ends_at = DateTime::parse_from_rfc3339("2025-01-01T15:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Self {
            request: Request {
                id: id.into(),
                kind,
                shift,
                ends_at: Some(ends_at),
                shop_id: None,
                shop_name: None,
                station: None,
                position: "Barista".into(),
                note: None,
                author_id: UserId::new(DEFAULT_AUTHOR),
                status: RequestStatus::Open,
                capacity: Capacity::default(),
                claimant_ids: ClaimantIds::new(),
                filled_slots: 0,
                channel_post_ref: None,
                created_at: test_time(),
                updated_at: test_time(),
            },
        }
    }

    /// Open director request with id `id`.
    #[must_use]
    pub fn director(id: i64) -> Self {
        Self::new(id, RequestKind::Director)
    }

    /// Open worker request with id `id`.
    #[must_use]
    pub fn worker(id: i64) -> Self {
        Self::new(id, RequestKind::Worker)
    }

    /// Set the author.
    #[must_use]
    pub fn author(mut self, author: i64) -> Self {
        self.request.author_id = UserId::new(author);
        self
    }

    /// Set the capacity (clamped like a stored value).
    #[must_use]
    pub fn capacity(mut self, raw: i64) -> Self {
        self.request.capacity = Capacity::clamped(raw);
        self
    }

    /// Set claimants; the status becomes `filled` when they reach capacity.
    #[must_use]
    pub fn claimants(mut self, ids: &[i64]) -> Self {
        self.request.claimant_ids = ids.iter().copied().map(UserId::new).collect();
        self.request.filled_slots = ids.len();
        if self.request.status == RequestStatus::Open && self.request.is_full() {
            self.request.status = RequestStatus::Filled;
        }
        self
    }

    /// Force a status.
    #[must_use]
    pub const fn status(mut self, status: RequestStatus) -> Self {
        self.request.status = status;
        self
    }

    /// Reference a shop.
    #[must_use]
    pub fn shop(mut self, id: i64, name: &str) -> Self {
        self.request.shop_id = Some(ShopId::new(id));
        self.request.shop_name = Some(name.to_string());
        self
    }

    /// Override the absolute shift end.
    #[must_use]
    pub const fn ends_at(mut self, ends_at: Option<DateTime<Utc>>) -> Self {
        self.request.ends_at = ends_at;
        self
    }

    /// Attach a live posting.
    #[must_use]
    pub const fn post(mut self, post: i64) -> Self {
        self.request.channel_post_ref = Some(PostRef::new(post));
        self
    }

    /// Finish the record.
    #[must_use]
    pub fn build(self) -> Request {
        self.request
    }

    /// The creation payload that would produce this record.
    #[must_use]
    pub fn build_new(self) -> NewRequest {
        let r = self.request;
        NewRequest {
            kind: r.kind,
            shift: r.shift,
            ends_at: r.ends_at.unwrap_or_else(test_time),
            shop_id: r.shop_id,
            shop_name: r.shop_name,
            station: r.station,
            position: r.position,
            note: r.note,
            author_id: r.author_id,
            capacity: r.capacity,
            created_at: r.created_at,
        }
    }
}

/// Valid draft for 2025-01-02 09:00-17:00, position "Barista", any shop.
#[must_use]
pub fn draft(kind: RequestKind, author: i64) -> RequestDraft {
    RequestDraft {
        kind,
        date: date("2025-01-02"),
        start: time("09:00"),
        end: time("17:00"),
        shop_id: None,
        station: None,
        position: "Barista".into(),
        note: None,
        author_id: UserId::new(author),
    }
}

/// Parse `HH:MM` for tests that tweak draft times.
#[must_use]
pub fn hm(s: &str) -> NaiveTime {
    time(s)
}
