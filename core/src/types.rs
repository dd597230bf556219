//! Domain types for the shift marketplace.
//!
//! A [`Request`] is the unit of matching. Its shift window, shop, station,
//! position and note are fixed at creation; only the claim bookkeeping
//! (`status`, `claimant_ids`, `filled_slots`, `channel_post_ref`) changes
//! afterwards, and only through a [`RequestPatch`].

use crate::error::ShiftWindowError;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// Upper bound (and default) for the number of claimants a request accepts.
pub const MAX_SLOTS: u8 = 5;

/// Shift boundaries must fall on multiples of this many minutes.
pub const SLOT_STEP_MINUTES: u32 = 15;

/// Shortest accepted shift, in minutes.
pub const MIN_SHIFT_MINUTES: i64 = 60;

/// Longest accepted shift, in minutes.
pub const MAX_SHIFT_MINUTES: i64 = 12 * 60;

/// Claimants in claim order. Capacity never exceeds [`MAX_SLOTS`], so this stays inline.
pub type ClaimantIds = SmallVec<[UserId; 5]>;

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw integer identifier.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Get the raw integer value.
            #[must_use]
            pub const fn value(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

integer_id!(
    /// Request identifier, assigned by the store (max existing id + 1).
    RequestId
);
integer_id!(
    /// Chat-platform identity of a user.
    UserId
);
integer_id!(
    /// Shop identifier from the reference catalog.
    ShopId
);
integer_id!(
    /// Opaque handle of a public posting (the channel message id).
    PostRef
);

/// Opaque row handle returned by [`crate::store::RequestStore::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowHandle(pub u64);

/// Who posted a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// A shop director offering a shift; claimants are workers.
    Director,
    /// A worker offering availability; claimants are directors.
    Worker,
}

impl RequestKind {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Director => "director",
            Self::Worker => "worker",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "director" => Ok(Self::Director),
            "worker" => Ok(Self::Worker),
            other => Err(format!("unknown request kind '{other}'")),
        }
    }
}

/// Lifecycle status of a request.
///
/// ```text
/// open ──claim──▶ filled
///   │
///   ├──sweep / lazy expiry──▶ expired
///   └──author cancel──────▶ cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Accepting claims
    Open,
    /// Every slot taken; no further claims
    Filled,
    /// Shift end plus grace period has passed
    Expired,
    /// Withdrawn by the author
    Cancelled,
}

impl RequestStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Filled => "filled",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    /// `expired` or `cancelled`: claimant list frozen and posting retracted.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Expired | Self::Cancelled)
    }

    /// No claim transition leaves this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "filled" => Ok(Self::Filled),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown request status '{other}'")),
        }
    }
}

/// Maximum number of distinct claimants, always in `1..=MAX_SLOTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capacity(u8);

impl Capacity {
    /// Clamp a raw stored value into `(0, MAX_SLOTS]`.
    ///
    /// Non-positive values fall back to the default; larger values are capped.
    #[must_use]
    pub fn clamped(raw: i64) -> Self {
        if raw <= 0 {
            Self::default()
        } else {
            Self(u8::try_from(raw.min(i64::from(MAX_SLOTS))).unwrap_or(MAX_SLOTS))
        }
    }

    /// Number of slots.
    #[must_use]
    pub const fn value(self) -> usize {
        self.0 as usize
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Self(MAX_SLOTS)
    }
}

/// Date and local start/end time of a shift, validated on construction.
///
/// Times are local to the deployment's configured UTC offset. Shifts never
/// cross midnight (`start < end` on the same date).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftWindow {
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
}

impl ShiftWindow {
    /// Validate a candidate shift window against the local "now".
    ///
    /// # Errors
    ///
    /// Returns the first rule the window violates, checked in this order:
    /// date in the past, date beyond `date_window_days`, start not before end,
    /// start already passed today, off the 15-minute grid, shorter than one
    /// hour, longer than twelve hours.
    pub fn validate(
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        now_local: NaiveDateTime,
        date_window_days: u32,
    ) -> Result<Self, ShiftWindowError> {
        let today = now_local.date();
        if date < today {
            return Err(ShiftWindowError::DateInPast);
        }
        if (date - today).num_days() > i64::from(date_window_days) {
            return Err(ShiftWindowError::TooFarAhead {
                max_days: date_window_days,
            });
        }
        if start >= end {
            return Err(ShiftWindowError::StartNotBeforeEnd);
        }
        if date == today && start < now_local.time() {
            return Err(ShiftWindowError::StartInPast);
        }
        for time in [start, end] {
            if time.minute() % SLOT_STEP_MINUTES != 0 || time.second() != 0 {
                return Err(ShiftWindowError::NotOnQuarterHour);
            }
        }
        let minutes = (end - start).num_minutes();
        if minutes < MIN_SHIFT_MINUTES {
            return Err(ShiftWindowError::TooShort);
        }
        if minutes > MAX_SHIFT_MINUTES {
            return Err(ShiftWindowError::TooLong);
        }
        Ok(Self { date, start, end })
    }

    /// Rebuild a window that was validated before it was persisted.
    #[must_use]
    pub const fn restore(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        Self { date, start, end }
    }

    /// Shift date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// Local start time.
    #[must_use]
    pub const fn start(&self) -> NaiveTime {
        self.start
    }

    /// Local end time.
    #[must_use]
    pub const fn end(&self) -> NaiveTime {
        self.end
    }

    /// Shift end as an absolute instant, given the local UTC offset.
    #[must_use]
    pub fn ends_at(&self, offset: FixedOffset) -> DateTime<Utc> {
        let local = self.date.and_time(self.end);
        (local - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
    }
}

/// Transit station chosen while drafting; informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationContext {
    /// Station name
    pub station: String,
    /// Walking distance from the station to the shop, when known
    pub distance_m: Option<u32>,
}

/// A posted shift opportunity or availability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Store-assigned identifier
    pub id: RequestId,
    /// Who posted it
    pub kind: RequestKind,
    /// When the shift happens
    pub shift: ShiftWindow,
    /// Absolute shift end; `None` for records the sweeper cannot schedule
    pub ends_at: Option<DateTime<Utc>>,
    /// Referenced shop, `None` meaning "any shop"
    pub shop_id: Option<ShopId>,
    /// Shop display name captured at submission
    pub shop_name: Option<String>,
    /// Station chosen while drafting
    pub station: Option<StationContext>,
    /// Position (role) text
    pub position: String,
    /// Free-form note
    pub note: Option<String>,
    /// Poster identity
    pub author_id: UserId,
    /// Lifecycle status
    pub status: RequestStatus,
    /// Slot limit
    pub capacity: Capacity,
    /// Claimants in claim order
    pub claimant_ids: ClaimantIds,
    /// Persisted copy of `claimant_ids.len()`
    pub filled_slots: usize,
    /// Handle of the public posting, if one is live
    pub channel_post_ref: Option<PostRef>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Request {
    /// Whether `user` already holds a slot.
    #[must_use]
    pub fn has_claimant(&self, user: UserId) -> bool {
        self.claimant_ids.contains(&user)
    }

    /// Whether every slot is taken.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.filled_slots >= self.capacity.value()
    }

    /// Whether `end + grace` lies strictly before `now`.
    #[must_use]
    pub fn is_past_grace(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        self.ends_at.is_some_and(|end| end + grace < now)
    }
}

/// Validated input to `submit`, produced by the conversational front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDraft {
    /// Director shift or worker availability
    pub kind: RequestKind,
    /// Shift date
    pub date: NaiveDate,
    /// Local start time
    pub start: NaiveTime,
    /// Local end time
    pub end: NaiveTime,
    /// Shop, or `None` for any shop
    pub shop_id: Option<ShopId>,
    /// Station chosen while drafting
    pub station: Option<StationContext>,
    /// Position text (required)
    pub position: String,
    /// Optional note
    pub note: Option<String>,
    /// Poster identity
    pub author_id: UserId,
}

/// Fields handed to the store on creation; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRequest {
    /// Director shift or worker availability
    pub kind: RequestKind,
    /// Validated shift window
    pub shift: ShiftWindow,
    /// Absolute shift end
    pub ends_at: DateTime<Utc>,
    /// Shop reference
    pub shop_id: Option<ShopId>,
    /// Shop display name
    pub shop_name: Option<String>,
    /// Station context
    pub station: Option<StationContext>,
    /// Position text
    pub position: String,
    /// Optional note
    pub note: Option<String>,
    /// Poster identity
    pub author_id: UserId,
    /// Slot limit
    pub capacity: Capacity,
    /// Creation timestamp (also the initial `updated_at`)
    pub created_at: DateTime<Utc>,
}

impl NewRequest {
    /// Materialise the record the store will hold under `id`.
    #[must_use]
    pub fn into_request(self, id: RequestId) -> Request {
        Request {
            id,
            kind: self.kind,
            shift: self.shift,
            ends_at: Some(self.ends_at),
            shop_id: self.shop_id,
            shop_name: self.shop_name,
            station: self.station,
            position: self.position,
            note: self.note,
            author_id: self.author_id,
            status: RequestStatus::Open,
            capacity: self.capacity,
            claimant_ids: ClaimantIds::new(),
            filled_slots: 0,
            channel_post_ref: None,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Partial update of the mutable request fields.
///
/// `None` leaves a field untouched; `channel_post_ref: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestPatch {
    /// New status
    pub status: Option<RequestStatus>,
    /// New claimant list
    pub claimant_ids: Option<ClaimantIds>,
    /// New filled slot count
    pub filled_slots: Option<usize>,
    /// New (or cleared) posting handle
    pub channel_post_ref: Option<Option<PostRef>>,
    /// Mutation timestamp
    pub updated_at: Option<DateTime<Utc>>,
}

impl RequestPatch {
    /// Apply the present fields to `request`.
    pub fn apply_to(&self, request: &mut Request) {
        if let Some(status) = self.status {
            request.status = status;
        }
        if let Some(ids) = &self.claimant_ids {
            request.claimant_ids.clone_from(ids);
        }
        if let Some(filled) = self.filled_slots {
            request.filled_slots = filled;
        }
        if let Some(post) = self.channel_post_ref {
            request.channel_post_ref = post;
        }
        if let Some(at) = self.updated_at {
            request.updated_at = at;
        }
    }

    /// Whether no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.claimant_ids.is_none()
            && self.filled_slots.is_none()
            && self.channel_post_ref.is_none()
            && self.updated_at.is_none()
    }
}

/// Contact details kept for every registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Chat-platform identity
    pub id: UserId,
    /// Role chosen at registration
    pub role: Option<RequestKind>,
    /// Handle without the leading `@`
    pub username: Option<String>,
    /// Shared phone number
    pub phone_number: Option<String>,
    /// Given name
    pub first_name: Option<String>,
    /// Family name
    pub last_name: Option<String>,
    /// Last registration update
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// One-line contact string: name, phone and handle, whichever are known.
    #[must_use]
    pub fn contact_line(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let mut parts = Vec::new();
        if !name.is_empty() {
            parts.push(name);
        }
        if let Some(phone) = self.phone_number.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            parts.push(phone.to_string());
        }
        if let Some(username) = self
            .username
            .as_deref()
            .map(|u| u.trim().trim_start_matches('@'))
            .filter(|u| !u.is_empty())
        {
            parts.push(format!("@{username}"));
        }

        if parts.is_empty() {
            format!("user #{}", self.id)
        } else {
            parts.join(" ")
        }
    }
}
