//! Error types for the engine and its collaborators.
//!
//! Claim rejections are expected outcomes and carry enough context for the
//! caller to pick a user-facing message. Collaborator failures (`StoreError`,
//! `CatalogError`, `PortError`) wrap the backend's message as a string so the
//! core stays independent of any particular driver.

use crate::types::{RequestId, RequestStatus, ShopId};
use thiserror::Error;

/// Failures reported by a [`crate::store::RequestStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or the operation failed mid-flight.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// An update targeted a request that does not exist.
    #[error("Request not found: {0}")]
    NotFound(RequestId),

    /// A stored record could not be decoded.
    #[error("Corrupt record {id}: {reason}")]
    Corrupt {
        /// Offending request
        id: RequestId,
        /// What failed to decode
        reason: String,
    },
}

/// Why a shift window was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftWindowError {
    /// Shift date lies before today.
    #[error("shift date is in the past")]
    DateInPast,

    /// Shift date lies beyond the posting window.
    #[error("shift date is more than {max_days} days ahead")]
    TooFarAhead {
        /// Posting window in days
        max_days: u32,
    },

    /// Start is not strictly before end.
    #[error("shift start must be before its end")]
    StartNotBeforeEnd,

    /// Shift is today and its start has already passed.
    #[error("shift start has already passed")]
    StartInPast,

    /// Start or end is not a multiple of 15 minutes.
    #[error("shift times must fall on a 15-minute boundary")]
    NotOnQuarterHour,

    /// Shorter than one hour.
    #[error("shift must last at least one hour")]
    TooShort,

    /// Longer than twelve hours.
    #[error("shift must not exceed twelve hours")]
    TooLong,
}

/// Rejections and failures of `submit`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Shift window failed validation; nothing was written.
    #[error("Invalid shift window: {0}")]
    InvalidShiftWindow(#[from] ShiftWindowError),

    /// Draft references a shop that is missing or inactive in the catalog.
    #[error("Unknown or inactive shop: {0}")]
    UnknownShop(ShopId),

    /// Position text is blank.
    #[error("Position is required")]
    MissingPosition,

    /// Store failure while appending.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Rejections and failures of `claim`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimError {
    /// No request with this id.
    #[error("Request not found: {0}")]
    NotFound(RequestId),

    /// Request was cancelled and accepts no claims.
    ///
    /// A request stored as `expired` yields [`ClaimError::Expired`] instead.
    #[error("Request {id} is {status}")]
    AlreadyTerminal {
        /// Request id
        id: RequestId,
        /// Status found under the lock
        status: RequestStatus,
    },

    /// The author tried to claim their own request.
    #[error("Cannot claim own request {0}")]
    SelfClaim(RequestId),

    /// The shift ended; the request is (now) expired.
    #[error("Request {0} has expired")]
    Expired(RequestId),

    /// This claimant already holds a slot.
    #[error("Already claimed request {0}")]
    DuplicateClaim(RequestId),

    /// Every slot is taken.
    #[error("Request {id} is full ({capacity}/{capacity})")]
    Full {
        /// Request id
        id: RequestId,
        /// Slot limit
        capacity: usize,
    },

    /// Store failure; surfaced to the caller, never retried here.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClaimError {
    /// Short machine-readable label, used for metrics and API error codes.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AlreadyTerminal { .. } => "already_terminal",
            Self::SelfClaim(_) => "self_claim",
            Self::Expired(_) => "expired",
            Self::DuplicateClaim(_) => "duplicate_claim",
            Self::Full { .. } => "full",
            Self::Store(_) => "store_unavailable",
        }
    }
}

/// Rejections and failures of `cancel`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CancelError {
    /// No request with this id.
    #[error("Request not found: {0}")]
    NotFound(RequestId),

    /// Only the author may cancel.
    #[error("Only the author can cancel request {0}")]
    NotAuthor(RequestId),

    /// Request is no longer open.
    #[error("Request {id} is {status}")]
    AlreadyTerminal {
        /// Request id
        id: RequestId,
        /// Status found under the lock
        status: RequestStatus,
    },

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure to fetch the reference catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Catalog fetch failed: {0}")]
pub struct CatalogError(pub String);

/// Failure of a notifier or poster call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// Transport-level failure (network, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote platform rejected the call.
    #[error("Rejected by platform: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_error_labels_are_stable() {
        let id = RequestId::new(3);
        assert_eq!(ClaimError::Full { id, capacity: 5 }.label(), "full");
        assert_eq!(ClaimError::Expired(id).label(), "expired");
        assert_eq!(
            ClaimError::from(StoreError::Unavailable("timeout".into())).label(),
            "store_unavailable"
        );
    }

    #[test]
    fn cancelled_claim_is_reported_as_terminal() {
        let err = ClaimError::AlreadyTerminal {
            id: RequestId::new(4),
            status: RequestStatus::Cancelled,
        };
        assert_eq!(err.label(), "already_terminal");
        assert_eq!(err.to_string(), "Request 4 is cancelled");
    }

    #[test]
    fn full_message_reports_slots() {
        let err = ClaimError::Full {
            id: RequestId::new(9),
            capacity: 3,
        };
        assert_eq!(err.to_string(), "Request 9 is full (3/3)");
    }

    #[test]
    fn shift_window_error_converts_into_submit_error() {
        let err: SubmitError = ShiftWindowError::NotOnQuarterHour.into();
        assert!(matches!(
            err,
            SubmitError::InvalidShiftWindow(ShiftWindowError::NotOnQuarterHour)
        ));
    }
}
