//! Side effect commands.
//!
//! The engine never talks to the chat platform directly. After durable state
//! has been written it emits `SideEffect` values, and a separate worker executes
//! them against the [`crate::ports`] traits. Effects are descriptions, not
//! execution, so engine tests can assert on exactly what would be sent.

use crate::ports::ClaimAffordance;
use crate::types::{PostRef, RequestId, UserId};

/// A best-effort action to perform after a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Publish a new posting and record its handle on the request.
    Publish {
        /// Request the posting belongs to
        request_id: RequestId,
        /// Post text
        text: String,
        /// Claim button
        affordance: ClaimAffordance,
    },

    /// Refresh an existing posting.
    UpdatePost {
        /// Posting handle
        post: PostRef,
        /// New text
        text: String,
        /// New claim button
        affordance: ClaimAffordance,
    },

    /// Remove a posting.
    RetractPost {
        /// Posting handle
        post: PostRef,
    },

    /// Send a private message.
    Notify {
        /// Recipient
        user: UserId,
        /// Message text
        text: String,
    },

    /// Report an anomaly to the operator chat.
    Alert {
        /// Alert text
        text: String,
    },
}

impl SideEffect {
    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Publish { .. } => "publish",
            Self::UpdatePost { .. } => "update_post",
            Self::RetractPost { .. } => "retract_post",
            Self::Notify { .. } => "notify",
            Self::Alert { .. } => "alert",
        }
    }
}
