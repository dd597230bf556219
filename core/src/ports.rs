//! Outbound ports: private notices and the public posting channel.
//!
//! All calls are best-effort. Callers log failures and move on; nothing in the
//! engine waits on delivery.

use crate::error::PortError;
use crate::store::BoxFuture;
use crate::types::{PostRef, RequestId, UserId};
use serde::{Deserialize, Serialize};

/// The claim button attached to a public posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAffordance {
    /// Request the button claims
    pub request_id: RequestId,
    /// Button label
    pub label: String,
    /// Disabled once the request is full
    pub enabled: bool,
}

/// Delivers private messages.
pub trait Notifier: Send + Sync {
    /// Send `text` to `user`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError`] if delivery fails.
    fn send(&self, user: UserId, text: String) -> BoxFuture<'_, Result<(), PortError>>;

    /// Report an operational problem to the operator chat.
    ///
    /// The default implementation drops the alert.
    ///
    /// # Errors
    ///
    /// Returns [`PortError`] if delivery fails.
    fn alert(&self, text: String) -> BoxFuture<'_, Result<(), PortError>> {
        let _ = text;
        Box::pin(async { Ok(()) })
    }
}

/// Manages postings in the public channel.
pub trait Poster: Send + Sync {
    /// Publish a new posting and return its handle.
    ///
    /// # Errors
    ///
    /// Returns [`PortError`] if the platform rejects the post.
    fn publish(&self, text: String, affordance: ClaimAffordance) -> BoxFuture<'_, Result<PostRef, PortError>>;

    /// Replace the text and button of an existing posting.
    ///
    /// # Errors
    ///
    /// Returns [`PortError`] if the edit fails.
    fn update(&self, post: PostRef, text: String, affordance: ClaimAffordance) -> BoxFuture<'_, Result<(), PortError>>;

    /// Remove a posting.
    ///
    /// # Errors
    ///
    /// Returns [`PortError`] if the deletion fails.
    fn retract(&self, post: PostRef) -> BoxFuture<'_, Result<(), PortError>>;
}
