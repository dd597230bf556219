//! Recording notifier and poster

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Only poisoned mutexes panic

use shiftmatch_core::error::PortError;
use shiftmatch_core::ports::{ClaimAffordance, Notifier, Poster};
use shiftmatch_core::store::BoxFuture;
use shiftmatch_core::types::{PostRef, UserId};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// Notifier that records what it was asked to deliver.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, String)>>,
    alerts: Mutex<Vec<String>>,
    failing: Mutex<HashSet<UserId>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every message to `user`.
    pub fn fail_for(&self, user: UserId) {
        self.failing.lock().unwrap().insert(user);
    }

    /// Delivered messages in order.
    #[must_use]
    pub fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Delivered messages for one user.
    #[must_use]
    pub fn messages_for(&self, user: UserId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| *to == user)
            .map(|(_, text)| text)
            .collect()
    }

    /// Operator alerts in order.
    #[must_use]
    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, user: UserId, text: String) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            if self.failing.lock().unwrap().contains(&user) {
                return Err(PortError::Rejected(format!("chat {user} not found")));
            }
            self.sent.lock().unwrap().push((user, text));
            Ok(())
        })
    }

    fn alert(&self, text: String) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.alerts.lock().unwrap().push(text);
            Ok(())
        })
    }
}

/// One call made to a [`RecordingPoster`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostCall {
    /// `publish` returned `post`
    Publish {
        /// Assigned handle
        post: PostRef,
        /// Post text
        text: String,
        /// Claim button
        affordance: ClaimAffordance,
    },
    /// `update`
    Update {
        /// Target handle
        post: PostRef,
        /// New text
        text: String,
        /// New claim button
        affordance: ClaimAffordance,
    },
    /// `retract`
    Retract(PostRef),
}

/// Poster that hands out sequential handles and records every call.
#[derive(Debug)]
pub struct RecordingPoster {
    next: AtomicI64,
    calls: Mutex<Vec<PostCall>>,
    failing: AtomicBool,
}

impl Default for RecordingPoster {
    fn default() -> Self {
        Self {
            next: AtomicI64::new(500),
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }
}

impl RecordingPoster {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Calls in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PostCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Handle returned by the most recent successful publish.
    #[must_use]
    pub fn last_published(&self) -> Option<PostRef> {
        self.calls().into_iter().rev().find_map(|call| match call {
            PostCall::Publish { post, .. } => Some(post),
            _ => None,
        })
    }

    /// Handles that were published and not retracted since.
    #[must_use]
    pub fn live_posts(&self) -> Vec<PostRef> {
        let mut live = Vec::new();
        for call in self.calls() {
            match call {
                PostCall::Publish { post, .. } => live.push(post),
                PostCall::Retract(post) => live.retain(|p| *p != post),
                PostCall::Update { .. } => {}
            }
        }
        live
    }

    fn check(&self) -> Result<(), PortError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(PortError::Transport("poster switched off".into()))
        } else {
            Ok(())
        }
    }
}

impl Poster for RecordingPoster {
    fn publish(&self, text: String, affordance: ClaimAffordance) -> BoxFuture<'_, Result<PostRef, PortError>> {
        Box::pin(async move {
            self.check()?;
            let post = PostRef::new(self.next.fetch_add(1, Ordering::SeqCst));
            self.calls.lock().unwrap().push(PostCall::Publish { post, text, affordance });
            Ok(post)
        })
    }

    fn update(&self, post: PostRef, text: String, affordance: ClaimAffordance) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.check()?;
            self.calls.lock().unwrap().push(PostCall::Update { post, text, affordance });
            Ok(())
        })
    }

    fn retract(&self, post: PostRef) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            self.check()?;
            self.calls.lock().unwrap().push(PostCall::Retract(post));
            Ok(())
        })
    }
}
