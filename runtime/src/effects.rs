//! Side effect queue and the worker that drains it.
//!
//! The engine pushes [`SideEffect`]s onto an unbounded channel after its store
//! writes have completed and its lock is released. The [`EffectWorker`] executes
//! them one by one against the notifier and poster. Every failure is logged,
//! counted and reported to the operator chat; none is retried or propagated.

use crate::lock_registry::LockRegistry;
use crate::metrics::EffectMetrics;
use crate::render;
use shiftmatch_core::effect::SideEffect;
use shiftmatch_core::environment::Clock;
use shiftmatch_core::error::{PortError, StoreError};
use shiftmatch_core::ports::{Notifier, Poster};
use shiftmatch_core::store::RequestStore;
use shiftmatch_core::types::{PostRef, Request, RequestId, RequestPatch};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Sending half of the side effect queue.
#[derive(Debug, Clone)]
pub struct EffectSender {
    tx: mpsc::UnboundedSender<SideEffect>,
}

impl EffectSender {
    /// Create a queue, returning the sender and the receiver for the worker.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SideEffect>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue effects in order.
    pub fn emit_all(&self, effects: impl IntoIterator<Item = SideEffect>) {
        for effect in effects {
            let kind = effect.kind();
            if self.tx.send(effect).is_err() {
                tracing::warn!(kind, "Side effect dropped: worker has stopped");
            }
        }
    }
}

/// Executes queued side effects.
pub struct EffectWorker {
    notifier: Arc<dyn Notifier>,
    poster: Arc<dyn Poster>,
    store: Arc<dyn RequestStore>,
    locks: Arc<LockRegistry>,
    clock: Arc<dyn Clock>,
}

impl EffectWorker {
    /// Create a worker. `store` and `locks` must be the ones the engine uses,
    /// since publication writes the post handle back under the request lock.
    #[must_use]
    pub fn new(
        notifier: Arc<dyn Notifier>,
        poster: Arc<dyn Poster>,
        store: Arc<dyn RequestStore>,
        locks: Arc<LockRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            notifier,
            poster,
            store,
            locks,
            clock,
        }
    }

    /// Drain the queue until shutdown is signalled or every sender is gone.
    ///
    /// On shutdown, effects already queued are still executed.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<SideEffect>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                effect = rx.recv() => match effect {
                    Some(effect) => self.execute(effect).await,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        rx.close();
                        while let Some(effect) = rx.recv().await {
                            self.execute(effect).await;
                        }
                        break;
                    }
                }
            }
        }
        tracing::info!("Side effect worker stopped");
    }

    /// Execute one effect. Never fails; problems are logged and alerted.
    pub async fn execute(&self, effect: SideEffect) {
        let kind = effect.kind();
        let result = match effect {
            SideEffect::Publish {
                request_id,
                text,
                affordance,
            } => match self.poster.publish(text, affordance).await {
                Ok(post) => {
                    self.record_publication(request_id, post).await;
                    Ok(())
                }
                Err(e) => Err(format!("Failed to publish request {request_id}: {e}")),
            },
            SideEffect::UpdatePost { post, text, affordance } => self
                .poster
                .update(post, text, affordance)
                .await
                .map_err(|e| format!("Failed to update post {post}: {e}")),
            SideEffect::RetractPost { post } => self
                .poster
                .retract(post)
                .await
                .map_err(|e| format!("Failed to retract post {post}: {e}")),
            SideEffect::Notify { user, text } => self
                .notifier
                .send(user, text)
                .await
                .map_err(|e| format!("Failed to notify user {user}: {e}")),
            SideEffect::Alert { text } => {
                if let Err(e) = self.notifier.alert(text).await {
                    tracing::warn!(error = %e, "Operator alert failed");
                    EffectMetrics::record_failure(kind);
                } else {
                    EffectMetrics::record_execution(kind);
                }
                return;
            }
        };

        match result {
            Ok(()) => EffectMetrics::record_execution(kind),
            Err(message) => {
                EffectMetrics::record_failure(kind);
                tracing::warn!(kind, "{message}");
                self.alert(message).await;
            }
        }
    }

    async fn alert(&self, text: String) {
        if let Err(e) = self.notifier.alert(text).await {
            tracing::warn!(error = %e, "Operator alert failed");
        }
    }

    /// Store the handle of a fresh posting, or take the posting down again if
    /// the request closed while it was being published.
    async fn record_publication(&self, request_id: RequestId, post: PostRef) {
        let outcome = {
            let _guard = self.locks.lock(request_id).await;
            self.write_back(request_id, post).await
        };

        match outcome {
            Ok(WriteBack::Recorded { stale: None }) => {
                tracing::debug!(request_id = %request_id, post = %post, "Post handle recorded");
            }
            Ok(WriteBack::Recorded { stale: Some(request) }) => {
                if let Err(e) = self
                    .poster
                    .update(post, render::post_text(&request), render::affordance(&request))
                    .await
                {
                    self.report(request_id, "update", &e).await;
                }
            }
            Ok(WriteBack::Closed) => {
                tracing::info!(request_id = %request_id, "Request closed before publication finished, retracting");
                if let Err(e) = self.poster.retract(post).await {
                    self.report(request_id, "retract", &e).await;
                }
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Failed to record post handle");
                EffectMetrics::record_failure("publish");
                self.alert(format!("Failed to save post link for request {request_id}: {e}"))
                    .await;
            }
        }
    }

    async fn write_back(&self, request_id: RequestId, post: PostRef) -> Result<WriteBack, StoreError> {
        let Some(request) = self.store.find(request_id).await? else {
            return Ok(WriteBack::Closed);
        };
        if request.status.is_closed() {
            return Ok(WriteBack::Closed);
        }

        let patch = RequestPatch {
            channel_post_ref: Some(Some(post)),
            updated_at: Some(self.clock.now()),
            ..RequestPatch::default()
        };
        self.store.update_fields(request_id, patch).await?;

        // Claims accepted before the handle existed could not refresh the post.
        let stale = (request.filled_slots > 0).then_some(request);
        Ok(WriteBack::Recorded { stale })
    }

    async fn report(&self, request_id: RequestId, action: &str, error: &PortError) {
        EffectMetrics::record_failure("publish");
        tracing::warn!(request_id = %request_id, action, error = %error, "Post follow-up failed");
        self.alert(format!("Failed to {action} post of request {request_id}: {error}"))
            .await;
    }
}

enum WriteBack {
    Recorded { stale: Option<Request> },
    Closed,
}
