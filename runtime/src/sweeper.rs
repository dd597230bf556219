//! Background expiry of requests whose shift has ended.

use crate::engine::MatchingEngine;
use crate::metrics::SweepMetrics;
use serde::Serialize;
use shiftmatch_core::error::StoreError;
use shiftmatch_core::types::RequestId;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Counters for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Requests listed as neither expired nor cancelled
    pub examined: usize,
    /// Requests moved to expired by this sweep
    pub expired: usize,
    /// Requests whose expiry failed; retried next sweep
    pub failed: usize,
}

/// Periodically expires requests past `end + grace`.
///
/// Each transition goes through the request's lock and re-reads the record,
/// so a sweep never races a claim on the same request.
pub struct ExpirySweeper {
    engine: Arc<MatchingEngine>,
    interval: Duration,
}

impl ExpirySweeper {
    /// Create a sweeper ticking every `interval`.
    #[must_use]
    pub const fn new(engine: Arc<MatchingEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Run one sweep now.
    ///
    /// Safe to call concurrently with the background loop and with claims.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only if the candidate listing fails. Failures on
    /// individual requests are logged and counted in the report.
    pub async fn sweep_once(&self) -> Result<SweepReport, StoreError> {
        let started = Instant::now();
        let grace = self.engine.settings().grace_period;
        let now = self.engine.clock().now();

        let candidates = self.engine.store().list_active().await?;
        let mut report = SweepReport {
            examined: candidates.len(),
            ..SweepReport::default()
        };

        for request in candidates.iter().filter(|r| !r.status.is_closed() && r.is_past_grace(now, grace)) {
            match self.expire_one(request.id).await {
                Ok(true) => report.expired += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(request_id = %request.id, error = %e, "Failed to expire request");
                }
            }
        }

        SweepMetrics::record_sweep(report.failed, started.elapsed());
        if report.expired > 0 || report.failed > 0 {
            tracing::info!(
                examined = report.examined,
                expired = report.expired,
                failed = report.failed,
                "Expiry sweep finished"
            );
        }
        Ok(report)
    }

    async fn expire_one(&self, id: RequestId) -> Result<bool, StoreError> {
        let effects = {
            let _guard = self.engine.locks().lock(id).await;

            let Some(fresh) = self.engine.store().find(id).await? else {
                return Ok(false);
            };
            let now = self.engine.clock().now();
            if fresh.status.is_closed() || !fresh.is_past_grace(now, self.engine.settings().grace_period) {
                return Ok(false);
            }
            self.engine.expire_locked(&fresh, now).await?
        };
        self.engine.effects().emit_all(effects);
        Ok(true)
    }

    /// Sweep every interval until shutdown is signalled.
    ///
    /// Shutdown is observed between sweeps; a sweep in progress finishes its
    /// current request first.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!(error = %e, "Expiry sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Expiry sweeper stopped");
    }
}
