//! Prometheus metrics for the matching engine.
//!
//! This module provides metric collection for:
//! - Claim outcomes and submissions
//! - Expiry sweeps
//! - Reference catalog refreshes
//! - Side effect execution
//!
//! # Example
//!
//! ```rust,no_run
//! use shiftmatch_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Render for a scrape endpoint
//! let body = server.render().unwrap_or_default();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address its scrape endpoint is served on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint should bind to.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder
    /// that is already installed (several servers in one test binary) is not
    /// an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!("shiftmatch_claims_total", "Claim attempts by outcome");
    describe_histogram!(
        "shiftmatch_claim_duration_seconds",
        "Time spent inside the claim critical section"
    );
    describe_counter!("shiftmatch_submissions_total", "Submissions by outcome");
    describe_counter!("shiftmatch_cancellations_total", "Author cancellations");

    describe_counter!("shiftmatch_requests_expired_total", "Requests moved to expired");
    describe_counter!("shiftmatch_sweep_failures_total", "Per-request sweep failures");
    describe_histogram!("shiftmatch_sweep_duration_seconds", "Time taken by one sweep");

    describe_counter!("shiftmatch_catalog_refreshes_total", "Catalog refreshes by outcome");
    describe_gauge!("shiftmatch_catalog_active_shops", "Active shops in the current snapshot");
    describe_histogram!(
        "shiftmatch_catalog_refresh_duration_seconds",
        "Time taken to fetch and index the catalog"
    );

    describe_counter!("shiftmatch_effects_executed_total", "Side effects executed by kind");
    describe_counter!("shiftmatch_effects_failed_total", "Side effects that failed by kind");
}

/// Claim and submission metrics recorder.
pub struct ClaimMetrics;

impl ClaimMetrics {
    /// Record a claim attempt and its outcome label.
    pub fn record_claim(outcome: &'static str, duration: Duration) {
        counter!("shiftmatch_claims_total", "outcome" => outcome).increment(1);
        histogram!("shiftmatch_claim_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a submission outcome.
    pub fn record_submission(outcome: &'static str) {
        counter!("shiftmatch_submissions_total", "outcome" => outcome).increment(1);
    }

    /// Record an author cancellation.
    pub fn record_cancellation() {
        counter!("shiftmatch_cancellations_total").increment(1);
    }
}

/// Expiry metrics recorder.
pub struct SweepMetrics;

impl SweepMetrics {
    /// Record one request transitioning to expired.
    pub fn record_expired() {
        counter!("shiftmatch_requests_expired_total").increment(1);
    }

    /// Record a completed sweep.
    pub fn record_sweep(failed: usize, duration: Duration) {
        counter!("shiftmatch_sweep_failures_total").increment(failed as u64);
        histogram!("shiftmatch_sweep_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Reference catalog metrics recorder.
pub struct CatalogMetrics;

impl CatalogMetrics {
    /// Record a successful refresh.
    #[allow(clippy::cast_precision_loss)] // Shop counts are small
    pub fn record_refresh(active_shops: usize, duration: Duration) {
        counter!("shiftmatch_catalog_refreshes_total", "outcome" => "ok").increment(1);
        gauge!("shiftmatch_catalog_active_shops").set(active_shops as f64);
        histogram!("shiftmatch_catalog_refresh_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a failed refresh.
    pub fn record_failure() {
        counter!("shiftmatch_catalog_refreshes_total", "outcome" => "error").increment(1);
    }
}

/// Side effect metrics recorder.
pub struct EffectMetrics;

impl EffectMetrics {
    /// Record an executed effect.
    pub fn record_execution(kind: &'static str) {
        counter!("shiftmatch_effects_executed_total", "kind" => kind).increment(1);
    }

    /// Record a failed effect.
    pub fn record_failure(kind: &'static str) {
        counter!("shiftmatch_effects_failed_total", "kind" => kind).increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;

    #[test]
    fn server_starts_without_handle() {
        let server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[test]
    fn recorded_metrics_render() {
        let mut server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        server.start().unwrap();

        ClaimMetrics::record_claim("accepted", Duration::from_millis(4));
        SweepMetrics::record_expired();
        CatalogMetrics::record_refresh(12, Duration::from_millis(30));
        EffectMetrics::record_failure("notify");

        // Another test may have installed the recorder first.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("shiftmatch_claims_total"));
            assert!(rendered.contains("shiftmatch_catalog_active_shops"));
        }
    }
}
