//! Health check endpoints.
//!
//! Used by load balancers and monitoring systems to verify service health.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shiftmatch_core::types::RequestId;
use std::time::Duration;

const STORE_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Simple health check endpoint (for basic liveness).
///
/// Does NOT check dependencies.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness report.
#[derive(Debug, Serialize)]
pub struct Readiness {
    /// `ready` or `unavailable`
    pub status: &'static str,
    /// Whether the request store answered a probe
    pub store: bool,
    /// Active shops in the current catalog snapshot
    pub active_shops: usize,
    /// When the current catalog snapshot was built
    pub catalog_built_at: Option<DateTime<Utc>>,
}

/// Health check with dependency diagnostics (for readiness).
///
/// Probes the request store with a point lookup and reports the catalog
/// snapshot without refreshing it. An empty catalog does not make the
/// service unready; submissions that name no shop still work.
///
/// # Status Codes
///
/// - 200 OK: store reachable
/// - 503 Service Unavailable: store unreachable
///
/// # Endpoint
///
/// ```text
/// GET /health/ready
/// ```
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let probe = tokio::time::timeout(STORE_PROBE_TIMEOUT, state.engine.request(RequestId::new(0))).await;
    let store = matches!(probe, Ok(Ok(_)));
    if !store {
        tracing::warn!("Readiness probe: request store unreachable");
    }

    let snapshot = state.cache.peek();
    let body = Readiness {
        status: if store { "ready" } else { "unavailable" },
        store,
        active_shops: snapshot.active_shop_count(),
        catalog_built_at: snapshot.built_at(),
    };
    let status = if store {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
