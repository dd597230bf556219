//! Operator hooks: force a catalog refresh or an expiry sweep.
//!
//! Both are idempotent and safe to run alongside the background timers.
//! They require `Authorization: Bearer <ADMIN_TOKEN>`.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
};
use shiftmatch_runtime::{RefreshSummary, SweepReport};

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(AppError::forbidden("Operator hooks are disabled", "ADMIN_DISABLED"));
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    match presented {
        Some(token) if constant_time_eq::constant_time_eq(token.as_bytes(), expected.as_bytes()) => Ok(()),
        _ => {
            tracing::warn!("Rejected operator hook call with missing or wrong token");
            Err(AppError::unauthorized("Missing or invalid admin token"))
        }
    }
}

/// Rebuild the reference catalog now.
///
/// ```text
/// POST /admin/catalog/refresh
/// ```
///
/// # Errors
///
/// 401/403 if not authorized, 503 if the catalog source fails (the previous
/// snapshot stays active).
pub async fn refresh_catalog(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RefreshSummary>, AppError> {
    authorize(&state, &headers)?;
    let summary = state.cache.refresh().await?;
    tracing::info!(active_shops = summary.active_shops, "Catalog refreshed by operator");
    Ok(Json(summary))
}

/// Run one expiry sweep now.
///
/// ```text
/// POST /admin/sweep
/// ```
///
/// # Errors
///
/// 401/403 if not authorized, 503 if the store cannot list requests.
pub async fn sweep(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<SweepReport>, AppError> {
    authorize(&state, &headers)?;
    let report = state.sweeper.sweep_once().await?;
    tracing::info!(expired = report.expired, failed = report.failed, "Sweep run by operator");
    Ok(Json(report))
}
