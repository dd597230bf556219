//! Intake endpoints used by the conversational front-end.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use shiftmatch_core::types::{PostRef, Request, RequestDraft, RequestId, RequestKind, UserId, UserProfile};
use shiftmatch_runtime::ClaimOutcome;

/// Body of `POST /api/requests/:id/claim`.
#[derive(Debug, Deserialize, Serialize)]
pub struct ClaimBody {
    /// User taking the slot
    pub claimant_id: UserId,
    /// Posting the claim came from, if any
    #[serde(default)]
    pub post_ref: Option<PostRef>,
}

/// Body of `POST /api/requests/:id/cancel`.
#[derive(Debug, Deserialize, Serialize)]
pub struct CancelBody {
    /// User asking to cancel
    pub actor_id: UserId,
}

/// Body of `PUT /api/users/:id`.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ProfileBody {
    /// Chosen role
    #[serde(default)]
    pub role: Option<RequestKind>,
    /// Handle
    #[serde(default)]
    pub username: Option<String>,
    /// Shared phone number
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Given name
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Response of a successful submission.
#[derive(Debug, Deserialize, Serialize)]
pub struct Submitted {
    /// New request id
    pub id: RequestId,
}

/// Create a request.
///
/// ```text
/// POST /api/requests
/// ```
///
/// # Errors
///
/// 422 for validation failures, 503 if the store is unavailable.
pub async fn submit(
    State(state): State<AppState>,
    Json(draft): Json<RequestDraft>,
) -> Result<(StatusCode, Json<Submitted>), AppError> {
    let id = state.engine.submit(draft).await?;
    Ok((StatusCode::CREATED, Json(Submitted { id })))
}

/// Current state of a request.
///
/// ```text
/// GET /api/requests/:id
/// ```
///
/// # Errors
///
/// 404 if unknown, 503 if the store is unavailable.
pub async fn get_request(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Request>, AppError> {
    let id = RequestId::new(id);
    let request = state
        .engine
        .request(id)
        .await?
        .ok_or_else(|| AppError::not_found("Request", id))?;
    Ok(Json(request))
}

/// Claim one slot.
///
/// ```text
/// POST /api/requests/:id/claim
/// ```
///
/// # Errors
///
/// 404, 409 (`SELF_CLAIM`, `DUPLICATE_CLAIM`, `FULL`, `ALREADY_TERMINAL`),
/// 410 (`EXPIRED`) or 503.
pub async fn claim(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ClaimBody>,
) -> Result<Json<ClaimOutcome>, AppError> {
    let outcome = state
        .engine
        .claim(RequestId::new(id), body.claimant_id, body.post_ref)
        .await?;
    Ok(Json(outcome))
}

/// Withdraw an open request.
///
/// ```text
/// POST /api/requests/:id/cancel
/// ```
///
/// # Errors
///
/// 404, 403 (`NOT_AUTHOR`), 409 (`ALREADY_TERMINAL`) or 503.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<CancelBody>,
) -> Result<StatusCode, AppError> {
    state.engine.cancel(RequestId::new(id), body.actor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Register or update a user's contact details.
///
/// ```text
/// PUT /api/users/:id
/// ```
///
/// # Errors
///
/// 503 if the store is unavailable.
pub async fn register_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ProfileBody>,
) -> Result<StatusCode, AppError> {
    let profile = UserProfile {
        id: UserId::new(id),
        role: body.role,
        username: body.username,
        phone_number: body.phone_number,
        first_name: body.first_name,
        last_name: body.last_name,
        updated_at: state.clock.now(),
    };
    state.engine.register_user(profile).await?;
    Ok(StatusCode::NO_CONTENT)
}
