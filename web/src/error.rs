//! Error types for web handlers.
//!
//! [`AppError`] bridges domain errors and HTTP responses. Every expected
//! claim, submission and cancellation outcome maps to its own status and
//! machine-readable code so the conversational front-end can pick a message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use shiftmatch_core::error::{CancelError, CatalogError, ClaimError, StoreError, SubmitError};
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Request>, AppError> {
///     let request = state.engine.request(RequestId::new(id)).await?
///         .ok_or_else(|| AppError::not_found("Request", id))?;
///     Ok(Json(request))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: &'static str) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code of this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "BAD_REQUEST")
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message.into(), "UNAUTHORIZED")
    }

    /// 403 Forbidden.
    #[must_use]
    pub fn forbidden(message: impl Into<String>, code: &'static str) -> Self {
        Self::new(StatusCode::FORBIDDEN, message.into(), code)
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND",
        )
    }

    /// 409 Conflict with a specific code.
    #[must_use]
    pub fn conflict(message: impl Into<String>, code: &'static str) -> Self {
        Self::new(StatusCode::CONFLICT, message.into(), code)
    }

    /// 422 Unprocessable Entity with a specific code.
    #[must_use]
    pub fn validation(message: impl Into<String>, code: &'static str) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message.into(), code)
    }

    /// 503 Service Unavailable.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message.into(), "STORE_UNAVAILABLE")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    error = %source,
                    "Request failed"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Request failed"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::unavailable("Storage is temporarily unavailable").with_source(err.into())
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Reference catalog could not be refreshed".into(),
            "CATALOG_UNAVAILABLE",
        )
        .with_source(err.into())
    }
}

impl From<ClaimError> for AppError {
    fn from(err: ClaimError) -> Self {
        let message = err.to_string();
        match err {
            ClaimError::NotFound(id) => Self::not_found("Request", id),
            ClaimError::SelfClaim(_) => Self::conflict(message, "SELF_CLAIM"),
            ClaimError::DuplicateClaim(_) => Self::conflict(message, "DUPLICATE_CLAIM"),
            ClaimError::Full { .. } => Self::conflict(message, "FULL"),
            ClaimError::AlreadyTerminal { .. } => Self::conflict(message, "ALREADY_TERMINAL"),
            ClaimError::Expired(_) => Self::new(StatusCode::GONE, message, "EXPIRED"),
            ClaimError::Store(e) => e.into(),
        }
    }
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        let message = err.to_string();
        match err {
            SubmitError::InvalidShiftWindow(_) => Self::validation(message, "INVALID_SHIFT_WINDOW"),
            SubmitError::UnknownShop(_) => Self::validation(message, "UNKNOWN_SHOP"),
            SubmitError::MissingPosition => Self::validation(message, "MISSING_POSITION"),
            SubmitError::Store(e) => e.into(),
        }
    }
}

impl From<CancelError> for AppError {
    fn from(err: CancelError) -> Self {
        let message = err.to_string();
        match err {
            CancelError::NotFound(id) => Self::not_found("Request", id),
            CancelError::NotAuthor(_) => Self::forbidden(message, "NOT_AUTHOR"),
            CancelError::AlreadyTerminal { .. } => Self::conflict(message, "ALREADY_TERMINAL"),
            CancelError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftmatch_core::error::ShiftWindowError;
    use shiftmatch_core::types::{RequestId, RequestStatus};

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_claim_outcomes_map_to_distinct_codes() {
        let id = RequestId::new(4);
        let cases = [
            (ClaimError::NotFound(id), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (ClaimError::SelfClaim(id), StatusCode::CONFLICT, "SELF_CLAIM"),
            (ClaimError::DuplicateClaim(id), StatusCode::CONFLICT, "DUPLICATE_CLAIM"),
            (ClaimError::Full { id, capacity: 5 }, StatusCode::CONFLICT, "FULL"),
            (
                ClaimError::AlreadyTerminal {
                    id,
                    status: RequestStatus::Cancelled,
                },
                StatusCode::CONFLICT,
                "ALREADY_TERMINAL",
            ),
            (ClaimError::Expired(id), StatusCode::GONE, "EXPIRED"),
            (
                ClaimError::Store(StoreError::Unavailable("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
            ),
        ];
        for (err, status, code) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status(), status);
            assert_eq!(app.code(), code);
        }
    }

    #[test]
    fn test_submit_and_cancel_mapping() {
        let invalid = AppError::from(SubmitError::InvalidShiftWindow(ShiftWindowError::TooShort));
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(invalid.code(), "INVALID_SHIFT_WINDOW");

        let stranger = AppError::from(CancelError::NotAuthor(RequestId::new(1)));
        assert_eq!(stranger.status(), StatusCode::FORBIDDEN);
    }
}
