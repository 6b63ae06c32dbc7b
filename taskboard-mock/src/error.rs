//! Request failures and their JSON rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// A handler failure, rendered as `{"message": ...}` with a matching status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MockError {
    /// Missing, malformed or expired credential; wrong password.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (unverified account).
    #[error("{0}")]
    Forbidden(String),

    /// No such entity for this user.
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation.
    #[error("{0}")]
    Conflict(String),

    /// Request body failed validation.
    #[error("{0}")]
    BadRequest(String),

    /// Injected server-side failure.
    #[error("{0}")]
    Internal(String),
}

impl MockError {
    /// HTTP status for this failure.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn not_found(kind: &str, id: &str) -> Self {
        Self::NotFound(format!("{kind} {id} not found"))
    }
}

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(status = status.as_u16(), message = %self, "request failed");
        (status, Json(serde_json::json!({ "message": self.to_string() }))).into_response()
    }
}
