//! Error types for the progression engine.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in engine operations.
///
/// Every variant maps to a distinct caller-facing status; no raw storage or
/// serialization error crosses the API boundary uncaught.
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced catalog entity or link is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness violation - duplicate link, duplicate username
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Prerequisite not satisfied
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Missing or invalid caller identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (non-admin on a privileged op)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl Error {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Storage(_) | Error::Serialization(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the logs, not the response body.
        let message = match &self {
            Error::Storage(e) => {
                tracing::error!("storage error: {e}");
                "Internal error".to_string()
            }
            Error::Serialization(e) => {
                tracing::error!("serialization error: {e}");
                "Internal error".to_string()
            }
            Error::Io(e) => {
                tracing::error!("io error: {e}");
                "Internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(Error::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            Error::PreconditionFailed("x".into()).status(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            Error::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(Error::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            Error::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Storage("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
