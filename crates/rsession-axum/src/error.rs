//! Rejections produced by the session middleware and extractor.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Why a request could not be served with a session.
///
/// Clients only ever see a generic server error; details go to the log.
#[derive(Debug, Error)]
pub enum SessionRejection {
    /// The cookie-parser middleware did not run before the session
    /// middleware.
    #[error("Configuration error: request cookies were not parsed before the session middleware")]
    MissingCookies,

    /// A handler asked for a session on a route without the session
    /// middleware.
    #[error("Configuration error: no session attached to the request")]
    MissingSession,

    /// Other wiring or configuration problem.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The cache backend failed while loading or saving the session.
    #[error("Session backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rsession::Error> for SessionRejection {
    fn from(e: rsession::Error) -> Self {
        match e {
            rsession::Error::BackendUnavailable(msg) => SessionRejection::BackendUnavailable(msg),
            rsession::Error::Configuration(msg) => SessionRejection::Config(msg),
            other => SessionRejection::Internal(other.to_string()),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            SessionRejection::MissingCookies
            | SessionRejection::MissingSession
            | SessionRejection::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                "Internal server error",
            ),
            SessionRejection::BackendUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                "Service temporarily unavailable",
            ),
            SessionRejection::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };

        tracing::error!(status = %status, code, error = %self, "Session error");

        let body = ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
