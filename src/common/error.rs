// Error handling types for the HTTP boundary

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt;
use tracing::{error, warn};

use crate::auth::error::AuthError;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    InternalServer(String),
    ServiceUnavailable(String),
    DatabaseError(sqlx::Error),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::InternalServer(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service Unavailable: {}", msg),
            ApiError::DatabaseError(e) => write!(f, "Database Error: {}", e),
        }
    }
}

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message, code) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED"),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "FORBIDDEN"),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            ApiError::InternalServer(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                msg,
                "INTERNAL_SERVER_ERROR",
            ),
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                msg,
                "SERVICE_UNAVAILABLE",
            ),
            ApiError::DatabaseError(e) => {
                error!(error = %e, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database operation failed".to_string(),
                    "DATABASE_ERROR",
                )
            }
        };

        let error_response = ErrorResponse {
            error: error_message,
            code: code.to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}

/// Maps tagged auth error kinds onto HTTP responses.
///
/// User-declined and CSRF failures are user-facing and fatal to the attempt;
/// provider failures are retryable; identity conflicts are logged in full but
/// surfaced generically; all session validation failures require re-login.
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::StateMismatch => {
                ApiError::BadRequest("login attempt is invalid or has expired".to_string())
            }
            AuthError::ProviderDenied => {
                ApiError::BadRequest("authorization was declined".to_string())
            }
            AuthError::ProviderError(msg) => {
                warn!(detail = %msg, "Provider call failed");
                ApiError::ServiceUnavailable(
                    "identity provider is unavailable, please retry".to_string(),
                )
            }
            AuthError::IdentityUnverified => ApiError::Forbidden(
                "email address is not verified with the provider; verify it there and retry"
                    .to_string(),
            ),
            AuthError::IdentityConflict => {
                error!("Identity conflict during account resolution; manual investigation required");
                ApiError::InternalServer("login failed".to_string())
            }
            AuthError::InvalidToken => ApiError::Unauthorized("invalid session".to_string()),
            AuthError::Expired | AuthError::AlreadyExpired => {
                ApiError::Unauthorized("session expired".to_string())
            }
            AuthError::Revoked => {
                ApiError::Unauthorized("session revoked, please sign in again".to_string())
            }
            AuthError::NotRefreshable => {
                ApiError::BadRequest("session has no provider tokens to refresh".to_string())
            }
            AuthError::Database(e) => ApiError::DatabaseError(e),
            AuthError::Vault(e) => {
                error!(error = %e, "Credential vault failure");
                ApiError::InternalServer("credential handling failed".to_string())
            }
            AuthError::TokenMint(e) => {
                error!(error = %e, "Session token minting failed");
                ApiError::InternalServer("session issuance failed".to_string())
            }
        }
    }
}
