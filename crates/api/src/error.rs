use axum::http::header::{RETRY_AFTER, WWW_AUTHENTICATE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use gatekeep_core::error::AuthError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`AuthError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `gatekeep_auth`.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Missing or malformed credentials on the request itself.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// HTTP status for each domain error.
fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials
        | AuthError::InvalidToken
        | AuthError::ExpiredToken
        | AuthError::TokenRevoked
        | AuthError::SessionNotFound
        | AuthError::AccountNotFound => StatusCode::UNAUTHORIZED,
        AuthError::EmailNotVerified
        | AuthError::AccountDeactivated
        | AuthError::InsufficientRole => StatusCode::FORBIDDEN,
        AuthError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        AuthError::InvalidResetToken
        | AuthError::InvalidVerificationToken
        | AuthError::IncorrectCurrentPassword
        | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
        AuthError::EmailAlreadyRegistered => StatusCode::CONFLICT,
        AuthError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Auth(err) => {
                let status = auth_status(err);
                let message = match err {
                    AuthError::StoreUnavailable(detail) => {
                        tracing::error!(error = %detail, "Session store unavailable");
                        "Service temporarily unavailable".to_string()
                    }
                    AuthError::Internal(detail) => {
                        tracing::error!(error = %detail, "Internal auth error");
                        "An internal error occurred".to_string()
                    }
                    other => other.to_string(),
                };
                (status, err.code(), message)
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        let mut response = (status, axum::Json(body)).into_response();
        if let AppError::Auth(AuthError::RateLimitExceeded {
            retry_after_seconds,
        }) = &self
        {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(*retry_after_seconds));
        }
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
