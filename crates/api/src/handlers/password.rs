//! Handlers for password reset and password change.

use axum::extract::State;
use axum::Json;
use gatekeep_auth::RateLimitPolicy;
use serde::Deserialize;

use super::auth::MessageResponse;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireVerified;
use crate::middleware::client::ClientInfo;
use crate::state::AppState;

/// Request body for `POST /auth/password/reset`.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// Request body for `POST /auth/password/reset/confirm`.
#[derive(Debug, Deserialize)]
pub struct ConfirmResetRequest {
    pub token: String,
    pub new_password: String,
}

/// Request body for `POST /auth/password/change`.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// POST /api/v1/auth/password/reset
///
/// Same response whether or not the address is registered.
pub async fn request_reset(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<ResetRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .rate_limiter
        .check(&RateLimitPolicy::PASSWORD_RESET, client.rate_limit_key())
        .await?;

    state.passwords.request_reset(&input.email).await;
    Ok(Json(MessageResponse {
        message: "If the address is registered, a reset link has been sent",
    }))
}

/// POST /api/v1/auth/password/reset/confirm
///
/// Signs the account out everywhere.
pub async fn confirm_reset(
    State(state): State<AppState>,
    Json(input): Json<ConfirmResetRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .passwords
        .confirm_reset(&input.token, &input.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset",
    }))
}

/// POST /api/v1/auth/password/change
///
/// Signs out every other session; the calling session stays valid.
pub async fn change_password(
    State(state): State<AppState>,
    RequireVerified(AuthUser(principal)): RequireVerified,
    Json(input): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .passwords
        .change_password(
            principal.user_id(),
            &input.current_password,
            &input.new_password,
            principal.session_id(),
        )
        .await?;
    Ok(Json(MessageResponse {
        message: "Password changed",
    }))
}
