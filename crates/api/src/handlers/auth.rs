//! Handlers for registration, login, refresh, logout and the current user.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use gatekeep_auth::service::auth::{
    LoginRequest as LoginInput, PresentedAccessToken, RegisterRequest as RegisterInput, BEARER,
};
use gatekeep_auth::UserProfile;
use gatekeep_core::types::DbId;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::client::ClientInfo;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for `POST /auth/refresh` and `POST /auth/logout`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Request body for `POST /auth/verify-email`.
#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// Request body for `POST /auth/verify-email/resend`.
#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

/// Successful login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub session_id: DbId,
    pub user: UserProfile,
}

/// Successful refresh response. The refresh token is not rotated.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// The authenticated caller as seen by `GET /auth/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: DbId,
    pub email: String,
    pub role: String,
    pub npo_id: Option<DbId>,
    pub email_verified: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
///
/// Create an account. It stays inactive until the emailed token is redeemed.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserProfile>)> {
    let profile = state
        .auth
        .register(RegisterInput {
            email: input.email,
            password: input.password,
            first_name: input.first_name,
            last_name: input.last_name,
            phone: input.phone,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// POST /api/v1/auth/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    Json(input): Json<VerifyEmailRequest>,
) -> AppResult<Json<UserProfile>> {
    let profile = state.auth.verify_email(&input.token).await?;
    Ok(Json(profile))
}

/// POST /api/v1/auth/verify-email/resend
///
/// Always answers 202 so the response does not reveal whether the address
/// is registered.
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(input): Json<ResendVerificationRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    state.auth.resend_verification(&input.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "If the address is registered and unverified, a new link has been sent",
        }),
    ))
}

/// POST /api/v1/auth/login
///
/// Authenticate with email + password. Every attempt counts against the
/// caller's IP, whether it succeeds or not.
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    // 1. Throttle by client IP before touching credentials.
    state
        .rate_limiter
        .check(&state.login_policy, client.rate_limit_key())
        .await?;

    // 2. Authenticate and open the session.
    let outcome = state
        .auth
        .login(LoginInput {
            email: input.email,
            password: input.password,
            client: client.into_meta(),
        })
        .await?;

    Ok(Json(LoginResponse {
        access_token: outcome.access_token,
        refresh_token: outcome.refresh_token,
        token_type: BEARER,
        expires_in: outcome.expires_in,
        session_id: outcome.session_id,
        user: outcome.user,
    }))
}

/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    let outcome = state.auth.refresh(&input.refresh_token).await?;
    Ok(Json(RefreshResponse {
        access_token: outcome.access_token,
        token_type: BEARER,
        expires_in: outcome.expires_in,
    }))
}

/// POST /api/v1/auth/logout
///
/// Closes the session of the given refresh token and revokes the access
/// token used to make this request. Repeating it succeeds.
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<MessageResponse>> {
    let access = PresentedAccessToken {
        token_id: principal.token_id().to_string(),
        expires_at: principal.token_expires_at(),
    };
    state
        .auth
        .logout(principal.user_id(), &input.refresh_token, Some(&access))
        .await?;
    Ok(Json(MessageResponse {
        message: "Logged out",
    }))
}

/// GET /api/v1/auth/me
pub async fn me(AuthUser(principal): AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: principal.user_id(),
        email: principal.email().to_string(),
        role: principal.role().to_string(),
        npo_id: principal.npo_id(),
        email_verified: principal.email_verified(),
    })
}
