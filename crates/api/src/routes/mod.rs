pub mod admin;
pub mod auth;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                     register (public)
/// /auth/verify-email                 redeem verification token (public)
/// /auth/verify-email/resend          resend verification link (public)
/// /auth/login                        login (public, rate limited per IP)
/// /auth/refresh                      refresh (public)
/// /auth/logout                       logout (requires auth)
/// /auth/me                           current principal (requires auth)
/// /auth/password/reset               request reset (public, rate limited per IP)
/// /auth/password/reset/confirm       confirm reset (public)
/// /auth/password/change              change password (requires auth)
/// /auth/sessions                     list own sessions (requires auth)
/// /auth/sessions/{id}                revoke own session (requires auth)
///
/// /admin/users/{id}/sessions         list a user's sessions (super admin)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/admin", admin::router())
}
