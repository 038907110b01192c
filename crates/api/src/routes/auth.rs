//! Route definitions for the `/auth` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{auth, password, sessions};
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST   /register
/// POST   /verify-email
/// POST   /verify-email/resend
/// POST   /login
/// POST   /refresh
/// POST   /logout                  (requires auth)
/// GET    /me                      (requires auth)
/// POST   /password/reset
/// POST   /password/reset/confirm
/// POST   /password/change         (requires auth)
/// GET    /sessions                (requires auth)
/// DELETE /sessions/{id}           (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/verify-email", post(auth::verify_email))
        .route("/verify-email/resend", post(auth::resend_verification))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/password/reset", post(password::request_reset))
        .route("/password/reset/confirm", post(password::confirm_reset))
        .route("/password/change", post(password::change_password))
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/{id}", delete(sessions::revoke_session))
}
