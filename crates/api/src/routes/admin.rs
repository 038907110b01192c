//! Route definitions for the `/admin` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

/// Routes mounted at `/admin`. All require the `super_admin` role.
///
/// ```text
/// GET /users/{id}/sessions
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/users/{id}/sessions", get(sessions::list_user_sessions))
}
