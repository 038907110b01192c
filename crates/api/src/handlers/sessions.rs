//! Handlers for listing and revoking sessions.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use gatekeep_core::error::AuthError;
use gatekeep_core::types::{DbId, Timestamp};
use gatekeep_db::models::session::Session;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireSuperAdmin;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    #[serde(default = "default_active_only")]
    pub active_only: bool,
}

fn default_active_only() -> bool {
    true
}

/// A session as shown to its owner. The refresh token id is not exposed.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: DbId,
    pub device_info: Option<String>,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
    /// Whether this is the session making the request.
    pub current: bool,
}

impl SessionView {
    fn new(session: Session, current_token_id: Option<&str>) -> Self {
        Self {
            current: current_token_id == Some(session.refresh_token_jti.as_str()),
            id: session.id,
            device_info: session.device_info,
            ip_address: session.ip_address,
            user_agent: session.user_agent,
            created_at: session.created_at,
            expires_at: session.expires_at,
            revoked_at: session.revoked_at,
        }
    }
}

/// GET /api/v1/auth/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Query(query): Query<ListSessionsQuery>,
) -> AppResult<Json<Vec<SessionView>>> {
    let sessions = state
        .auth
        .list_sessions(principal.user_id(), query.active_only)
        .await?;
    Ok(Json(
        sessions
            .into_iter()
            .map(|s| SessionView::new(s, principal.session_id()))
            .collect(),
    ))
}

/// DELETE /api/v1/auth/sessions/{id}
pub async fn revoke_session(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(session_id): Path<DbId>,
) -> AppResult<StatusCode> {
    match state.auth.revoke_session(principal.user_id(), session_id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(AuthError::SessionNotFound) => Err(AppError::NotFound(format!(
            "Session {session_id} not found"
        ))),
        Err(e) => Err(e.into()),
    }
}

/// GET /api/v1/admin/users/{id}/sessions
///
/// Super-admin view of any user's sessions.
pub async fn list_user_sessions(
    State(state): State<AppState>,
    RequireSuperAdmin(_admin): RequireSuperAdmin,
    Path(user_id): Path<DbId>,
    Query(query): Query<ListSessionsQuery>,
) -> AppResult<Json<Vec<SessionView>>> {
    let sessions = state.auth.list_sessions(user_id, query.active_only).await?;
    Ok(Json(
        sessions
            .into_iter()
            .map(|s| SessionView::new(s, None))
            .collect(),
    ))
}
