//! Session ledger model and DTOs.

use gatekeep_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A session row from the `sessions` table.
///
/// Rows are never deleted by the application and the only permitted mutation
/// is the one-time transition of `revoked_at` from `NULL` to a timestamp.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Session {
    pub id: DbId,
    pub user_id: DbId,
    /// `jti` of the refresh token issued with this session.
    pub refresh_token_jti: String,
    pub device_info: Option<String>,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

impl Session {
    /// A session is active until it is revoked or reaches `expires_at`.
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

/// DTO for recording a new session.
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub user_id: DbId,
    pub refresh_token_jti: String,
    pub device_info: Option<String>,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub expires_at: Timestamp,
}
