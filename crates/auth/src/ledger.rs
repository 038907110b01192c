//! Durable, append-only record of every session ever created.
//!
//! Rows are never deleted; the only mutation is revocation, which happens at
//! most once per row.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use gatekeep_core::error::{AuthError, AuthResult};
use gatekeep_core::types::DbId;
use gatekeep_db::models::session::{CreateSession, Session};
use gatekeep_db::repositories::SessionRepo;
use gatekeep_db::DbPool;
use uuid::Uuid;

#[async_trait]
pub trait SessionLedger: Send + Sync {
    async fn create(&self, input: CreateSession) -> AuthResult<Session>;

    async fn find_by_id(&self, id: DbId) -> AuthResult<Option<Session>>;

    async fn find_by_token_id(&self, token_id: &str) -> AuthResult<Option<Session>>;

    /// Sessions of a user, newest first.
    async fn list_for_user(&self, user_id: DbId, active_only: bool) -> AuthResult<Vec<Session>>;

    /// Revoke one session. Returns `false` if it was missing, belongs to
    /// another user, or was already revoked.
    async fn revoke(&self, user_id: DbId, token_id: &str) -> AuthResult<bool>;

    /// Revoke every unrevoked session of a user except `except_token_id`.
    async fn revoke_all(&self, user_id: DbId, except_token_id: Option<&str>) -> AuthResult<u64>;
}

/// Postgres SQLSTATE for a statement cancelled by `statement_timeout`.
const QUERY_CANCELED: &str = "57014";

/// Map a database failure to an [`AuthError`], logging the cause.
///
/// Connectivity failures and timed-out statements become
/// [`AuthError::StoreUnavailable`]; anything else is an opaque internal error.
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AuthError {
    move |e| {
        if is_unavailable(&e) {
            tracing::error!(error = %e, context, "Database unavailable");
            return AuthError::StoreUnavailable(format!("{context}: database unavailable"));
        }
        tracing::error!(error = %e, context, "Database operation failed");
        AuthError::Internal(format!("{context} failed"))
    }
}

fn is_unavailable(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => true,
        sqlx::Error::Database(db) => db.code().as_deref() == Some(QUERY_CANCELED),
        _ => false,
    }
}

/// [`SessionLedger`] over the `sessions` table.
#[derive(Clone)]
pub struct PgSessionLedger {
    pool: DbPool,
}

impl PgSessionLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionLedger for PgSessionLedger {
    async fn create(&self, input: CreateSession) -> AuthResult<Session> {
        SessionRepo::create(&self.pool, &input)
            .await
            .map_err(db_error("session insert"))
    }

    async fn find_by_id(&self, id: DbId) -> AuthResult<Option<Session>> {
        SessionRepo::find_by_id(&self.pool, id)
            .await
            .map_err(db_error("session lookup"))
    }

    async fn find_by_token_id(&self, token_id: &str) -> AuthResult<Option<Session>> {
        SessionRepo::find_by_refresh_token_jti(&self.pool, token_id)
            .await
            .map_err(db_error("session lookup"))
    }

    async fn list_for_user(&self, user_id: DbId, active_only: bool) -> AuthResult<Vec<Session>> {
        SessionRepo::list_for_user(&self.pool, user_id, active_only)
            .await
            .map_err(db_error("session listing"))
    }

    async fn revoke(&self, user_id: DbId, token_id: &str) -> AuthResult<bool> {
        SessionRepo::revoke(&self.pool, user_id, token_id)
            .await
            .map_err(db_error("session revoke"))
    }

    async fn revoke_all(&self, user_id: DbId, except_token_id: Option<&str>) -> AuthResult<u64> {
        SessionRepo::revoke_all_for_user(&self.pool, user_id, except_token_id)
            .await
            .map_err(db_error("session revoke-all"))
    }
}

/// In-process [`SessionLedger`] with the same append-only rules.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    rows: Mutex<Vec<Session>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> AuthResult<std::sync::MutexGuard<'_, Vec<Session>>> {
        self.rows
            .lock()
            .map_err(|_| AuthError::Internal("session ledger lock poisoned".into()))
    }
}

#[async_trait]
impl SessionLedger for MemoryLedger {
    async fn create(&self, input: CreateSession) -> AuthResult<Session> {
        let mut rows = self.rows()?;
        if rows.iter().any(|s| s.refresh_token_jti == input.refresh_token_jti) {
            return Err(AuthError::Internal("duplicate refresh token id".into()));
        }
        let now = Utc::now();
        if input.expires_at <= now {
            return Err(AuthError::Internal("session must expire after creation".into()));
        }
        let session = Session {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            refresh_token_jti: input.refresh_token_jti,
            device_info: input.device_info,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
            created_at: now,
            expires_at: input.expires_at,
            revoked_at: None,
        };
        rows.push(session.clone());
        Ok(session)
    }

    async fn find_by_id(&self, id: DbId) -> AuthResult<Option<Session>> {
        Ok(self.rows()?.iter().find(|s| s.id == id).cloned())
    }

    async fn find_by_token_id(&self, token_id: &str) -> AuthResult<Option<Session>> {
        Ok(self
            .rows()?
            .iter()
            .find(|s| s.refresh_token_jti == token_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: DbId, active_only: bool) -> AuthResult<Vec<Session>> {
        let now = Utc::now();
        let mut sessions: Vec<Session> = self
            .rows()?
            .iter()
            .filter(|s| s.user_id == user_id && (!active_only || s.is_active(now)))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn revoke(&self, user_id: DbId, token_id: &str) -> AuthResult<bool> {
        let now = Utc::now();
        let mut rows = self.rows()?;
        let target = rows.iter_mut().find(|s| {
            s.user_id == user_id && s.refresh_token_jti == token_id && s.revoked_at.is_none()
        });
        Ok(match target {
            Some(session) => {
                session.revoked_at = Some(now);
                true
            }
            None => false,
        })
    }

    async fn revoke_all(&self, user_id: DbId, except_token_id: Option<&str>) -> AuthResult<u64> {
        let now = Utc::now();
        let mut count = 0;
        for session in self.rows()?.iter_mut().filter(|s| {
            s.user_id == user_id
                && s.revoked_at.is_none()
                && Some(s.refresh_token_jti.as_str()) != except_token_id
        }) {
            session.revoked_at = Some(now);
            count += 1;
        }
        Ok(count)
    }
}
