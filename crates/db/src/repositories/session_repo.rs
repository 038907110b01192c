//! Repository for the `sessions` ledger.
//!
//! Every write is a single statement, so the ledger-side mutation for one
//! session (or one bulk revoke) is atomic on its own.

use gatekeep_core::types::DbId;
use sqlx::PgPool;

use crate::models::session::{CreateSession, Session};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, refresh_token_jti, device_info, ip_address, \
                        user_agent, created_at, expires_at, revoked_at";

/// Provides append and revoke operations for the session ledger.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateSession) -> Result<Session, sqlx::Error> {
        let query = format!(
            "INSERT INTO sessions
                (user_id, refresh_token_jti, device_info, ip_address, user_agent, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(input.user_id)
            .bind(&input.refresh_token_jti)
            .bind(&input.device_info)
            .bind(&input.ip_address)
            .bind(&input.user_agent)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Find a session by ledger id.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE id = $1");
        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a session by the `jti` of its refresh token, revoked or not.
    pub async fn find_by_refresh_token_jti(
        pool: &PgPool,
        jti: &str,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE refresh_token_jti = $1");
        sqlx::query_as::<_, Session>(&query)
            .bind(jti)
            .fetch_optional(pool)
            .await
    }

    /// List a user's sessions, newest first.
    ///
    /// With `active_only`, revoked sessions are omitted (expired but
    /// unrevoked rows are still returned; expiry is the ephemeral store's job).
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        active_only: bool,
    ) -> Result<Vec<Session>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sessions
             WHERE user_id = $1
               AND ($2 = false OR revoked_at IS NULL)
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(user_id)
            .bind(active_only)
            .fetch_all(pool)
            .await
    }

    /// Revoke a single session. Returns `true` if the row was updated.
    ///
    /// Already-revoked and unknown sessions are a no-op returning `false`.
    pub async fn revoke(pool: &PgPool, user_id: DbId, jti: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = NOW()
             WHERE user_id = $1 AND refresh_token_jti = $2 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(jti)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke all active sessions for a user, optionally sparing one refresh
    /// token. Returns the count of revoked sessions.
    pub async fn revoke_all_for_user(
        pool: &PgPool,
        user_id: DbId,
        except_jti: Option<&str>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = NOW()
             WHERE user_id = $1
               AND revoked_at IS NULL
               AND ($2::text IS NULL OR refresh_token_jti <> $2)",
        )
        .bind(user_id)
        .bind(except_jti)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
