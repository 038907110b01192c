//! Session lifecycle across the durable ledger and the ephemeral store.
//!
//! The ledger is the system of record; the ephemeral store holds the
//! TTL-bound "is this refresh token still usable" marker. A session is
//! usable only while both agree.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use gatekeep_core::error::{AuthError, AuthResult};
use gatekeep_core::types::DbId;
use gatekeep_db::models::session::{CreateSession, Session};

use crate::audit::{self, AuditEvent};
use crate::jwt::Claims;
use crate::ledger::SessionLedger;
use crate::store::{ActiveSession, EphemeralStore};

/// Stored in the ledger when the client address is unknown.
const UNKNOWN_IP: &str = "unknown";

/// Client details recorded with a new session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub device: Option<String>,
}

#[derive(Clone)]
pub struct SessionManager {
    ledger: Arc<dyn SessionLedger>,
    store: Arc<dyn EphemeralStore>,
}

impl SessionManager {
    pub fn new(ledger: Arc<dyn SessionLedger>, store: Arc<dyn EphemeralStore>) -> Self {
        Self { ledger, store }
    }

    /// Record a session for a freshly issued refresh token in both stores.
    ///
    /// If the ephemeral write fails, the ledger row is revoked before the
    /// error is returned so no half-created session stays usable.
    pub async fn open(
        &self,
        user_id: DbId,
        refresh: &Claims,
        meta: &ClientMeta,
    ) -> AuthResult<Session> {
        let expires_at = Utc
            .timestamp_opt(refresh.exp, 0)
            .single()
            .ok_or_else(|| AuthError::Internal("refresh token expiry out of range".into()))?;

        let session = self
            .ledger
            .create(CreateSession {
                user_id,
                refresh_token_jti: refresh.jti.clone(),
                device_info: meta.device.clone(),
                ip_address: meta.ip.clone().unwrap_or_else(|| UNKNOWN_IP.to_string()),
                user_agent: meta.user_agent.clone(),
                expires_at,
            })
            .await?;

        let record = ActiveSession {
            device: meta.device.clone(),
            ip: meta.ip.clone(),
            created_at: session.created_at,
        };
        let ttl = Duration::from_secs(refresh.remaining_secs(Utc::now().timestamp()));

        if let Err(e) = self
            .store
            .put_session(user_id, &refresh.jti, &record, ttl)
            .await
        {
            tracing::error!(
                error = %e,
                %user_id,
                token_id = %refresh.jti,
                "Ephemeral session write failed, revoking ledger row",
            );
            if let Err(revoke_err) = self.ledger.revoke(user_id, &refresh.jti).await {
                tracing::error!(
                    error = %revoke_err,
                    %user_id,
                    token_id = %refresh.jti,
                    alert = true,
                    "Failed to revoke orphaned ledger session",
                );
            }
            return Err(e.into());
        }

        Ok(session)
    }

    /// Whether the ephemeral store still holds the session marker.
    pub async fn is_active(&self, user_id: DbId, token_id: &str) -> AuthResult<bool> {
        Ok(self.store.get_session(user_id, token_id).await?.is_some())
    }

    /// Revoke one session in both stores. Idempotent.
    ///
    /// Returns `true` if the ledger row transitioned to revoked.
    pub async fn close(&self, user_id: DbId, token_id: &str, reason: &str) -> AuthResult<bool> {
        let revoked = self.ledger.revoke(user_id, token_id).await?;
        self.store.delete_session(user_id, token_id).await?;
        if revoked {
            audit::record(&AuditEvent::SessionRevoked {
                user_id,
                token_id,
                reason,
            });
        }
        Ok(revoked)
    }

    /// Revoke every session of a user, optionally sparing one.
    ///
    /// The ephemeral wipe is total; the spared session's marker is written
    /// back afterwards with its remaining lifetime. A failed wipe is an error:
    /// ledger-revoked sessions whose markers survive would stay usable.
    pub async fn close_all(
        &self,
        user_id: DbId,
        except_token_id: Option<&str>,
        reason: &str,
    ) -> AuthResult<u64> {
        let count = self.ledger.revoke_all(user_id, except_token_id).await?;

        if let Err(e) = self.store.delete_all_sessions(user_id).await {
            tracing::error!(
                error = %e,
                %user_id,
                revoked = count,
                alert = true,
                "Ledger sessions revoked but ephemeral wipe failed",
            );
            return Err(e.into());
        }

        if let Some(token_id) = except_token_id {
            self.restore(user_id, token_id).await?;
        }

        audit::record(&AuditEvent::SessionsRevoked {
            user_id,
            count,
            reason,
        });
        Ok(count)
    }

    /// Sessions of a user from the ledger, newest first.
    pub async fn list(&self, user_id: DbId, active_only: bool) -> AuthResult<Vec<Session>> {
        self.ledger.list_for_user(user_id, active_only).await
    }

    pub async fn find(&self, session_id: DbId) -> AuthResult<Option<Session>> {
        self.ledger.find_by_id(session_id).await
    }

    pub async fn find_by_token_id(&self, token_id: &str) -> AuthResult<Option<Session>> {
        self.ledger.find_by_token_id(token_id).await
    }

    /// Re-insert the marker of a still-active ledger session.
    async fn restore(&self, user_id: DbId, token_id: &str) -> AuthResult<()> {
        let now = Utc::now();
        let Some(session) = self.ledger.find_by_token_id(token_id).await? else {
            return Ok(());
        };
        if session.user_id != user_id || !session.is_active(now) {
            return Ok(());
        }

        let remaining = (session.expires_at - now).num_seconds().max(1) as u64;
        let record = ActiveSession {
            device: session.device_info.clone(),
            ip: Some(session.ip_address.clone()),
            created_at: session.created_at,
        };
        self.store
            .put_session(user_id, token_id, &record, Duration::from_secs(remaining))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    %user_id,
                    token_id,
                    alert = true,
                    "Failed to restore spared session marker",
                );
                AuthError::from(e)
            })
    }
}
