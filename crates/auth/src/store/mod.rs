//! Ephemeral, TTL-bound state: active sessions, revoked access tokens,
//! one-time tokens and rate-limit counters.
//!
//! [`RedisStore`] is the production backend. [`MemoryStore`] keeps the same
//! semantics in process and backs tests and local development.

pub mod keys;
pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use gatekeep_core::error::AuthError;
use gatekeep_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Value stored under an active-session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub device: Option<String>,
    pub ip: Option<String>,
    pub created_at: Timestamp,
}

/// Kinds of single-use tokens held in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneTimeTokenKind {
    /// Keyed by the SHA-256 digest of the emailed token.
    PasswordReset,
    /// Keyed by the emailed token itself.
    EmailVerification,
}

impl OneTimeTokenKind {
    pub fn key_prefix(self) -> &'static str {
        match self {
            OneTimeTokenKind::PasswordReset => "password_reset",
            OneTimeTokenKind::EmailVerification => "email_verify",
        }
    }

    /// How long an issued token stays redeemable.
    pub fn ttl(self) -> Duration {
        match self {
            OneTimeTokenKind::PasswordReset => Duration::from_secs(60 * 60),
            OneTimeTokenKind::EmailVerification => Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Outcome of counting one attempt against a sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Within the limit; the attempt has been recorded.
    Recorded,
    /// The window is full. The oldest attempt leaves it after `retry_after`.
    Limited { retry_after: Duration },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No connection could be established.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Corrupt value at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt { .. } => AuthError::Internal(err.to_string()),
            other => AuthError::StoreUnavailable(other.to_string()),
        }
    }
}

/// Operations the auth services need from the ephemeral store.
///
/// Every write takes an explicit TTL; no entry lives forever.
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    async fn put_session(
        &self,
        user_id: DbId,
        token_id: &str,
        session: &ActiveSession,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn get_session(
        &self,
        user_id: DbId,
        token_id: &str,
    ) -> Result<Option<ActiveSession>, StoreError>;

    /// Returns `true` if a record was removed.
    async fn delete_session(&self, user_id: DbId, token_id: &str) -> Result<bool, StoreError>;

    /// Remove every active-session record of a user. Returns the count removed.
    async fn delete_all_sessions(&self, user_id: DbId) -> Result<u64, StoreError>;

    /// Mark an access token revoked for `ttl`.
    async fn blacklist(&self, token_id: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn is_blacklisted(&self, token_id: &str) -> Result<bool, StoreError>;

    async fn put_one_time_token(
        &self,
        kind: OneTimeTokenKind,
        key: &str,
        user_id: DbId,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Atomically read and delete a one-time token.
    ///
    /// Of any number of concurrent callers at most one receives `Some`.
    async fn consume_one_time_token(
        &self,
        kind: OneTimeTokenKind,
        key: &str,
    ) -> Result<Option<DbId>, StoreError>;

    /// Atomically prune markers older than `window`, count the rest, and record
    /// a new marker if fewer than `max_attempts` remain.
    ///
    /// A rejected attempt is not recorded.
    async fn record_attempt(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<Attempt, StoreError>;

}

/// Store TTLs are whole seconds; anything shorter rounds up to one.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
