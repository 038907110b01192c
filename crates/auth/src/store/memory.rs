//! In-process [`EphemeralStore`] with real TTL semantics.
//!
//! Expiry is measured on the Tokio clock, so tests running with a paused
//! runtime can move time forward with `tokio::time::advance`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use gatekeep_core::types::DbId;
use tokio::time::Instant;

use super::{keys, ActiveSession, Attempt, EphemeralStore, OneTimeTokenKind, StoreError};

#[derive(Debug, Clone)]
enum Value {
    Session(ActiveSession),
    Flag,
    Owner(DbId),
    Attempts(Vec<Instant>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Timeout reported while [`MemoryStore::set_timing_out`] is on.
const SIMULATED_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
    timing_out: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with [`StoreError::Unavailable`]
    /// until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every subsequent operation fail with [`StoreError::Timeout`]
    /// until switched back.
    pub fn set_timing_out(&self, timing_out: bool) {
        self.timing_out.store(timing_out, Ordering::SeqCst);
    }

    /// Number of live (unexpired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|e| e.expires_at > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        if self.timing_out.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout(SIMULATED_TIMEOUT));
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(entries)
    }

    fn put(&self, key: String, value: Value, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = Instant::now() + ttl.max(Duration::from_secs(1));
        self.entries()?.insert(key, Entry { value, expires_at });
        Ok(())
    }
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn put_session(
        &self,
        user_id: DbId,
        token_id: &str,
        session: &ActiveSession,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.put(
            keys::session(user_id, token_id),
            Value::Session(session.clone()),
            ttl,
        )
    }

    async fn get_session(
        &self,
        user_id: DbId,
        token_id: &str,
    ) -> Result<Option<ActiveSession>, StoreError> {
        let key = keys::session(user_id, token_id);
        match self.entries()?.get(&key).map(|e| e.value.clone()) {
            Some(Value::Session(session)) => Ok(Some(session)),
            Some(_) => Err(StoreError::Corrupt {
                key,
                reason: "not a session record".into(),
            }),
            None => Ok(None),
        }
    }

    async fn delete_session(&self, user_id: DbId, token_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .entries()?
            .remove(&keys::session(user_id, token_id))
            .is_some())
    }

    async fn delete_all_sessions(&self, user_id: DbId) -> Result<u64, StoreError> {
        let prefix = keys::session(user_id, "");
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn blacklist(&self, token_id: &str, ttl: Duration) -> Result<(), StoreError> {
        self.put(keys::blacklist(token_id), Value::Flag, ttl)
    }

    async fn is_blacklisted(&self, token_id: &str) -> Result<bool, StoreError> {
        Ok(self.entries()?.contains_key(&keys::blacklist(token_id)))
    }

    async fn put_one_time_token(
        &self,
        kind: OneTimeTokenKind,
        key: &str,
        user_id: DbId,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.put(keys::one_time(kind, key), Value::Owner(user_id), ttl)
    }

    async fn consume_one_time_token(
        &self,
        kind: OneTimeTokenKind,
        key: &str,
    ) -> Result<Option<DbId>, StoreError> {
        let key = keys::one_time(kind, key);
        match self.entries()?.remove(&key).map(|e| e.value) {
            Some(Value::Owner(user_id)) => Ok(Some(user_id)),
            Some(_) => Err(StoreError::Corrupt {
                key,
                reason: "not a one-time token".into(),
            }),
            None => Ok(None),
        }
    }

    async fn record_attempt(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<Attempt, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries()?;

        let mut attempts = match entries.remove(key).map(|e| e.value) {
            Some(Value::Attempts(attempts)) => attempts,
            Some(_) => {
                return Err(StoreError::Corrupt {
                    key: key.to_string(),
                    reason: "not an attempt counter".into(),
                })
            }
            None => Vec::new(),
        };
        attempts.retain(|at| now.saturating_duration_since(*at) <= window);

        let outcome = if attempts.len() < max_attempts as usize {
            attempts.push(now);
            Attempt::Recorded
        } else {
            let oldest = attempts.iter().min().copied().unwrap_or(now);
            Attempt::Limited {
                retry_after: window.saturating_sub(now.saturating_duration_since(oldest)),
            }
        };
        if !attempts.is_empty() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Attempts(attempts),
                    expires_at: now + window,
                },
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use uuid::Uuid;

    fn session() -> ActiveSession {
        ActiveSession {
            device: Some("laptop".into()),
            ip: Some("10.0.0.1".into()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_expire_after_ttl() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store
            .put_session(user, "j1", &session(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(store.get_session(user, "j1").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.get_session(user, "j1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_all_only_touches_one_user() {
        let store = MemoryStore::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let ttl = Duration::from_secs(60);
        store.put_session(alice, "a1", &session(), ttl).await.unwrap();
        store.put_session(alice, "a2", &session(), ttl).await.unwrap();
        store.put_session(bob, "b1", &session(), ttl).await.unwrap();

        assert_eq!(store.delete_all_sessions(alice).await.unwrap(), 2);
        assert!(store.get_session(alice, "a1").await.unwrap().is_none());
        assert!(store.get_session(bob, "b1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn one_time_tokens_are_single_use() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let kind = OneTimeTokenKind::PasswordReset;
        store
            .put_one_time_token(kind, "digest", user, kind.ttl())
            .await
            .unwrap();

        assert_eq!(store.consume_one_time_token(kind, "digest").await.unwrap(), Some(user));
        assert_eq!(store.consume_one_time_token(kind, "digest").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_slide_out_of_the_window() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(10);
        for _ in 0..3 {
            assert_eq!(store.record_attempt("k", 3, window).await.unwrap(), Attempt::Recorded);
        }
        assert_matches!(
            store.record_attempt("k", 3, window).await.unwrap(),
            Attempt::Limited { .. }
        );

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.record_attempt("k", 3, window).await.unwrap(), Attempt::Recorded);
    }

    #[tokio::test(start_paused = true)]
    async fn limited_attempt_reports_time_until_oldest_expires() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);
        store.record_attempt("k", 2, window).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;
        store.record_attempt("k", 2, window).await.unwrap();
        tokio::time::advance(Duration::from_secs(15)).await;

        assert_eq!(
            store.record_attempt("k", 2, window).await.unwrap(),
            Attempt::Limited {
                retry_after: Duration::from_secs(25)
            }
        );
    }

    #[tokio::test]
    async fn switched_off_store_is_unavailable() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert_matches!(
            store.is_blacklisted("jti").await,
            Err(StoreError::Unavailable(_))
        );
        store.set_unavailable(false);
        assert!(!store.is_blacklisted("jti").await.unwrap());
    }

    #[tokio::test]
    async fn timing_out_store_never_reads_as_missing() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store
            .put_session(user, "j1", &session(), Duration::from_secs(60))
            .await
            .unwrap();

        store.set_timing_out(true);
        assert_matches!(store.get_session(user, "j1").await, Err(StoreError::Timeout(_)));
        store.set_timing_out(false);
        assert!(store.get_session(user, "j1").await.unwrap().is_some());
    }
}
