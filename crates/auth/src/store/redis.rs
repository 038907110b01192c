//! Redis-backed [`EphemeralStore`].
//!
//! The connection is established lazily on first use and shared afterwards.
//! Establishing it is retried with exponential backoff; once every attempt
//! has failed the call reports [`StoreError::Unavailable`] and the next call
//! starts over. Every command runs under the configured operation timeout.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use gatekeep_core::types::DbId;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisResult, Script};
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::{
    keys, ttl_secs, ActiveSession, Attempt, EphemeralStore, OneTimeTokenKind, StoreError,
};
use crate::config::RedisConfig;

/// Keys fetched per `SCAN` round trip.
const SCAN_BATCH: usize = 100;

/// Sliding-window check-and-record, atomic on the server.
///
/// KEYS[1] = counter key, ARGV = max attempts, window (ms), unique member.
/// Returns `{1, 0}` when the attempt was recorded, or `{0, retry_ms}` when the
/// limit is reached, where `retry_ms` is the time until the oldest marker
/// leaves the window.
const RECORD_ATTEMPT_LUA: &str = r"
local now = redis.call('TIME')
local now_ms = tonumber(now[1]) * 1000 + math.floor(tonumber(now[2]) / 1000)
local window_ms = tonumber(ARGV[2])
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', '(' .. (now_ms - window_ms))
if redis.call('ZCARD', KEYS[1]) >= tonumber(ARGV[1]) then
  local retry_ms = window_ms
  local oldest = redis.call('ZRANGE', KEYS[1], 0, 0, 'WITHSCORES')
  if oldest[2] then
    retry_ms = window_ms - (now_ms - tonumber(oldest[2]))
  end
  return {0, math.max(retry_ms, 0)}
end
redis.call('ZADD', KEYS[1], now_ms, ARGV[3])
redis.call('PEXPIRE', KEYS[1], window_ms)
return {1, 0}
";

static RECORD_ATTEMPT: LazyLock<Script> = LazyLock::new(|| Script::new(RECORD_ATTEMPT_LUA));

pub struct RedisStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    config: RedisConfig,
}

impl RedisStore {
    /// Create a store for `config.url`. No connection is made yet.
    pub fn new(config: RedisConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url.as_str())?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            config,
        })
    }

    /// Round-trip a `PING`, establishing the connection if needed.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: String = self.bounded(redis::cmd("PING").query_async(&mut conn)).await?;
        Ok(())
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        self.connection
            .get_or_try_init(|| self.connect_with_retry())
            .await
            .cloned()
    }

    async fn connect_with_retry(&self) -> Result<ConnectionManager, StoreError> {
        let attempts = self.config.connect_attempts.max(1);
        let mut delay = self.config.connect_backoff;

        for attempt in 1..=attempts {
            let outcome = tokio::time::timeout(
                self.config.connect_timeout,
                self.client.get_connection_manager(),
            )
            .await;

            let reason = match outcome {
                Ok(Ok(conn)) => {
                    tracing::info!(attempt, "Connected to Redis");
                    return Ok(conn);
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {:?}", self.config.connect_timeout),
            };

            if attempt == attempts {
                tracing::error!(attempt, error = %reason, "Redis connection failed, giving up");
                return Err(StoreError::Unavailable(format!(
                    "could not connect after {attempts} attempts: {reason}"
                )));
            }

            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %reason,
                "Redis connection failed, retrying",
            );
            tokio::time::sleep(delay).await;
            delay = next_delay(delay);
        }

        Err(StoreError::Unavailable("no connection attempts configured".into()))
    }

    /// Run one command under the operation timeout.
    async fn bounded<T, F>(&self, command: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        let limit = self.config.operation_timeout;
        match tokio::time::timeout(limit, command).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => {
                tracing::warn!(timeout_ms = limit.as_millis() as u64, "Redis operation timed out");
                Err(StoreError::Timeout(limit))
            }
        }
    }
}

/// Double the backoff delay.
fn next_delay(current: Duration) -> Duration {
    current.saturating_mul(2)
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn put_session(
        &self,
        user_id: DbId,
        token_id: &str,
        session: &ActiveSession,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let key = keys::session(user_id, token_id);
        let payload = serde_json::to_string(session).map_err(|e| StoreError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        let mut conn = self.connection().await?;
        let _: () = self.bounded(conn.set_ex(&key, payload, ttl_secs(ttl))).await?;
        Ok(())
    }

    async fn get_session(
        &self,
        user_id: DbId,
        token_id: &str,
    ) -> Result<Option<ActiveSession>, StoreError> {
        let key = keys::session(user_id, token_id);
        let mut conn = self.connection().await?;
        let raw: Option<String> = self.bounded(conn.get(&key)).await?;
        raw.map(|value| {
            serde_json::from_str(&value).map_err(|e| StoreError::Corrupt {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
    }

    async fn delete_session(&self, user_id: DbId, token_id: &str) -> Result<bool, StoreError> {
        let key = keys::session(user_id, token_id);
        let mut conn = self.connection().await?;
        let removed: u64 = self.bounded(conn.del(&key)).await?;
        Ok(removed > 0)
    }

    async fn delete_all_sessions(&self, user_id: DbId) -> Result<u64, StoreError> {
        let pattern = keys::session_pattern(user_id);
        let mut conn = self.connection().await?;

        let mut matched: Vec<String> = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = self
                .bounded(
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn),
                )
                .await?;
            matched.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        if matched.is_empty() {
            return Ok(0);
        }
        // SCAN may return a key more than once.
        matched.sort_unstable();
        matched.dedup();

        let mut removed = 0;
        for chunk in matched.chunks(SCAN_BATCH) {
            let n: u64 = self.bounded(conn.del(chunk)).await?;
            removed += n;
        }
        Ok(removed)
    }

    async fn blacklist(&self, token_id: &str, ttl: Duration) -> Result<(), StoreError> {
        let key = keys::blacklist(token_id);
        let mut conn = self.connection().await?;
        let _: () = self.bounded(conn.set_ex(&key, "1", ttl_secs(ttl))).await?;
        Ok(())
    }

    async fn is_blacklisted(&self, token_id: &str) -> Result<bool, StoreError> {
        let key = keys::blacklist(token_id);
        let mut conn = self.connection().await?;
        let exists: bool = self.bounded(conn.exists(&key)).await?;
        Ok(exists)
    }

    async fn put_one_time_token(
        &self,
        kind: OneTimeTokenKind,
        key: &str,
        user_id: DbId,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let key = keys::one_time(kind, key);
        let mut conn = self.connection().await?;
        let _: () = self
            .bounded(conn.set_ex(&key, user_id.to_string(), ttl_secs(ttl)))
            .await?;
        Ok(())
    }

    async fn consume_one_time_token(
        &self,
        kind: OneTimeTokenKind,
        key: &str,
    ) -> Result<Option<DbId>, StoreError> {
        let key = keys::one_time(kind, key);
        let mut conn = self.connection().await?;
        let raw: Option<String> = self.bounded(conn.get_del(&key)).await?;
        raw.map(|value| {
            Uuid::parse_str(&value).map_err(|e| StoreError::Corrupt {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
    }

    async fn record_attempt(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<Attempt, StoreError> {
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX).max(1);
        let member = Uuid::new_v4().to_string();
        let mut conn = self.connection().await?;
        let (recorded, retry_ms): (i64, i64) = self
            .bounded(
                RECORD_ATTEMPT
                    .key(key)
                    .arg(max_attempts)
                    .arg(window_ms)
                    .arg(member)
                    .invoke_async(&mut conn),
            )
            .await?;
        if recorded == 1 {
            return Ok(Attempt::Recorded);
        }
        Ok(Attempt::Limited {
            retry_after: Duration::from_millis(u64::try_from(retry_ms).unwrap_or(0)),
        })
    }
}
