//! Sliding-window attempt limiting keyed by action and caller identity.

use std::sync::Arc;
use std::time::Duration;

use gatekeep_core::error::{AuthError, AuthResult};

use crate::store::{keys, Attempt, EphemeralStore};

/// How many attempts of an action are allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub action: &'static str,
    pub max_attempts: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    /// Login attempts per client IP.
    pub const LOGIN: Self = Self {
        action: "login",
        max_attempts: 5,
        window: Duration::from_secs(15 * 60),
    };

    /// Password-reset requests per client IP.
    pub const PASSWORD_RESET: Self = Self {
        action: "password_reset",
        max_attempts: 3,
        window: Duration::from_secs(60 * 60),
    };
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn EphemeralStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn EphemeralStore>) -> Self {
        Self { store }
    }

    /// Count an attempt against `identifier`.
    ///
    /// Fails with [`AuthError::RateLimitExceeded`] once the window already
    /// holds `max_attempts` attempts; rejected attempts are not recorded.
    /// `retry_after_seconds` is the time until the oldest attempt leaves the
    /// window, rounded up.
    pub async fn check(&self, policy: &RateLimitPolicy, identifier: &str) -> AuthResult<()> {
        let key = keys::rate_limit(policy.action, identifier);
        let retry_after = match self
            .store
            .record_attempt(&key, policy.max_attempts, policy.window)
            .await?
        {
            Attempt::Recorded => return Ok(()),
            Attempt::Limited { retry_after } => retry_after,
        };

        let retry_after_seconds = whole_seconds(retry_after);
        tracing::warn!(
            action = policy.action,
            identifier,
            max_attempts = policy.max_attempts,
            retry_after_seconds,
            "Rate limit exceeded",
        );
        Err(AuthError::RateLimitExceeded {
            retry_after_seconds,
        })
    }
}

/// Round up to whole seconds, never below one.
fn whole_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    use crate::store::MemoryStore;

    fn limiter() -> (RateLimiter, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (RateLimiter::new(store.clone()), store)
    }

    #[tokio::test]
    async fn sixth_login_attempt_is_rejected() {
        let (limiter, _) = limiter();
        let policy = RateLimitPolicy::LOGIN;
        for _ in 0..5 {
            limiter.check(&policy, "203.0.113.7").await.unwrap();
        }
        assert_matches!(
            limiter.check(&policy, "203.0.113.7").await,
            Err(AuthError::RateLimitExceeded {
                retry_after_seconds: 900
            })
        );
    }

    #[tokio::test]
    async fn identifiers_and_actions_are_independent() {
        let (limiter, _) = limiter();
        let policy = RateLimitPolicy::PASSWORD_RESET;
        for _ in 0..3 {
            limiter.check(&policy, "a").await.unwrap();
        }
        assert!(limiter.check(&policy, "a").await.is_err());
        assert!(limiter.check(&policy, "b").await.is_ok());
        assert!(limiter.check(&RateLimitPolicy::LOGIN, "a").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn window_elapses() {
        let (limiter, _) = limiter();
        let policy = RateLimitPolicy {
            action: "test",
            max_attempts: 1,
            window: Duration::from_secs(30),
        };
        limiter.check(&policy, "x").await.unwrap();
        assert!(limiter.check(&policy, "x").await.is_err());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(limiter.check(&policy, "x").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_counts_down_with_the_window() {
        let (limiter, _) = limiter();
        let policy = RateLimitPolicy::LOGIN;
        for _ in 0..5 {
            limiter.check(&policy, "203.0.113.7").await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(890)).await;

        assert_matches!(
            limiter.check(&policy, "203.0.113.7").await,
            Err(AuthError::RateLimitExceeded {
                retry_after_seconds: 10
            })
        );
    }

    #[test]
    fn partial_seconds_round_up() {
        assert_eq!(whole_seconds(Duration::from_millis(9_001)), 10);
        assert_eq!(whole_seconds(Duration::from_secs(10)), 10);
        assert_eq!(whole_seconds(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn store_outage_surfaces() {
        let (limiter, store) = limiter();
        store.set_unavailable(true);
        assert_matches!(
            limiter.check(&RateLimitPolicy::LOGIN, "a").await,
            Err(AuthError::StoreUnavailable(_))
        );
    }
}
