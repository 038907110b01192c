//! Environment-driven configuration for token signing, the ephemeral store,
//! and login throttling.

use std::time::Duration;

use crate::rate_limit::RateLimitPolicy;

/// Minimum accepted length of `JWT_SECRET`.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
/// Default refresh token expiry in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;

/// Configuration for JWT token generation and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Access token lifetime in minutes (default: 15).
    pub access_token_expiry_mins: i64,
    /// Refresh token lifetime in days (default: 7).
    pub refresh_token_expiry_days: i64,
}

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                    | Required | Default |
    /// |----------------------------|----------|---------|
    /// | `JWT_SECRET`               | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS`   | no       | `15`    |
    /// | `JWT_REFRESH_EXPIRY_DAYS`  | no       | `7`     |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or shorter than [`MIN_SECRET_LENGTH`].
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(
            secret.len() >= MIN_SECRET_LENGTH,
            "JWT_SECRET must be at least {MIN_SECRET_LENGTH} characters"
        );

        Self {
            secret,
            access_token_expiry_mins: env_or("JWT_ACCESS_EXPIRY_MINS", DEFAULT_ACCESS_EXPIRY_MINS),
            refresh_token_expiry_days: env_or(
                "JWT_REFRESH_EXPIRY_DAYS",
                DEFAULT_REFRESH_EXPIRY_DAYS,
            ),
        }
    }

    /// Access token lifetime.
    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_expiry_mins)
    }

    /// Refresh token (and session) lifetime.
    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_expiry_days)
    }
}

/// Connection and timeout settings for the Redis-backed ephemeral store.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// Connection attempts before the store is reported unavailable.
    pub connect_attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt.
    pub connect_backoff: Duration,
    /// Upper bound on a single connection attempt.
    pub connect_timeout: Duration,
    /// Upper bound on any single store operation.
    pub operation_timeout: Duration,
}

impl RedisConfig {
    /// Load Redis configuration from environment variables.
    ///
    /// | Env Var                      | Default                    |
    /// |------------------------------|----------------------------|
    /// | `REDIS_URL`                  | `redis://127.0.0.1:6379/0` |
    /// | `REDIS_CONNECT_ATTEMPTS`     | `3`                        |
    /// | `REDIS_CONNECT_BACKOFF_MS`   | `200`                      |
    /// | `REDIS_CONNECT_TIMEOUT_MS`   | `2000`                     |
    /// | `REDIS_OPERATION_TIMEOUT_MS` | `1000`                     |
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".into()),
            connect_attempts: env_or("REDIS_CONNECT_ATTEMPTS", 3),
            connect_backoff: Duration::from_millis(env_or("REDIS_CONNECT_BACKOFF_MS", 200)),
            connect_timeout: Duration::from_millis(env_or("REDIS_CONNECT_TIMEOUT_MS", 2000)),
            operation_timeout: Duration::from_millis(env_or("REDIS_OPERATION_TIMEOUT_MS", 1000)),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".into(),
            connect_attempts: 3,
            connect_backoff: Duration::from_millis(200),
            connect_timeout: Duration::from_secs(2),
            operation_timeout: Duration::from_secs(1),
        }
    }
}

/// Login throttling settings.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_secs: u64,
}

impl RateLimitConfig {
    /// Load rate-limit configuration from environment variables.
    ///
    /// | Env Var                        | Default |
    /// |--------------------------------|---------|
    /// | `RATE_LIMIT_LOGIN_ATTEMPTS`    | `5`     |
    /// | `RATE_LIMIT_LOGIN_WINDOW_SECS` | `900`   |
    pub fn from_env() -> Self {
        let defaults = RateLimitPolicy::LOGIN;
        Self {
            login_attempts: env_or("RATE_LIMIT_LOGIN_ATTEMPTS", defaults.max_attempts),
            login_window_secs: env_or("RATE_LIMIT_LOGIN_WINDOW_SECS", defaults.window.as_secs()),
        }
    }

    /// The login policy these settings describe.
    pub fn login_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            action: RateLimitPolicy::LOGIN.action,
            max_attempts: self.login_attempts,
            window: Duration::from_secs(self.login_window_secs),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_attempts: RateLimitPolicy::LOGIN.max_attempts,
            login_window_secs: RateLimitPolicy::LOGIN.window.as_secs(),
        }
    }
}

/// Everything the auth services need from the environment.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt: JwtConfig,
    pub redis: RedisConfig,
    pub rate_limit: RateLimitConfig,
}

impl AuthConfig {
    /// Load all auth settings from the environment.
    ///
    /// # Panics
    ///
    /// Panics if a required variable is missing or a numeric one fails to parse.
    pub fn from_env() -> Self {
        Self {
            jwt: JwtConfig::from_env(),
            redis: RedisConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
        }
    }
}

/// Read `key` and parse it, falling back to `default` when unset.
///
/// # Panics
///
/// Panics if the variable is set but does not parse.
fn env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid {}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
