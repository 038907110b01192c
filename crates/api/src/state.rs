use std::sync::Arc;

use gatekeep_auth::store::RedisStore;
use gatekeep_auth::{
    AuthComponents, AuthService, PasswordService, RateLimitPolicy, RateLimiter, RequestGuard,
};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub auth: AuthService,
    pub passwords: PasswordService,
    pub guard: RequestGuard,
    pub rate_limiter: RateLimiter,
    /// Policy applied to `POST /auth/login`, keyed by client IP.
    pub login_policy: RateLimitPolicy,
    /// Database pool, when running against PostgreSQL. Used by `/health`.
    pub pool: Option<gatekeep_db::DbPool>,
    /// Redis store, when running against Redis. Used by `/health`.
    pub redis: Option<Arc<RedisStore>>,
}

impl AppState {
    /// Build every service from one set of components.
    pub fn new(config: ServerConfig, components: &AuthComponents) -> Self {
        let login_policy = config.auth.rate_limit.login_policy();
        Self {
            config: Arc::new(config),
            auth: AuthService::new(components),
            passwords: PasswordService::new(components),
            guard: RequestGuard::new(components),
            rate_limiter: RateLimiter::new(components.store.clone()),
            login_policy,
            pool: None,
            redis: None,
        }
    }

    pub fn with_pool(mut self, pool: gatekeep_db::DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_redis(mut self, redis: Arc<RedisStore>) -> Self {
        self.redis = Some(redis);
        self
    }
}
