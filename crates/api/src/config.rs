use gatekeep_auth::config::AuthConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development except
/// `DATABASE_URL` and `JWT_SECRET`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Seconds to wait for a pooled database connection (default: `5`).
    pub database_acquire_timeout_secs: u64,
    /// Server-side limit on any single SQL statement, in seconds (default: `5`).
    pub database_statement_timeout_secs: u64,
    /// Take the client IP from `X-Forwarded-For` (default: `false`).
    ///
    /// Enable only behind a reverse proxy that overwrites the header; otherwise
    /// clients choose their own rate-limit key.
    pub trust_forwarded_for: bool,
    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
    /// Token, ephemeral store and rate-limit settings.
    pub auth: AuthConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `HOST`                          | `0.0.0.0`               |
    /// | `PORT`                          | `3000`                  |
    /// | `CORS_ORIGINS`                  | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`          | `30`                    |
    /// | `DATABASE_URL`                  | **required**            |
    /// | `DATABASE_ACQUIRE_TIMEOUT_SECS` | `5`                     |
    /// | `DATABASE_STATEMENT_TIMEOUT_SECS` | `5`                   |
    /// | `TRUST_FORWARDED_FOR`           | `false`                 |
    /// | `LOG_FORMAT`                    | `text` (`json` to switch) |
    ///
    /// Auth settings are read by [`AuthConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let database_acquire_timeout_secs: u64 = std::env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("DATABASE_ACQUIRE_TIMEOUT_SECS must be a valid u64");

        let database_statement_timeout_secs: u64 =
            std::env::var("DATABASE_STATEMENT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".into())
                .parse()
                .expect("DATABASE_STATEMENT_TIMEOUT_SECS must be a valid u64");

        let trust_forwarded_for = std::env::var("TRUST_FORWARDED_FOR")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let log_json = std::env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url,
            database_acquire_timeout_secs,
            database_statement_timeout_secs,
            trust_forwarded_for,
            log_json,
            auth: AuthConfig::from_env(),
        }
    }
}
