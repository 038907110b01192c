#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::Extension;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::Utc;
use gatekeep_auth::accounts::{Account, MemoryAccounts};
use gatekeep_auth::config::{AuthConfig, JwtConfig, RateLimitConfig, RedisConfig};
use gatekeep_auth::jwt::TokenCodec;
use gatekeep_auth::ledger::MemoryLedger;
use gatekeep_auth::mailer::MemoryMailer;
use gatekeep_auth::password::PasswordHasher;
use gatekeep_auth::store::MemoryStore;
use gatekeep_auth::AuthComponents;
use gatekeep_core::roles::DEFAULT_ROLE;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use gatekeep_api::config::ServerConfig;
use gatekeep_api::router::build_app_router;
use gatekeep_api::state::AppState;

pub const PASSWORD: &str = "Secret123";

/// Client address sent in `X-Forwarded-For` by the request helpers.
pub const FORWARDED_IP: &str = "192.0.2.10";

/// Socket peer address seen by the server in every test request.
pub const PEER_IP: [u8; 4] = [198, 51, 100, 7];

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: String::new(),
        database_acquire_timeout_secs: 5,
        database_statement_timeout_secs: 5,
        trust_forwarded_for: true,
        log_json: false,
        auth: AuthConfig {
            jwt: JwtConfig {
                secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
                access_token_expiry_mins: 15,
                refresh_token_expiry_days: 7,
            },
            redis: RedisConfig::default(),
            rate_limit: RateLimitConfig::default(),
        },
    }
}

/// The application wired to in-memory backends, plus handles to inspect them.
pub struct TestApp {
    pub router: Router,
    pub accounts: Arc<MemoryAccounts>,
    pub ledger: Arc<MemoryLedger>,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<MemoryMailer>,
    pub hasher: Arc<PasswordHasher>,
}

impl TestApp {
    /// Insert a verified, active account with [`PASSWORD`].
    pub fn create_account(&self, email: &str, role: &str) -> Account {
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: self.hasher.hash(PASSWORD).expect("hashing should succeed"),
            first_name: "Test".into(),
            last_name: "User".into(),
            phone: None,
            email_verified: true,
            is_active: true,
            role: role.to_string(),
            npo_id: None,
            last_login_at: None,
            created_at: Utc::now(),
        };
        self.accounts
            .insert(account.clone())
            .expect("account insert should succeed");
        account
    }

    pub fn create_donor(&self, email: &str) -> Account {
        self.create_account(email, DEFAULT_ROLE)
    }

    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full application router with all middleware layers.
///
/// Uses the same [`build_app_router`] as production so integration tests
/// exercise the real middleware stack. The app sits behind a trusted proxy.
pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config())
}

/// Like [`build_test_app`], with a caller-supplied configuration.
///
/// Every request appears to come from [`PEER_IP`].
pub fn build_test_app_with(config: ServerConfig) -> TestApp {
    let accounts = Arc::new(MemoryAccounts::new());
    let ledger = Arc::new(MemoryLedger::new());
    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(MemoryMailer::new());
    let hasher = Arc::new(PasswordHasher::with_cost(1024, 1).expect("valid argon2 params"));

    let components = AuthComponents {
        accounts: accounts.clone(),
        ledger: ledger.clone(),
        store: store.clone(),
        mailer: mailer.clone(),
        codec: Arc::new(TokenCodec::new(&config.auth.jwt)),
        hasher: hasher.clone(),
    };
    let state = AppState::new(config.clone(), &components);

    TestApp {
        router: build_app_router(state, &config)
            .layer(Extension(ConnectInfo(SocketAddr::from((PEER_IP, 40_000))))),
        accounts,
        ledger,
        store,
        mailer,
        hasher,
    }
}

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("router is infallible")
}

fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    json_request_from(method, uri, token, body, FORWARDED_IP)
}

fn json_request_from(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
    forwarded_for: &str,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", forwarded_for);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, json_request(Method::GET, uri, None, None)).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, json_request(Method::GET, uri, Some(token), None)).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, json_request(Method::POST, uri, None, Some(body))).await
}

/// POST JSON with a caller-chosen `X-Forwarded-For` header.
pub async fn post_json_from(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    forwarded_for: &str,
) -> Response<Body> {
    send(
        app,
        json_request_from(Method::POST, uri, None, Some(body), forwarded_for),
    )
    .await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, json_request(Method::POST, uri, Some(token), Some(body))).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, json_request(Method::DELETE, uri, Some(token), None)).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
