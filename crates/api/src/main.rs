use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gatekeep_auth::accounts::PgAccountStore;
use gatekeep_auth::jwt::TokenCodec;
use gatekeep_auth::ledger::PgSessionLedger;
use gatekeep_auth::mailer::LogMailer;
use gatekeep_auth::password::PasswordHasher;
use gatekeep_auth::store::RedisStore;
use gatekeep_auth::AuthComponents;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatekeep_api::config::ServerConfig;
use gatekeep_api::router::build_app_router;
use gatekeep_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gatekeep_api=debug,gatekeep_auth=info,audit=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = gatekeep_db::create_pool(
        &config.database_url,
        Duration::from_secs(config.database_acquire_timeout_secs),
        Duration::from_secs(config.database_statement_timeout_secs),
    )
    .await
    .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    gatekeep_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    gatekeep_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Session store (connects lazily on first use) ---
    let redis = Arc::new(
        RedisStore::new(config.auth.redis.clone()).expect("REDIS_URL must be a valid Redis URL"),
    );
    if let Err(e) = redis.ping().await {
        tracing::warn!(error = %e, "Session store not reachable at startup");
    }

    // --- Auth components ---
    let components = AuthComponents {
        accounts: Arc::new(PgAccountStore::new(pool.clone())),
        ledger: Arc::new(PgSessionLedger::new(pool.clone())),
        store: redis.clone(),
        mailer: Arc::new(LogMailer),
        codec: Arc::new(TokenCodec::new(&config.auth.jwt)),
        hasher: Arc::new(PasswordHasher::new()),
    };

    // --- App state ---
    let state = AppState::new(config.clone(), &components)
        .with_pool(pool)
        .with_redis(redis);

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
