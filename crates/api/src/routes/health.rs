use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable (`null` when not configured).
    pub db_healthy: Option<bool>,
    /// Whether the session store is reachable (`null` when not configured).
    pub store_healthy: Option<bool>,
}

/// GET /health -- returns service, database and session store health.
///
/// Answers 503 when a configured backend is unreachable.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_healthy = match &state.pool {
        Some(pool) => Some(gatekeep_db::health_check(pool).await.is_ok()),
        None => None,
    };
    let store_healthy = match &state.redis {
        Some(redis) => Some(redis.ping().await.is_ok()),
        None => None,
    };

    let healthy = db_healthy.unwrap_or(true) && store_healthy.unwrap_or(true);
    let (status_code, status) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            db_healthy,
            store_healthy,
        }),
    )
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
