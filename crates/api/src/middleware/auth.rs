//! Bearer-token authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use gatekeep_auth::{extract_bearer, Principal};

use crate::error::AppError;
use crate::state::AppState;

/// Authenticated caller extracted from the `Authorization` header.
///
/// Use this as an extractor parameter in any handler that requires
/// authentication:
///
/// ```ignore
/// async fn my_handler(AuthUser(principal): AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %principal.user_id(), role = principal.role(), "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let token = extract_bearer(header)?;
        let principal = state.guard.authenticate(token).await?;
        Ok(AuthUser(principal))
    }
}
