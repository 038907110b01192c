//! Role-based access control (RBAC) extractors.
//!
//! Each extractor wraps [`AuthUser`] and rejects requests whose principal does
//! not meet the requirement.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use gatekeep_core::roles::ROLE_SUPER_ADMIN;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires the `super_admin` role. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn admin_only(RequireSuperAdmin(user): RequireSuperAdmin) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireSuperAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.0.require_role(&[ROLE_SUPER_ADMIN])?;
        Ok(RequireSuperAdmin(user))
    }
}

/// Requires a verified email address. Rejects with 403 Forbidden otherwise.
pub struct RequireVerified(pub AuthUser);

impl FromRequestParts<AppState> for RequireVerified {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.0.require_verified()?;
        Ok(RequireVerified(user))
    }
}
