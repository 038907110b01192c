//! User entity model and DTOs.

use gatekeep_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// Full user row joined with its role name.
///
/// Contains the password hash -- NEVER serialize this to API responses directly.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email_verified: bool,
    pub is_active: bool,
    pub role_id: DbId,
    /// Resolved from `roles.name`.
    pub role: String,
    pub npo_id: Option<DbId>,
    pub last_login_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new user. `email` must already be normalized.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    /// Role name; resolved to `role_id` inside the insert.
    pub role: String,
    pub email_verified: bool,
    pub is_active: bool,
}
