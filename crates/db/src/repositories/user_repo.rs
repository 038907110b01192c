//! Repository for the `users` table.
//!
//! Reads always join `roles` so callers receive the resolved role name.

use gatekeep_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::{CreateUser, User};

/// Column list (aliased for the `users u JOIN roles r` shape).
const COLUMNS: &str = "u.id, u.email, u.password_hash, u.first_name, u.last_name, u.phone, \
                        u.email_verified, u.is_active, u.role_id, r.name AS role, u.npo_id, \
                        u.last_login_at, u.created_at, u.updated_at";

/// Provides credential and account-state operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    ///
    /// Fails with a unique violation on `uq_users_email` if the email is taken.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "WITH inserted AS (
                INSERT INTO users
                    (email, password_hash, first_name, last_name, phone,
                     email_verified, is_active, role_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7,
                        (SELECT id FROM roles WHERE name = $8))
                RETURNING *
             )
             SELECT {COLUMNS} FROM inserted u JOIN roles r ON r.id = u.role_id"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.phone)
            .bind(input.email_verified)
            .bind(input.is_active)
            .bind(&input.role)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id WHERE u.id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by email. The caller must pass a normalized (lowercase) email.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id WHERE u.email = $1"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Replace the stored password hash. Returns `true` if the row was updated.
    pub async fn update_password_hash(
        pool: &PgPool,
        id: DbId,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set `last_login_at` to now.
    pub async fn record_successful_login(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Mark the email verified and activate the account.
    ///
    /// Returns `true` if the row was updated.
    pub async fn mark_email_verified(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET email_verified = true, is_active = true WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-deactivate a user by setting `is_active = false`.
    ///
    /// Returns `true` if the row was updated.
    pub async fn deactivate(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET is_active = false WHERE id = $1 AND is_active = true")
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
