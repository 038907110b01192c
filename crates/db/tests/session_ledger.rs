//! Integration tests for the `sessions` ledger repository.

use chrono::{Duration, Utc};
use gatekeep_db::models::session::CreateSession;
use gatekeep_db::models::user::{CreateUser, User};
use gatekeep_db::repositories::{SessionRepo, UserRepo};
use sqlx::PgPool;

async fn create_user(pool: &PgPool, email: &str) -> User {
    let input = CreateUser {
        email: email.to_string(),
        password_hash: "$argon2id$placeholder".to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        phone: None,
        role: "donor".to_string(),
        email_verified: true,
        is_active: true,
    };
    UserRepo::create(pool, &input).await.unwrap()
}

fn new_session(user: &User, jti: &str) -> CreateSession {
    CreateSession {
        user_id: user.id,
        refresh_token_jti: jti.to_string(),
        device_info: Some("test-agent".to_string()),
        ip_address: "127.0.0.1".to_string(),
        user_agent: Some("test-agent".to_string()),
        expires_at: Utc::now() + Duration::days(7),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_and_find(pool: PgPool) {
    let user = create_user(&pool, "ledger@test.com").await;
    let created = SessionRepo::create(&pool, &new_session(&user, "jti-1"))
        .await
        .unwrap();

    assert_eq!(created.user_id, user.id);
    assert!(created.revoked_at.is_none());
    assert!(created.expires_at > created.created_at);

    let found = SessionRepo::find_by_refresh_token_jti(&pool, "jti-1")
        .await
        .unwrap()
        .expect("session should exist");
    assert_eq!(found.id, created.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_jti_rejected(pool: PgPool) {
    let user = create_user(&pool, "dup@test.com").await;
    SessionRepo::create(&pool, &new_session(&user, "same-jti"))
        .await
        .unwrap();

    let result = SessionRepo::create(&pool, &new_session(&user, "same-jti")).await;
    assert!(result.is_err(), "refresh_token_jti must be unique");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_expiry_must_follow_creation(pool: PgPool) {
    let user = create_user(&pool, "expiry@test.com").await;
    let mut input = new_session(&user, "jti-past");
    input.expires_at = Utc::now() - Duration::hours(1);

    let result = SessionRepo::create(&pool, &input).await;
    assert!(result.is_err(), "expires_at must be after created_at");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_revoke_is_idempotent(pool: PgPool) {
    let user = create_user(&pool, "revoke@test.com").await;
    SessionRepo::create(&pool, &new_session(&user, "jti-r"))
        .await
        .unwrap();

    assert!(SessionRepo::revoke(&pool, user.id, "jti-r").await.unwrap());
    let first = SessionRepo::find_by_refresh_token_jti(&pool, "jti-r")
        .await
        .unwrap()
        .unwrap();
    let revoked_at = first.revoked_at.expect("revoked_at must be set");

    // Second revoke is a no-op and must not move the timestamp.
    assert!(!SessionRepo::revoke(&pool, user.id, "jti-r").await.unwrap());
    let second = SessionRepo::find_by_refresh_token_jti(&pool, "jti-r")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.revoked_at, Some(revoked_at));

    // Unknown sessions are a no-op too.
    assert!(!SessionRepo::revoke(&pool, user.id, "nope").await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_revoke_requires_owner(pool: PgPool) {
    let owner = create_user(&pool, "owner@test.com").await;
    let other = create_user(&pool, "other@test.com").await;
    SessionRepo::create(&pool, &new_session(&owner, "jti-owned"))
        .await
        .unwrap();

    assert!(!SessionRepo::revoke(&pool, other.id, "jti-owned").await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_revoke_all_with_exception(pool: PgPool) {
    let user = create_user(&pool, "bulk@test.com").await;
    for jti in ["a", "b", "c"] {
        SessionRepo::create(&pool, &new_session(&user, jti))
            .await
            .unwrap();
    }

    let revoked = SessionRepo::revoke_all_for_user(&pool, user.id, Some("b"))
        .await
        .unwrap();
    assert_eq!(revoked, 2);

    let active = SessionRepo::list_for_user(&pool, user.id, true).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].refresh_token_jti, "b");

    let all = SessionRepo::list_for_user(&pool, user.id, false).await.unwrap();
    assert_eq!(all.len(), 3);

    // Nothing left to revoke except "b".
    let revoked = SessionRepo::revoke_all_for_user(&pool, user.id, None)
        .await
        .unwrap();
    assert_eq!(revoked, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_revoked_row_cannot_be_rewritten(pool: PgPool) {
    let user = create_user(&pool, "immutable@test.com").await;
    let session = SessionRepo::create(&pool, &new_session(&user, "jti-i"))
        .await
        .unwrap();
    SessionRepo::revoke(&pool, user.id, "jti-i").await.unwrap();

    let result = sqlx::query("UPDATE sessions SET revoked_at = NULL WHERE id = $1")
        .bind(session.id)
        .execute(&pool)
        .await;
    assert!(result.is_err(), "revoked_at must never be cleared");
}
