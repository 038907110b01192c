//! Integration tests for pool construction.

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_statement_timeout_applies_to_every_connection(
    pool_options: PgPoolOptions,
    connect_options: PgConnectOptions,
) {
    let options = gatekeep_db::with_statement_timeout(connect_options, Duration::from_millis(250));
    let pool = pool_options.connect_with(options).await.unwrap();

    let setting: String = sqlx::query_scalar("SHOW statement_timeout")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(setting, "250ms");

    let err = sqlx::query("SELECT pg_sleep(2)")
        .execute(&pool)
        .await
        .unwrap_err();
    let code = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|c| c.into_owned());
    assert_eq!(code.as_deref(), Some("57014"));
}
