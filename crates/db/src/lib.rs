//! PostgreSQL persistence for accounts and the durable session ledger.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

pub mod models;
pub mod repositories;

pub type DbPool = sqlx::PgPool;

/// Maximum pooled connections.
const MAX_CONNECTIONS: u32 = 20;

/// Create a connection pool from a database URL.
///
/// `acquire_timeout` bounds how long a caller waits for a pooled connection;
/// `statement_timeout` makes the server cancel any statement running longer.
pub async fn create_pool(
    database_url: &str,
    acquire_timeout: Duration,
    statement_timeout: Duration,
) -> Result<DbPool, sqlx::Error> {
    let options = with_statement_timeout(PgConnectOptions::from_str(database_url)?, statement_timeout);
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(acquire_timeout)
        .connect_with(options)
        .await
}

/// Set the server-side `statement_timeout` for every connection made with
/// `options`. Cancelled statements fail with SQLSTATE `57014`.
pub fn with_statement_timeout(options: PgConnectOptions, timeout: Duration) -> PgConnectOptions {
    let millis = timeout.as_millis().max(1).to_string();
    options.options([("statement_timeout", millis)])
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
