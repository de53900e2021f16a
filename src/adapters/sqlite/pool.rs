//! SQLite connection pool.
//!
//! The store is a single shared connection: concurrent turns serialize at
//! this boundary and rely on SQLite's own locking.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Opens the single-connection pool for `url` (a `sqlite:` URL).
pub async fn connect(
    url: &str,
    busy_timeout: Duration,
    create_if_missing: bool,
) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .busy_timeout(busy_timeout)
        .create_if_missing(create_if_missing)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

/// A private in-memory database, alive for as long as the pool.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    connect("sqlite::memory:", Duration::from_secs(5), false).await
}
