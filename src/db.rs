//! Database connection pools and migration management.
//!
//! This module provides utilities for:
//! - Creating the PostgreSQL pool that backs accounts, credit ledgers, API keys and usage logs
//! - Creating the read-only MySQL pool of the WordPress news source
//! - Running database migrations automatically

use sqlx::{MySql, Pool, Postgres};

/// Type alias for PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Type alias for the MySQL pool of the news content source.
pub type NewsPool = Pool<MySql>;

/// SQLSTATE raised by PostgreSQL when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Create a new PostgreSQL connection pool.
///
/// A connection pool maintains multiple database connections that can be reused across HTTP requests.
/// Each admitted partner request holds one connection for the duration of its ledger transaction,
/// so `max_connections` also bounds how many deductions can be in flight at once.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection string is invalid
/// - Cannot connect to PostgreSQL server
/// - Database authentication fails
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Create the pool used to read news content.
///
/// Connections are opened lazily: the content source being down must not prevent
/// the service (and its dashboard) from starting.
pub fn create_news_pool(news_database_url: &str) -> Result<NewsPool, sqlx::Error> {
    sqlx::mysql::MySqlPoolOptions::new()
        .max_connections(5)
        .connect_lazy(news_database_url)
}

/// Run database migrations from the `migrations/` directory.
///
/// Migrations are tracked in the `_sqlx_migrations` table, so each migration runs only once.
/// Only the PostgreSQL store is migrated; the news source is owned by WordPress.
///
/// # Errors
///
/// Returns an error if:
/// - Migration files cannot be read
/// - SQL syntax errors in migration files
/// - Database errors during migration execution
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    // The macro reads migrations at compile time from ./migrations directory
    sqlx::migrate!("./migrations").run(pool).await
}

/// Whether the error is PostgreSQL giving up on a row lock.
pub fn is_lock_timeout(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == LOCK_NOT_AVAILABLE)
}
