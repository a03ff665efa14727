use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::time::Duration;

use super::migrations::run_migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and runs schema
/// migrations on the first connection.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
pub fn create_pool(database_path: &str) -> Result<DbPool> {
    // Writers queue on the file lock instead of failing fast; engine
    // transactions open IMMEDIATE, so the timeout is what absorbs bursts.
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.busy_timeout(Duration::from_secs(30)));
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)
        .context("build connection pool")?;

    let mut conn = pool.get().context("get migration connection")?;
    run_migrations(&mut conn).context("run schema migrations")?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is automatically returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> std::result::Result<DbConnection, r2d2::Error> {
    pool.get()
}
