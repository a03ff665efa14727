//! Database access: pool, migrations, and row-level query modules

pub mod db;
pub mod migrations;
pub mod raffles;
pub mod settings;
pub mod shop;
pub mod transactions;
pub mod users;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};

#[cfg(test)]
pub(crate) mod testutil {
    use rusqlite::Connection;

    use super::migrations::run_migrations_for_test;

    /// In-memory database with the full production schema applied.
    pub fn memory_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations_for_test(&mut conn).unwrap();
        conn
    }
}
