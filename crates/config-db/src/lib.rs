//! SQLite database layer for module configuration tables.

pub mod rows;

pub use rows::StoredRow;

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio_util::sync::CancellationToken;

/// Number of SQLite VM instructions between cancellation checks.
const PROGRESS_OPS: i32 = 1_000;

/// Thread-safe database handle wrapping a single SQLite connection.
///
/// The handle behaves like a pool capped at one connection: every access
/// takes the same lock, so a query must never be issued while another
/// access on the same handle is still pending.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the config database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        Self::with_pragmas(Connection::open(path)?)
    }

    /// Private in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::with_pragmas(Connection::open_in_memory()?)
    }

    fn with_pragmas(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Access the underlying connection with a closure.
    pub fn with_conn<F, R>(&self, f: F) -> Result<R, DbError>
    where
        F: FnOnce(&Connection) -> Result<R, DbError>,
    {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        f(&conn)
    }

    /// Access the underlying connection mutably (for transactions).
    pub fn with_conn_mut<F, R>(&self, f: F) -> Result<R, DbError>
    where
        F: FnOnce(&mut Connection) -> Result<R, DbError>,
    {
        let mut conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        f(&mut conn)
    }

    /// Access the connection with `cancel` wired into SQLite's progress
    /// handler, so a running statement is interrupted once the token fires.
    pub fn with_cancellable<F, R>(&self, cancel: &CancellationToken, f: F) -> Result<R, DbError>
    where
        F: FnOnce(&mut Connection) -> Result<R, DbError>,
    {
        ensure_active(cancel)?;
        self.with_conn_mut(|conn| {
            let token = AssertUnwindSafe(cancel.clone());
            conn.progress_handler(PROGRESS_OPS, Some(move || token.is_cancelled()));
            let result = f(conn);
            conn.progress_handler(0, None::<fn() -> bool>);
            match result {
                Err(DbError::Sqlite(e)) if cancel.is_cancelled() => {
                    tracing::debug!("Statement interrupted by cancellation: {e}");
                    Err(DbError::Cancelled)
                }
                other => other,
            }
        })
    }

    /// Apply DDL owned by a module (table creation, column evolution).
    pub fn migrate(&self, sql: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute_batch(sql)?;
            Ok(())
        })
    }
}

/// Fail fast when the caller has already given up.
pub fn ensure_active(cancel: &CancellationToken) -> Result<(), DbError> {
    if cancel.is_cancelled() {
        return Err(DbError::Cancelled);
    }
    Ok(())
}

/// Database error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Operation cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().expect("Failed to create test DB");
        db.migrate(
            "CREATE TABLE demo_config (
                version INTEGER PRIMARY KEY AUTOINCREMENT,
                created INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                name TEXT,
                retries INTEGER
            ) STRICT",
        )
        .expect("Failed to create demo table");
        db
    }

    #[test]
    fn test_cancelled_token_short_circuits() {
        let db = test_db();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = db.with_cancellable(&cancel, |_| Ok(())).unwrap_err();
        assert!(matches!(err, DbError::Cancelled));
    }

    #[test]
    fn test_progress_handler_is_cleared() {
        let db = test_db();
        let cancel = CancellationToken::new();
        db.with_cancellable(&cancel, |_| Ok(())).unwrap();

        // A token cancelled after the call must not affect later queries.
        cancel.cancel();
        let count = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM demo_config", [], |row| {
                    row.get::<_, i64>(0)
                })?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_long_query_is_interrupted() {
        let db = test_db();
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Bypass the upfront check to exercise the progress handler itself.
        let outcome = db
            .with_conn_mut(|conn| {
                let token = AssertUnwindSafe(cancel.clone());
                conn.progress_handler(PROGRESS_OPS, Some(move || token.is_cancelled()));
                let result = conn.query_row(
                    "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 10000000)
                     SELECT COUNT(*) FROM n",
                    [],
                    |row| row.get::<_, i64>(0),
                );
                conn.progress_handler(0, None::<fn() -> bool>);
                Ok(result)
            })
            .unwrap();
        assert!(outcome.is_err());
    }
}
