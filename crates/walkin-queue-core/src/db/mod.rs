//! Database layer for the walk-in queue.

mod schema;
mod patients;
mod pool;
mod rooms;
mod tickets;

pub use schema::*;
#[allow(unused_imports)]
pub use patients::*;
pub use pool::*;
#[allow(unused_imports)]
pub use rooms::*;
#[allow(unused_imports)]
pub use tickets::*;

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::ops::Deref;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: DbConn,
}

/// The writer owns its connection; readers borrow one from the pool.
enum DbConn {
    Owned(Connection),
    Pooled(PooledConnection<SqliteConnectionManager>),
}

impl Deref for DbConn {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            DbConn::Owned(conn) => conn,
            DbConn::Pooled(conn) => &**conn,
        }
    }
}

impl Database {
    /// Open database at path, creating if needed. The store runs in WAL mode so
    /// read-only connections can run alongside the writer.
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        let db = Self {
            conn: DbConn::Owned(conn),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let db = Self {
            conn: DbConn::Owned(Connection::open_in_memory()?),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Wrap a connection checked out of the reader pool.
    pub(crate) fn pooled(conn: PooledConnection<SqliteConnectionManager>) -> Self {
        Self {
            conn: DbConn::Pooled(conn),
        }
    }

    /// Initialize SQL functions and schema.
    fn initialize(&self) -> DbResult<()> {
        register_functions(&self.conn)?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction that takes the store's write lock up front.
    ///
    /// Every `Database` method called while the returned guard is alive runs
    /// inside it; dropping the guard without `commit` rolls everything back.
    pub fn begin_immediate(&self) -> DbResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Begin a read transaction so several queries observe one snapshot.
    pub fn begin_read(&self) -> DbResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Deferred,
        )?)
    }
}

/// Register the SQL functions queries rely on. Every connection needs them.
///
/// - `casefold(text)`: Unicode lowercase, for case-insensitive name search
pub(crate) fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

/// Storage form of a timestamp: fixed-width RFC 3339 in UTC, so text order is
/// time order.
pub fn to_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
pub fn parse_timestamp(s: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| DbError::Constraint(format!("Bad timestamp {:?}: {}", s, e)))
}

fn parse_optional_timestamp(s: Option<String>) -> DbResult<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_timestamp).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        // Check that tables exist
        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"patients".to_string()));
        assert!(tables.contains(&"tickets".to_string()));
        assert!(tables.contains(&"rooms".to_string()));
        assert!(tables.contains(&"ticket_sequence".to_string()));
    }

    #[test]
    fn test_timestamp_fixed_width() {
        let early = Utc.with_ymd_and_hms(2026, 3, 1, 9, 5, 0).unwrap();
        let late = early + chrono::Duration::microseconds(1_500_250);

        let a = to_timestamp(&early);
        let b = to_timestamp(&late);
        assert_eq!(a, "2026-03-01T09:05:00.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);

        assert_eq!(parse_timestamp(&b).unwrap(), late);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_rollback_on_drop() {
        let db = Database::open_in_memory().unwrap();
        {
            let _tx = db.begin_immediate().unwrap();
            db.conn()
                .execute(
                    "INSERT INTO patients (patient_id, name, created_at) VALUES ('p1', 'Ana', 'x')",
                    [],
                )
                .unwrap();
        }
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
