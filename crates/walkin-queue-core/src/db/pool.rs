//! Writer/reader connection handling.
//!
//! All writes go through a single connection behind a mutex. File-backed
//! stores hand reads to an `r2d2` pool of read-only WAL connections, so
//! polling viewers neither queue behind each other nor see a half-applied
//! transition. In-memory stores have only the one connection.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;

use super::{register_functions, Database, DbError, DbResult};

/// Upper bound on concurrently open read connections.
const MAX_READERS: u32 = 8;

/// Shared handle to the queue's storage.
pub struct Store {
    writer: Mutex<Database>,
    readers: Option<Pool<SqliteConnectionManager>>,
}

impl Store {
    /// Open a file-backed store with a reader pool.
    pub fn open(path: impl Into<PathBuf>, busy_timeout: Duration) -> DbResult<Self> {
        let path = path.into();
        let writer = Database::open(&path, busy_timeout)?;

        let manager = SqliteConnectionManager::file(&path)
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX
                    | OpenFlags::SQLITE_OPEN_URI,
            )
            .with_init(move |conn| {
                conn.busy_timeout(busy_timeout)?;
                register_functions(conn)
            });
        let readers = Pool::builder()
            .max_size(MAX_READERS)
            .min_idle(Some(1))
            .connection_timeout(busy_timeout)
            .build(manager)?;

        Ok(Self {
            writer: Mutex::new(writer),
            readers: Some(readers),
        })
    }

    /// In-memory store; reads share the writer connection.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self {
            writer: Mutex::new(Database::open_in_memory()?),
            readers: None,
        })
    }

    /// Run `f` with exclusive use of the writer connection.
    pub fn write<T, E>(&self, f: impl FnOnce(&Database) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let db = self.lock_writer()?;
        f(&db)
    }

    /// Run `f` on a read connection.
    pub fn read<T, E>(&self, f: impl FnOnce(&Database) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        match &self.readers {
            Some(pool) => {
                let conn = pool.get().map_err(DbError::from)?;
                f(&Database::pooled(conn))
            }
            None => {
                let db = self.lock_writer()?;
                f(&db)
            }
        }
    }

    fn lock_writer(&self) -> DbResult<MutexGuard<'_, Database>> {
        self.writer.lock().map_err(|e| DbError::Poisoned(e.to_string()))
    }
}
