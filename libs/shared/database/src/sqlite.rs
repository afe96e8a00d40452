use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::schema::CLINIC_SCHEMA;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database connection lock poisoned")]
    Poisoned,

    #[error("Blocking database task failed: {0}")]
    TaskFailed(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

/// Shared handle to the clinic store.
///
/// A single connection sits behind a mutex, so at most one unit of work runs at
/// a time inside this process. Write transactions additionally begin with
/// `BEGIN IMMEDIATE`, which takes SQLite's write lock up front and serializes
/// writers across processes sharing the same file.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn from_config(config: &AppConfig) -> Result<Self, DatabaseError> {
        let busy_timeout = Duration::from_millis(config.database_busy_timeout_ms);
        if config.is_persistent() {
            Self::open(&config.database_path, busy_timeout)
        } else {
            Self::open_in_memory()
        }
    }

    pub fn open(path: &str, busy_timeout: Duration) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::bootstrap(&conn)?;
        info!("Database initialized at {}", path);
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(&conn)?;
        debug!("In-memory database initialized");
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn bootstrap(conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(CLINIC_SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| {
            error!("Database connection mutex poisoned");
            DatabaseError::Poisoned
        })
    }

    /// Run read-only work on the shared connection.
    pub fn with_connection<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<DatabaseError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside one write transaction.
    /// Commits on `Ok`, rolls back on `Err`.
    pub fn with_write_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<DatabaseError>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DatabaseError::from)?;

        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(DatabaseError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}
