//! SQLite database for persistent storage

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::StorageError;

const CURRENT_SCHEMA_VERSION: i32 = 2;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS credentials (
    account    TEXT PRIMARY KEY NOT NULL,
    secret     BLOB NOT NULL,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
";

const SCHEMA_V2: &str = "
CREATE TABLE IF NOT EXISTS preferences (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
";

/// Shared connection wrapper
///
/// Cloning is cheap; all clones use the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at path and bring its schema up to date
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        create_private(path)?;
        let conn = Connection::open(path)?;
        info!("Opened database at {:?}", path);

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let db = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Create tables if not exist, applying forward-only migrations
    pub fn init_schema(&self) -> Result<(), StorageError> {
        let mut conn = self.conn.lock();
        let mut version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version > CURRENT_SCHEMA_VERSION {
            return Err(StorageError::SchemaTooNew {
                found: version,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }
        if version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        let tx = conn.transaction()?;
        while version < CURRENT_SCHEMA_VERSION {
            version += 1;
            apply_migration(&tx, version)?;
            debug!("Applied schema migration v{}", version);
        }
        tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
        tx.commit()?;

        Ok(())
    }

    /// Run a closure against the connection
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StorageError> {
        let mut conn = self.conn.lock();
        Ok(f(&mut conn)?)
    }

    /// Current schema version
    pub fn schema_version(&self) -> Result<i32, StorageError> {
        self.with_conn(|conn| conn.pragma_query_value(None, "user_version", |row| row.get(0)))
    }
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<(), rusqlite::Error> {
    match version {
        1 => tx.execute_batch(SCHEMA_V1),
        2 => tx.execute_batch(SCHEMA_V2),
        _ => Ok(()),
    }
}

/// Create the database file owner-only before SQLite first opens it
///
/// SQLite creates `-journal` and `-wal` files with the mode of the main
/// file, so they stay private as well. Files left by older versions are
/// tightened in place.
#[cfg(unix)]
fn create_private(path: &Path) -> Result<(), StorageError> {
    use std::fs::{OpenOptions, Permissions};
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o600)
        .open(path)?;
    std::fs::set_permissions(path, Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}
