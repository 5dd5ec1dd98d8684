//! Credential storage keyed by username
//!
//! On device this seam is the platform keystore. The SQLite store keeps the
//! same contract for desktop runs: one entry per account, raw password bytes
//! as the value, overwrite by delete-then-insert.

use parking_lot::Mutex;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;
use tracing::debug;

use super::{Database, StorageError};

/// Keyed secret storage for account passwords
pub trait CredentialStore: Send + Sync {
    /// Store `password` for `username`, replacing any existing entry
    fn save(&self, username: &str, password: &str) -> Result<(), StorageError>;

    /// Fetch the password stored for `username`
    fn get(&self, username: &str) -> Result<Option<String>, StorageError>;

    /// Remove the entry for `username`; returns whether one existed
    fn delete(&self, username: &str) -> Result<bool, StorageError>;
}

/// Credential store backed by the local database
#[derive(Clone)]
pub struct SqliteCredentialStore {
    db: Database,
}

impl SqliteCredentialStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn save(&self, username: &str, password: &str) -> Result<(), StorageError> {
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM credentials WHERE account = ?1", params![username])?;
            tx.execute(
                "INSERT INTO credentials (account, secret) VALUES (?1, ?2)",
                params![username, password.as_bytes()],
            )?;
            tx.commit()
        })?;
        debug!("Stored credential for account");
        Ok(())
    }

    fn get(&self, username: &str) -> Result<Option<String>, StorageError> {
        let secret: Option<Vec<u8>> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT secret FROM credentials WHERE account = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()
        })?;

        secret
            .map(|bytes| String::from_utf8(bytes).map_err(|_| StorageError::Corrupt(username.to_string())))
            .transpose()
    }

    fn delete(&self, username: &str) -> Result<bool, StorageError> {
        let removed = self.db.with_conn(|conn| {
            conn.execute("DELETE FROM credentials WHERE account = ?1", params![username])
        })?;
        Ok(removed > 0)
    }
}

/// Process-local credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, username: &str, password: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        entries.remove(username);
        entries.insert(username.to_string(), password.as_bytes().to_vec());
        Ok(())
    }

    fn get(&self, username: &str) -> Result<Option<String>, StorageError> {
        self.entries
            .lock()
            .get(username)
            .map(|bytes| String::from_utf8(bytes.clone()).map_err(|_| StorageError::Corrupt(username.to_string())))
            .transpose()
    }

    fn delete(&self, username: &str) -> Result<bool, StorageError> {
        Ok(self.entries.lock().remove(username).is_some())
    }
}
