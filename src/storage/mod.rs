//! Storage Layer
//!
//! Persists credentials and small preferences in a local SQLite database.

pub mod credentials;
pub mod database;
pub mod preferences;

use anyhow::Result;
use std::path::PathBuf;
use thiserror::Error;

pub use credentials::{CredentialStore, MemoryCredentialStore, SqliteCredentialStore};
pub use database::Database;
pub use preferences::{MemoryPreferenceStore, PreferenceStore, SqlitePreferenceStore};

/// Database file name inside the data directory
pub const DATABASE_FILE: &str = "ar-translate.db";

/// Failure reading or writing local storage
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored value for '{0}' is not valid UTF-8")]
    Corrupt(String),

    #[error("database schema version {found} is newer than supported {supported}")]
    SchemaTooNew { found: i32, supported: i32 },
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "artranslate", "ARTranslate")
        .ok_or_else(|| anyhow::anyhow!("Could not determine application directories"))
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Default database location
pub fn default_database_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DATABASE_FILE))
}
