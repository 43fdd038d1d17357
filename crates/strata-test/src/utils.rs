//! Temporary databases and common fixtures.

use std::path::{Path, PathBuf};

use strata_common::config::{DbConfig, StorageConfig};
use strata_table::{Db, DbResult, Record, TableDef, ValueType};
use tempfile::TempDir;

/// A database file in a temporary directory that is removed on drop.
pub struct TempDb {
    dir: TempDir,
    config: DbConfig,
}

impl TempDb {
    /// Creates a temporary location using the small-page test configuration.
    pub fn new() -> std::io::Result<Self> {
        Self::with_storage(StorageConfig::for_testing())
    }

    /// Creates a temporary location with the given storage settings.
    pub fn with_storage(storage: StorageConfig) -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let config = DbConfig::new(dir.path().join("test.db")).with_storage(storage);
        Ok(Self { dir, config })
    }

    /// Path of the database file.
    pub fn path(&self) -> PathBuf {
        self.config.path.clone()
    }

    /// Directory holding the file.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Configuration used by [`open`](Self::open).
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Opens (or reopens) the database.
    pub fn open(&self) -> DbResult<Db> {
        Db::open(self.config.clone())
    }

    /// Size of the database file in bytes.
    pub fn file_len(&self) -> u64 {
        std::fs::metadata(&self.config.path)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

/// `users(id INT64, name BYTES, age INT64)` keyed by `id`.
pub fn users_table() -> TableDef {
    TableDef::new("users")
        .column("id", ValueType::Int64)
        .column("name", ValueType::Bytes)
        .column("age", ValueType::Int64)
        .primary_keys(1)
}

/// A complete `users` row.
pub fn user(id: i64, name: &str, age: i64) -> Record {
    Record::new()
        .add_int64("id", id)
        .add_bytes("name", name)
        .add_int64("age", age)
}

/// A `users` primary key.
pub fn user_key(id: i64) -> Record {
    Record::new().add_int64("id", id)
}

/// Installs a test-friendly log subscriber; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
