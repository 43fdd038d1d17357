//! Database configuration structures.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_MAX_KEY_SIZE, DEFAULT_MAX_VALUE_SIZE, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE,
};

/// Main database configuration.
///
/// # Example
///
/// ```rust
/// use strata_common::config::DbConfig;
///
/// let config = DbConfig::new("app.db");
/// assert_eq!(config.storage.page_size, 4096);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Path of the database file.
    pub path: PathBuf,

    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl DbConfig {
    /// Creates a configuration for the database file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            storage: StorageConfig::default(),
        }
    }

    /// Replaces the storage configuration.
    #[must_use]
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.path.as_os_str().is_empty() {
            return Err("path must not be empty".to_string());
        }
        self.storage.validate()
    }
}

/// Storage engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Size of each page in bytes. Must be a power of 2.
    /// Default: 4096
    pub page_size: usize,

    /// Maximum encoded key size in bytes.
    /// Default: 1000
    pub max_key_size: usize,

    /// Maximum encoded value size in bytes.
    /// Default: 3000
    pub max_value_size: usize,

    /// fsync data pages and then the meta page on every commit.
    /// Default: true
    pub sync_on_commit: bool,

    /// Commit after every mutation. When disabled, mutations stay in memory
    /// until an explicit flush or close.
    /// Default: true
    pub auto_commit: bool,

    /// Create the database file if it does not exist.
    /// Default: true
    pub create_if_missing: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_key_size: DEFAULT_MAX_KEY_SIZE,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            sync_on_commit: true,
            auto_commit: true,
            create_if_missing: true,
        }
    }
}

impl StorageConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a minimal configuration for testing: small pages so that
    /// free-list nodes roll over quickly, and no fsync.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            page_size: 256,
            sync_on_commit: false,
            ..Default::default()
        }
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the maximum key size.
    #[must_use]
    pub fn with_max_key_size(mut self, size: usize) -> Self {
        self.max_key_size = size;
        self
    }

    /// Sets the maximum value size.
    #[must_use]
    pub fn with_max_value_size(mut self, size: usize) -> Self {
        self.max_value_size = size;
        self
    }

    /// Enables or disables fsync on commit.
    #[must_use]
    pub fn with_sync_on_commit(mut self, sync: bool) -> Self {
        self.sync_on_commit = sync;
        self
    }

    /// Enables or disables commit-per-mutation.
    #[must_use]
    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    /// Enables or disables file creation on open.
    #[must_use]
    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !self.page_size.is_power_of_two() {
            return Err("page_size must be a power of 2".to_string());
        }
        if self.page_size < MIN_PAGE_SIZE || self.page_size > MAX_PAGE_SIZE {
            return Err(format!(
                "page_size must be between {} and {} bytes",
                MIN_PAGE_SIZE, MAX_PAGE_SIZE
            ));
        }
        if self.max_key_size == 0 {
            return Err("max_key_size must be greater than 0".to_string());
        }
        if self.max_value_size == 0 {
            return Err("max_value_size must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.page_size, 4096);
        assert!(config.sync_on_commit);
        assert!(config.auto_commit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_testing_config() {
        let config = StorageConfig::for_testing();
        assert_eq!(config.page_size, 256);
        assert!(!config.sync_on_commit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_page_size() {
        assert!(StorageConfig::new().with_page_size(1000).validate().is_err());
        assert!(StorageConfig::new().with_page_size(64).validate().is_err());
        assert!(StorageConfig::new()
            .with_page_size(128 * 1024)
            .validate()
            .is_err());
    }

    #[test]
    fn test_invalid_limits() {
        assert!(StorageConfig::new().with_max_key_size(0).validate().is_err());
        assert!(StorageConfig::new()
            .with_max_value_size(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_db_config() {
        let config = DbConfig::new("test.db").with_storage(StorageConfig::for_testing());
        assert!(config.validate().is_ok());
        assert!(DbConfig::new("").validate().is_err());
    }

    #[test]
    fn test_config_deserialize_partial() {
        let json = r#"{"path": "a.db", "storage": {"page_size": 8192}}"#;
        let config: DbConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.storage.page_size, 8192);
        assert_eq!(config.storage.max_key_size, DEFAULT_MAX_KEY_SIZE);

        let json = r#"{"path": "b.db"}"#;
        let config: DbConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.storage, StorageConfig::default());
    }
}
