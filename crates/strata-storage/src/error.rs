//! Error types for the storage layer.

use std::path::PathBuf;

use strata_common::types::PageId;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the page stores, the free list and the KV store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error from the underlying file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Page id is past the end of the store.
    #[error("page not found: {0}")]
    PageNotFound(PageId),

    /// A page buffer of the wrong size was handed to the store.
    #[error("invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize {
        /// Page size of the store.
        expected: usize,
        /// Size of the rejected buffer.
        actual: usize,
    },

    /// On-disk state violates an invariant.
    #[error("data corruption: {0}")]
    Corruption(String),

    /// Meta page checksum does not match its contents.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// Keys must contain at least one byte.
    #[error("key must not be empty")]
    EmptyKey,

    /// Key is too large.
    #[error("key too large: {size} bytes (max: {max})")]
    KeyTooLarge {
        /// Actual size of the key.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Value is too large.
    #[error("value too large: {size} bytes (max: {max})")]
    ValueTooLarge {
        /// Actual size of the value.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Configuration was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Database file does not exist and creation was disabled.
    #[error("database file not found: {}", .0.display())]
    NotFound(PathBuf),
}

impl StorageError {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Returns true if this error means the stored data can no longer be
    /// trusted.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption(_) | Self::ChecksumMismatch { .. })
    }
}
