//! Error types for the table layer.

use std::fmt;

use strata_storage::{Cmp, StorageError};
use thiserror::Error;

use crate::value::ValueType;

/// Result type for table operations.
pub type DbResult<T> = Result<T, DbError>;

/// Malformed encoded keys or values.
///
/// Every codec error means stored bytes were not produced by the encoder,
/// so all of them are treated as corruption.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// An escape byte was followed by something other than 0x01 or 0x02.
    #[error("malformed escape sequence: 0x01 followed by {0:#04x}")]
    BadEscape(u8),

    /// Input ended right after an escape byte.
    #[error("escape byte at end of input")]
    TruncatedEscape,

    /// A byte string had no terminator.
    #[error("missing string terminator")]
    MissingTerminator,

    /// Input ended inside a fixed-width value.
    #[error("input too short: need {needed} bytes, have {available}")]
    ShortInput {
        /// Bytes required.
        needed: usize,
        /// Bytes left.
        available: usize,
    },

    /// Bytes were left over after the last value.
    #[error("{0} trailing bytes after last value")]
    TrailingBytes(usize),

    /// Key belongs to another table.
    #[error("table prefix mismatch: expected {expected}, found {found}")]
    PrefixMismatch {
        /// Prefix of the table being decoded.
        expected: u32,
        /// Prefix found in the key.
        found: u32,
    },
}

/// Coarse error classes, matching how callers are expected to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Unknown table, duplicate table, or malformed schema.
    Schema,
    /// Record does not fit the table's columns.
    Record,
    /// Bad scan bounds or cursor misuse.
    Range,
    /// Stored data is inconsistent. Fatal.
    Corruption,
    /// Error from the underlying store.
    Storage,
    /// Handle was poisoned by an earlier fatal error.
    Poisoned,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Schema => "schema",
            Self::Record => "record",
            Self::Range => "range",
            Self::Corruption => "corruption",
            Self::Storage => "storage",
            Self::Poisoned => "poisoned",
        };
        f.write_str(name)
    }
}

/// Errors returned by [`Db`](crate::Db) and [`Scanner`](crate::Scanner).
#[derive(Debug, Error)]
pub enum DbError {
    /// Table does not exist.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// Table name is taken or reserved.
    #[error("table exists: {0}")]
    TableExists(String),

    /// Schema failed validation.
    #[error("bad table schema: {table}: {reason}")]
    BadSchema {
        /// Table name.
        table: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A required column is not set.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// A column is set that must not be.
    #[error("extra column: {0}")]
    ExtraColumn(String),

    /// A column is not part of the table.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// A column value has the wrong type.
    #[error("bad column type: {column} (expected {expected}, got {actual})")]
    BadColumnType {
        /// Column name.
        column: String,
        /// Declared type.
        expected: ValueType,
        /// Type of the supplied value.
        actual: ValueType,
    },

    /// Scan comparators do not point toward each other.
    #[error("bad range: {cmp1:?} cannot be paired with {cmp2:?}")]
    BadRange {
        /// Start comparator.
        cmp1: Cmp,
        /// End comparator.
        cmp2: Cmp,
    },

    /// Cursor used while not positioned on a row.
    #[error("scanner is not positioned on a row")]
    InvalidCursor,

    /// Stored bytes failed to decode.
    #[error("corrupted data: {0}")]
    Codec(#[from] CodecError),

    /// Stored schema or metadata is inconsistent.
    #[error("corrupted data: {0}")]
    Corruption(String),

    /// Error from the key-value store.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The handle hit a fatal error earlier and refuses further work.
    #[error("database handle is poisoned: {0}")]
    Poisoned(String),
}

impl DbError {
    /// Creates a schema validation error.
    pub fn bad_schema(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadSchema {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Returns the error class.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TableNotFound(_) | Self::TableExists(_) | Self::BadSchema { .. } => {
                ErrorCategory::Schema
            }
            Self::MissingColumn(_)
            | Self::ExtraColumn(_)
            | Self::UnknownColumn(_)
            | Self::BadColumnType { .. } => ErrorCategory::Record,
            Self::BadRange { .. } | Self::InvalidCursor => ErrorCategory::Range,
            Self::Codec(_) | Self::Corruption(_) => ErrorCategory::Corruption,
            Self::Storage(e) if e.is_corruption() => ErrorCategory::Corruption,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Poisoned(_) => ErrorCategory::Poisoned,
        }
    }

    /// Returns true if the handle must not be used after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Corruption | ErrorCategory::Poisoned
        )
    }
}
