//! Table schemas.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strata_common::constants::{META_TABLE_PREFIX, SCHEMA_TABLE_PREFIX};

use crate::error::{DbError, DbResult};
use crate::value::ValueType;

/// Name of the index over the primary-key columns.
pub const PRIMARY_INDEX: &str = "primary";

/// Internal key-value table holding database metadata.
pub const META_TABLE: &str = "@meta";

/// Internal table mapping table names to serialized schemas.
pub const SCHEMA_TABLE: &str = "@table";

/// A named list of columns.
///
/// Only the first index of a table (its primary key) is maintained; the
/// others are schema metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name.
    pub name: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
}

/// Schema of a table.
///
/// The first `pkeys` columns form the primary key; rows are stored under
/// the table's `prefix` followed by the encoded key columns.
///
/// # Example
///
/// ```rust
/// use strata_table::{TableDef, ValueType};
///
/// let def = TableDef::new("events")
///     .column("user", ValueType::Bytes)
///     .column("seq", ValueType::Int64)
///     .column("payload", ValueType::Bytes)
///     .primary_keys(2)
///     .index("by_seq", &["seq"]);
///
/// assert!(def.validate().is_ok());
/// assert_eq!(def.primary_key_columns(), ["user", "seq"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Column names in schema order.
    pub cols: Vec<String>,
    /// Column types, parallel to `cols`.
    pub types: Vec<ValueType>,
    /// Number of leading primary-key columns.
    pub pkeys: usize,
    /// Key prefix. Assigned by the database when the table is created.
    #[serde(default)]
    pub prefix: u32,
    /// Indexes; the first one is the primary key.
    #[serde(default)]
    pub indexes: Vec<IndexDef>,
}

impl TableDef {
    /// Starts a schema with no columns and a one-column primary key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cols: Vec::new(),
            types: Vec::new(),
            pkeys: 1,
            prefix: 0,
            indexes: Vec::new(),
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.cols.push(name.into());
        self.types.push(ty);
        self.sync_primary_index();
        self
    }

    /// Sets the number of primary-key columns.
    #[must_use]
    pub fn primary_keys(mut self, n: usize) -> Self {
        self.pkeys = n;
        self.sync_primary_index();
        self
    }

    /// Declares an index. The primary index is added in front of the first
    /// one and follows later `column`/`primary_keys` calls, so builder
    /// calls may come in any order.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>, columns: &[&str]) -> Self {
        if self.indexes.is_empty() {
            self.indexes.push(self.primary_index());
        }
        self.indexes.push(IndexDef {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    /// Position of a column in schema order.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.cols.iter().position(|c| c == name)
    }

    /// Declared type of a column.
    pub fn column_type(&self, name: &str) -> Option<ValueType> {
        self.column_index(name).map(|i| self.types[i])
    }

    /// Primary-key column names.
    pub fn primary_key_columns(&self) -> &[String] {
        &self.cols[..self.pkeys.min(self.cols.len())]
    }

    /// Adds the primary index if no index was declared.
    pub(crate) fn fill_primary_index(&mut self) {
        if self.indexes.is_empty() {
            self.indexes.push(self.primary_index());
        }
    }

    fn sync_primary_index(&mut self) {
        let columns = self.primary_key_columns().to_vec();
        if let Some(first) = self.indexes.first_mut() {
            if first.name == PRIMARY_INDEX {
                first.columns = columns;
            }
        }
    }

    fn primary_index(&self) -> IndexDef {
        IndexDef {
            name: PRIMARY_INDEX.to_string(),
            columns: self.primary_key_columns().to_vec(),
        }
    }

    /// Checks the shape of the schema.
    pub fn validate(&self) -> DbResult<()> {
        let bad = |reason: &str| Err(DbError::bad_schema(&self.name, reason));

        if self.name.is_empty() {
            return bad("table name is empty");
        }
        if self.cols.is_empty() {
            return bad("table has no columns");
        }
        if self.cols.len() != self.types.len() {
            return bad("column and type counts differ");
        }
        if self.pkeys < 1 || self.pkeys > self.cols.len() {
            return bad("primary key count is out of range");
        }

        let mut seen = HashSet::new();
        for col in &self.cols {
            if col.is_empty() {
                return bad("column name is empty");
            }
            if !seen.insert(col.as_str()) {
                return Err(DbError::bad_schema(
                    &self.name,
                    format!("duplicate column {}", col),
                ));
            }
        }

        if let Some(first) = self.indexes.first() {
            if first.columns.as_slice() != self.primary_key_columns() {
                return bad("first index must be the primary key");
            }
        }
        let mut names = HashSet::new();
        for index in &self.indexes {
            if !names.insert(index.name.as_str()) {
                return Err(DbError::bad_schema(
                    &self.name,
                    format!("duplicate index {}", index.name),
                ));
            }
            if index.columns.is_empty() {
                return Err(DbError::bad_schema(
                    &self.name,
                    format!("index {} has no columns", index.name),
                ));
            }
            if let Some(col) = index.columns.iter().find(|c| !seen.contains(c.as_str())) {
                return Err(DbError::bad_schema(
                    &self.name,
                    format!("index {} names unknown column {}", index.name, col),
                ));
            }
        }
        Ok(())
    }

    /// The `@meta` table: `key` to `val`, both byte strings.
    pub(crate) fn meta() -> Self {
        let mut def = Self::new(META_TABLE)
            .column("key", ValueType::Bytes)
            .column("val", ValueType::Bytes)
            .primary_keys(1);
        def.prefix = META_TABLE_PREFIX;
        def.fill_primary_index();
        def
    }

    /// The `@table` table: `name` to serialized `def`.
    pub(crate) fn schema() -> Self {
        let mut def = Self::new(SCHEMA_TABLE)
            .column("name", ValueType::Bytes)
            .column("def", ValueType::Bytes)
            .primary_keys(1);
        def.prefix = SCHEMA_TABLE_PREFIX;
        def.fill_primary_index();
        def
    }
}
