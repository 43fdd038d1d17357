//! Records and their validation against a schema.

use crate::error::{DbError, DbResult};
use crate::schema::TableDef;
use crate::value::Value;

/// A sparse row: column names paired with values.
///
/// Lookups return the first column with a matching name. A record carries
/// no schema; it is checked against a [`TableDef`] when used.
///
/// # Example
///
/// ```rust
/// use strata_table::{Record, Value};
///
/// let rec = Record::new().add_int64("id", 7).add_bytes("name", "bob");
/// assert_eq!(rec.get("id"), Some(&Value::Int64(7)));
/// assert_eq!(rec.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    cols: Vec<String>,
    vals: Vec<Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column.
    #[must_use]
    pub fn add(mut self, col: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(col, value);
        self
    }

    /// Adds a byte-string column.
    #[must_use]
    pub fn add_bytes(self, col: impl Into<String>, value: impl AsRef<[u8]>) -> Self {
        self.add(col, Value::Bytes(value.as_ref().to_vec()))
    }

    /// Adds an integer column.
    #[must_use]
    pub fn add_int64(self, col: impl Into<String>, value: i64) -> Self {
        self.add(col, Value::Int64(value))
    }

    /// Appends a column in place.
    pub fn push(&mut self, col: impl Into<String>, value: impl Into<Value>) {
        self.cols.push(col.into());
        self.vals.push(value.into());
    }

    /// Returns the value of the first column named `col`.
    pub fn get(&self, col: &str) -> Option<&Value> {
        self.cols
            .iter()
            .position(|c| c == col)
            .map(|i| &self.vals[i])
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.cols.len()
    }

    /// Returns true if the record has no columns.
    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.cols
    }

    /// Values, parallel to [`columns`](Self::columns).
    pub fn values(&self) -> &[Value] {
        &self.vals
    }

    /// Iterates `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cols.iter().map(String::as_str).zip(self.vals.iter())
    }

    /// Replaces the contents with a full row in schema order.
    pub(crate) fn fill(&mut self, def: &TableDef, vals: Vec<Value>) {
        self.cols = def.cols.clone();
        self.vals = vals;
    }
}

/// Places the record's values in schema order.
///
/// Absent columns are `None`. Columns the schema does not know are ignored.
/// A present column whose value type differs from the declared type fails
/// with `BadColumnType`.
pub fn reorder_record(def: &TableDef, rec: &Record) -> DbResult<Vec<Option<Value>>> {
    def.cols
        .iter()
        .zip(&def.types)
        .map(|(col, ty)| match rec.get(col) {
            None => Ok(None),
            Some(v) if v.value_type() == *ty => Ok(Some(v.clone())),
            Some(v) => Err(DbError::BadColumnType {
                column: col.clone(),
                expected: *ty,
                actual: v.value_type(),
            }),
        })
        .collect()
}

/// Reorders the record and requires exactly the first `n` schema columns to
/// be set. Returns those `n` values.
pub fn check_record(def: &TableDef, rec: &Record, n: usize) -> DbResult<Vec<Value>> {
    let vals = reorder_record(def, rec)?;
    let mut out = Vec::with_capacity(n);
    for (i, val) in vals.into_iter().enumerate() {
        match (i < n, val) {
            (true, Some(v)) => out.push(v),
            (true, None) => return Err(DbError::MissingColumn(def.cols[i].clone())),
            (false, Some(_)) => return Err(DbError::ExtraColumn(def.cols[i].clone())),
            (false, None) => {}
        }
    }
    Ok(out)
}

/// Extracts the named columns, in the order given.
pub fn get_values<S: AsRef<str>>(def: &TableDef, rec: &Record, cols: &[S]) -> DbResult<Vec<Value>> {
    cols.iter()
        .map(|col| {
            let col = col.as_ref();
            let ty = def
                .column_type(col)
                .ok_or_else(|| DbError::UnknownColumn(col.to_string()))?;
            let v = rec
                .get(col)
                .ok_or_else(|| DbError::MissingColumn(col.to_string()))?;
            if v.value_type() != ty {
                return Err(DbError::BadColumnType {
                    column: col.to_string(),
                    expected: ty,
                    actual: v.value_type(),
                });
            }
            Ok(v.clone())
        })
        .collect()
}
