//! # strata-table
//!
//! The table layer of StrataDB: typed rows with composite primary keys,
//! stored in an ordered key-value store.
//!
//! - **Codec**: order-preserving encoding of values and composite keys
//! - **Records and schemas**: sparse rows validated against a `TableDef`
//! - **Db**: schema registry, CRUD and range scans
//!
//! # Example
//!
//! ```rust
//! use strata_table::{Db, Record, TableDef, ValueType};
//!
//! let mut db = Db::memory();
//! db.table_new(
//!     TableDef::new("users")
//!         .column("id", ValueType::Int64)
//!         .column("name", ValueType::Bytes)
//!         .primary_keys(1),
//! )
//! .unwrap();
//!
//! let row = Record::new().add_int64("id", 1).add_bytes("name", "alice");
//! assert!(db.insert("users", &row).unwrap());
//!
//! let mut found = Record::new().add_int64("id", 1);
//! assert!(db.get("users", &mut found).unwrap());
//! assert_eq!(found.get("name").and_then(|v| v.as_bytes()), Some(&b"alice"[..]));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
mod db;
mod error;
mod record;
mod scanner;
mod schema;
mod value;

pub use db::Db;
pub use error::{CodecError, DbError, DbResult, ErrorCategory};
pub use record::{check_record, get_values, reorder_record, Record};
pub use scanner::{ScanRange, Scanner};
pub use schema::{IndexDef, TableDef, META_TABLE, PRIMARY_INDEX, SCHEMA_TABLE};
pub use value::{Value, ValueType};

pub use strata_storage::{Cmp, UpdateMode, UpdateOutcome};
