//! StrataDB Performance Benchmarks
//!
//! This crate contains benchmarks for the StrataDB layers:
//! - Value and key encoding
//! - Key-value stores (in-memory and paged) and the free list
//! - Table CRUD and range scans through `Db`
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench -p strata-bench
//! ```

pub mod utils;
