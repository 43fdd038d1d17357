//! Configuration for StrataDB.
//!
//! This module provides configuration structures for the database handle and
//! the page-oriented storage beneath it.

mod database;

pub use database::{DbConfig, StorageConfig};
