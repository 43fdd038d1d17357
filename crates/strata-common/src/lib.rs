//! # strata-common
//!
//! Common types, constants and configuration for StrataDB.
//!
//! This crate provides the foundational pieces shared by every StrataDB
//! component:
//!
//! - **Types**: page identifiers used by the page stores and the free list
//! - **Config**: database and storage configuration structures
//! - **Constants**: page geometry, reserved table prefixes and size limits
//!
//! ## Example
//!
//! ```rust
//! use strata_common::config::DbConfig;
//! use strata_common::types::PageId;
//!
//! let config = DbConfig::new("/tmp/example.db");
//! assert!(config.validate().is_ok());
//!
//! let page = PageId::new(42);
//! assert!(!page.is_null());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::{DbConfig, StorageConfig};
pub use constants::*;
pub use types::PageId;
