//! # strata-test
//!
//! Integration tests for StrataDB.
//!
//! This crate contains:
//! - End-to-end tests over real database files (`tests/`)
//! - Test utilities for temporary databases
//! - A seeded workload generator with a reference model

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Test utilities and helpers
pub mod utils;

/// Workload generators
pub mod workload;
