//! # strata-storage
//!
//! Page-oriented storage for StrataDB.
//!
//! This crate provides the layers the table store is built on:
//! - **Pages**: the `PageStore` abstraction with in-memory and file-backed
//!   implementations, plus the checksummed meta page
//! - **Free list**: a persistent FIFO of reclaimable page ids, stored inside
//!   the pages it manages
//! - **KV**: an ordered key-value store with conditional updates and
//!   bidirectional iterators
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │        KvStore (MemoryKv / PagedKv)      │
//! └──────────────────────────────────────────┘
//!                     │
//!          ┌──────────┴──────────┐
//!          ▼                     ▼
//! ┌─────────────────┐   ┌─────────────────┐
//! │    FreeList     │──▶│    PageStore    │
//! └─────────────────┘   │ (Memory / File) │
//!                       └─────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;

/// Free-page list
pub mod freelist;

/// Ordered key-value stores
pub mod kv;

/// Page stores and on-disk page formats
pub mod page;

pub use error::{StorageError, StorageResult};
pub use freelist::{FreeList, FreeListState};
pub use kv::{Cmp, KvIter, KvStats, KvStore, MapIter, MemoryKv, PagedKv, UpdateMode, UpdateOutcome};
pub use page::{MemoryPageStore, PageFile, PageStore};
