//! Page stores.
//!
//! A page store is an array of fixed-size pages addressed by [`PageId`].
//! Page 0 is reserved for the meta page; every other page is either part of
//! the data snapshot, a free-list node, or an entry in the free list.
//!
//! ```text
//! ┌────────┬────────┬────────┬────────┬─────
//! │ page 0 │ page 1 │ page 2 │ page 3 │ ...
//! │  meta  │  free  │  data  │  free  │
//! │        │  node  │        │  (id)  │
//! └────────┴────────┴────────┴────────┴─────
//! ```

mod checksum;
mod file;
mod memory;
mod meta;

pub use checksum::{compute_checksum, verify_checksum};
pub use file::PageFile;
pub use memory::MemoryPageStore;
pub use meta::{probe_page_size, MetaPage, META_SIZE};

use strata_common::types::PageId;

use crate::error::StorageResult;

/// Fixed-size page storage.
///
/// Implementations hand out pages by id. Reads may need to fill a cache, so
/// every accessor takes `&mut self`.
pub trait PageStore {
    /// Size of every page in bytes.
    fn page_size(&self) -> usize;

    /// Number of pages, including the reserved meta page.
    fn page_count(&self) -> u64;

    /// Returns the contents of page `id`.
    fn page(&mut self, id: PageId) -> StorageResult<&[u8]>;

    /// Returns page `id` for writing. The page is considered modified.
    fn page_mut(&mut self, id: PageId) -> StorageResult<&mut [u8]>;

    /// Appends a new page and returns its id.
    ///
    /// `page` must be exactly [`page_size`](Self::page_size) bytes long.
    fn append(&mut self, page: Vec<u8>) -> StorageResult<PageId>;
}
