//! File-backed ordered store.
//!
//! `PagedKv` keeps its entries in a [`MemoryKv`] index and persists them as
//! a snapshot chain of pages. Each commit writes a fresh snapshot into pages
//! taken from the free list (or appended), returns the previous snapshot's
//! pages to the free list, and then publishes the new state by overwriting
//! the meta page.
//!
//! # Commit order
//!
//! 1. Allocate and fill the new snapshot pages
//! 2. Push the old snapshot pages onto the free-list tail
//! 3. Write every dirty non-meta page and fsync
//! 4. Write the meta page and fsync
//! 5. Advance the free-list watermark
//!
//! Pages freed in step 2 cannot be popped before step 5, so a crash at any
//! point leaves the previous snapshot intact.
//!
//! # Cost
//!
//! Every commit re-encodes and rewrites the whole index, so with
//! `auto_commit` each single-row write costs O(entries). Turn `auto_commit`
//! off and call `flush` to batch writes.

use std::path::{Path, PathBuf};

use serde::Serialize;
use strata_common::config::StorageConfig;
use strata_common::types::PageId;
use tracing::{debug, info, warn};

use super::memory::{MapIter, MemoryKv};
use super::snapshot;
use super::{Cmp, KvStore, UpdateMode, UpdateOutcome};
use crate::error::{StorageError, StorageResult};
use crate::freelist::FreeList;
use crate::page::{probe_page_size, MetaPage, PageFile, PageStore, META_SIZE};

/// Ordered store persisted in a single database file.
///
/// # Example
///
/// ```rust,no_run
/// use strata_common::config::StorageConfig;
/// use strata_storage::{KvStore, PagedKv, UpdateMode};
///
/// let mut kv = PagedKv::open("data.db", &StorageConfig::default()).unwrap();
/// kv.update(b"key", b"value", UpdateMode::Upsert).unwrap();
/// kv.close().unwrap();
/// ```
pub struct PagedKv {
    config: StorageConfig,
    pages: PageFile,
    index: MemoryKv,
    free_list: FreeList,
    /// Pages of the committed snapshot.
    snapshot: Vec<PageId>,
    /// Page count recorded by the last commit.
    committed_pages: u64,
    /// Index holds changes not yet committed.
    dirty: bool,
}

/// Storage statistics.
#[derive(Debug, Clone, Serialize)]
pub struct KvStats {
    /// Database file.
    pub path: PathBuf,
    /// Page size in bytes.
    pub page_size: usize,
    /// Pages in the file, including the meta page.
    pub page_count: u64,
    /// Pages used by the committed snapshot.
    pub snapshot_pages: usize,
    /// Number of entries.
    pub entries: usize,
    /// Items in the free list.
    pub free_pages: u64,
    /// Free-list items available to the next commit.
    pub reusable_pages: u64,
    /// Free-list head node.
    pub free_list_head: PageId,
    /// Free-list tail node.
    pub free_list_tail: PageId,
}

impl PagedKv {
    /// Opens the database file at `path`, creating it if it does not exist
    /// and `config.create_if_missing` is set.
    ///
    /// For an existing file the stored page size wins over `config.page_size`.
    pub fn open(path: impl AsRef<Path>, config: &StorageConfig) -> StorageResult<Self> {
        config.validate().map_err(StorageError::InvalidConfig)?;
        let path = path.as_ref();

        let exists = match std::fs::metadata(path) {
            Ok(meta) => meta.len() > 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        if exists {
            Self::load(path, config.clone())
        } else if config.create_if_missing {
            Self::create(path, config.clone())
        } else {
            Err(StorageError::NotFound(path.to_path_buf()))
        }
    }

    fn create(path: &Path, config: StorageConfig) -> StorageResult<Self> {
        let page_size = config.page_size;
        let mut pages = PageFile::create(path, page_size)?;
        pages.append(vec![0u8; page_size])?;
        let node = pages.append(vec![0u8; page_size])?;

        let mut kv = Self {
            index: MemoryKv::with_config(&config),
            free_list: FreeList::new(node, page_size),
            config,
            pages,
            snapshot: Vec::new(),
            committed_pages: 0,
            dirty: false,
        };
        kv.persist(PageId::NULL)?;
        info!(path = %path.display(), page_size, "created database file");
        Ok(kv)
    }

    fn load(path: &Path, mut config: StorageConfig) -> StorageResult<Self> {
        let page_size = probe_page_size(path)?;
        if page_size != config.page_size {
            debug!(
                configured = config.page_size,
                stored = page_size,
                "using stored page size"
            );
            config.page_size = page_size;
        }

        let mut pages = PageFile::open(path, page_size)?;
        if pages.page_count() == 0 {
            return Err(StorageError::corruption("meta page is truncated"));
        }
        let meta = MetaPage::decode(pages.page(PageId::META)?)?;
        if meta.page_size as usize != page_size {
            return Err(StorageError::corruption("page size changed while reading"));
        }
        if meta.page_count > pages.page_count() {
            return Err(StorageError::corruption(format!(
                "meta page covers {} pages, file has {}",
                meta.page_count,
                pages.page_count()
            )));
        }
        // Pages appended by an interrupted commit are unreferenced.
        pages.truncate(meta.page_count);

        let (stream, snapshot) = snapshot::read_chain(&mut pages, meta.data_head)?;
        let mut index = MemoryKv::with_config(&config);
        for (key, value) in snapshot::decode_entries(&stream, meta.entry_count)? {
            index.insert_loaded(key, value);
        }
        pages.evict_clean();

        let free_list = FreeList::restore(meta.free_list, page_size);
        info!(
            path = %path.display(),
            entries = meta.entry_count,
            pages = meta.page_count,
            free = free_list.len(),
            "opened database file"
        );

        Ok(Self {
            config,
            pages,
            index,
            free_list,
            snapshot,
            committed_pages: meta.page_count,
            dirty: false,
        })
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        self.pages.path()
    }

    /// Returns the effective configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns true if there are uncommitted changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns storage statistics.
    pub fn stats(&self) -> KvStats {
        let state = self.free_list.state();
        KvStats {
            path: self.path().to_path_buf(),
            page_size: self.pages.page_size(),
            page_count: self.pages.page_count(),
            snapshot_pages: self.snapshot.len(),
            entries: self.index.len(),
            free_pages: self.free_list.len(),
            reusable_pages: self.free_list.reusable(),
            free_list_head: state.head_page,
            free_list_tail: state.tail_page,
        }
    }

    /// Writes the current contents as a new snapshot and publishes it.
    ///
    /// On failure all in-memory page state is rolled back to the last
    /// commit; the index keeps the uncommitted changes.
    pub fn commit(&mut self) -> StorageResult<()> {
        let saved = self.free_list.clone();
        match self.write_snapshot() {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "commit failed, discarding uncommitted pages");
                self.free_list = saved;
                self.pages.discard_uncommitted(self.committed_pages);
                Err(e)
            }
        }
    }

    /// Commits pending changes and closes the file.
    pub fn close(mut self) -> StorageResult<()> {
        self.flush()?;
        debug!(path = %self.path().display(), "closed database file");
        Ok(())
    }

    fn write_snapshot(&mut self) -> StorageResult<()> {
        let stream = snapshot::encode_entries(self.index.iter());
        let chunks: Vec<&[u8]> = stream
            .chunks(snapshot::payload_capacity(self.pages.page_size()))
            .collect();

        let mut new_pages = Vec::with_capacity(chunks.len());
        for _ in &chunks {
            new_pages.push(self.alloc_page()?);
        }
        for (i, chunk) in chunks.iter().enumerate() {
            let next = new_pages.get(i + 1).copied().unwrap_or(PageId::NULL);
            snapshot::write_page(self.pages.page_mut(new_pages[i])?, next, chunk);
        }

        for &old in &self.snapshot {
            self.free_list.push_tail(&mut self.pages, old)?;
        }

        let head = new_pages.first().copied().unwrap_or(PageId::NULL);
        self.persist(head)?;
        debug!(
            entries = self.index.len(),
            pages = new_pages.len(),
            freed = self.snapshot.len(),
            "committed snapshot"
        );
        self.snapshot = new_pages;
        Ok(())
    }

    fn alloc_page(&mut self) -> StorageResult<PageId> {
        match self.free_list.pop_head(&mut self.pages)? {
            Some(id) => {
                self.pages.page_mut(id)?.fill(0);
                Ok(id)
            }
            None => self.pages.append(vec![0u8; self.pages.page_size()]),
        }
    }

    /// Flushes data pages, then the meta page, then advances the watermark.
    fn persist(&mut self, data_head: PageId) -> StorageResult<()> {
        let meta = MetaPage {
            page_size: self.pages.page_size() as u32,
            page_count: self.pages.page_count(),
            data_head,
            entry_count: self.index.len() as u64,
            free_list: self.free_list.state(),
        };

        self.pages.flush_pages()?;
        if self.config.sync_on_commit {
            self.pages.sync()?;
        }

        meta.encode(&mut self.pages.page_mut(PageId::META)?[..META_SIZE]);
        self.pages.flush_meta()?;
        if self.config.sync_on_commit {
            self.pages.sync()?;
        }

        self.committed_pages = meta.page_count;
        self.free_list.set_max_seq();
        self.pages.evict_clean();
        Ok(())
    }

    fn after_write(&mut self, key: &[u8], previous: Option<Vec<u8>>) -> StorageResult<()> {
        self.dirty = true;
        if !self.config.auto_commit {
            return Ok(());
        }
        if let Err(e) = self.commit() {
            self.index.restore(key, previous);
            self.dirty = false;
            return Err(e);
        }
        Ok(())
    }
}

impl KvStore for PagedKv {
    type Iter<'a> = MapIter<'a>;

    fn update(
        &mut self,
        key: &[u8],
        value: &[u8],
        mode: UpdateMode,
    ) -> StorageResult<UpdateOutcome> {
        let (outcome, previous) = self.index.apply(key, value, mode)?;
        if outcome.updated {
            self.after_write(key, previous)?;
        }
        Ok(outcome)
    }

    fn delete(&mut self, key: &[u8]) -> StorageResult<bool> {
        match self.index.remove(key) {
            Some(previous) => {
                self.after_write(key, Some(previous))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.index.get(key)
    }

    fn seek(&self, reference: &[u8], cmp: Cmp) -> MapIter<'_> {
        self.index.seek(reference, cmp)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.dirty {
            self.commit()?;
        }
        Ok(())
    }
}

impl Drop for PagedKv {
    fn drop(&mut self) {
        if self.dirty {
            warn!(
                path = %self.path().display(),
                "database dropped with uncommitted changes"
            );
        }
    }
}

impl std::fmt::Debug for PagedKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedKv")
            .field("path", &self.path())
            .field("entries", &self.index.len())
            .field("snapshot_pages", &self.snapshot.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}
