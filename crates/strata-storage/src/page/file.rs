//! File-backed page store.
//!
//! Pages are read on demand into a cache and written back by an explicit
//! flush. Data pages and the meta page are flushed separately so that a
//! commit can make every data page durable before the meta page that
//! references them is overwritten.

use std::collections::{BTreeSet, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use strata_common::types::PageId;
use tracing::trace;

use super::PageStore;
use crate::error::{StorageError, StorageResult};

/// Page store over a single database file.
pub struct PageFile {
    file: File,
    path: PathBuf,
    page_size: usize,
    /// Logical page count, including pages appended since the last flush.
    page_count: u64,
    cache: HashMap<PageId, Box<[u8]>>,
    dirty: BTreeSet<PageId>,
}

impl PageFile {
    /// Creates a new, empty database file, truncating any existing one.
    pub fn create(path: impl AsRef<Path>, page_size: usize) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        Ok(Self {
            file,
            path,
            page_size,
            page_count: 0,
            cache: HashMap::new(),
            dirty: BTreeSet::new(),
        })
    }

    /// Opens an existing database file.
    ///
    /// A trailing partial page (left by an interrupted append) is ignored.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            file,
            path,
            page_size,
            page_count: len / page_size as u64,
            cache: HashMap::new(),
            dirty: BTreeSet::new(),
        })
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of modified pages not yet written.
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Shrinks the logical page count to `count`.
    ///
    /// Pages past the end are forgotten; later appends overwrite them.
    pub fn truncate(&mut self, count: u64) {
        self.page_count = self.page_count.min(count);
        self.cache.retain(|id, _| id.as_u64() < count);
        self.dirty.retain(|id| id.as_u64() < count);
    }

    /// Writes every modified page except the meta page.
    ///
    /// Returns the number of pages written.
    pub fn flush_pages(&mut self) -> StorageResult<usize> {
        let ids: Vec<PageId> = self
            .dirty
            .iter()
            .copied()
            .filter(|id| *id != PageId::META)
            .collect();

        for &id in &ids {
            self.write_page(id)?;
            self.dirty.remove(&id);
        }
        trace!(pages = ids.len(), "flushed data pages");
        Ok(ids.len())
    }

    /// Writes the meta page if it was modified.
    pub fn flush_meta(&mut self) -> StorageResult<()> {
        if self.dirty.remove(&PageId::META) {
            self.write_page(PageId::META)?;
        }
        Ok(())
    }

    /// Flushes file contents to stable storage.
    pub fn sync(&self) -> StorageResult<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Drops every unflushed modification and resets the logical page count
    /// to `committed_count`.
    pub fn discard_uncommitted(&mut self, committed_count: u64) {
        for id in std::mem::take(&mut self.dirty) {
            self.cache.remove(&id);
        }
        self.truncate(committed_count);
    }

    /// Drops clean pages from the cache.
    pub fn evict_clean(&mut self) {
        let dirty = &self.dirty;
        self.cache.retain(|id, _| dirty.contains(id));
    }

    fn check_bounds(&self, id: PageId) -> StorageResult<()> {
        if id.as_u64() < self.page_count {
            Ok(())
        } else {
            Err(StorageError::PageNotFound(id))
        }
    }

    fn load(&mut self, id: PageId) -> StorageResult<()> {
        self.check_bounds(id)?;
        if self.cache.contains_key(&id) {
            return Ok(());
        }

        let mut buf = vec![0u8; self.page_size];
        self.file.seek(SeekFrom::Start(id.offset(self.page_size)))?;
        self.file.read_exact(&mut buf)?;
        self.cache.insert(id, buf.into_boxed_slice());
        Ok(())
    }

    fn write_page(&mut self, id: PageId) -> StorageResult<()> {
        let page = self
            .cache
            .get(&id)
            .ok_or(StorageError::PageNotFound(id))?;
        self.file.seek(SeekFrom::Start(id.offset(self.page_size)))?;
        self.file.write_all(page)?;
        Ok(())
    }
}

impl PageStore for PageFile {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page_count(&self) -> u64 {
        self.page_count
    }

    fn page(&mut self, id: PageId) -> StorageResult<&[u8]> {
        self.load(id)?;
        self.cache
            .get(&id)
            .map(|p| &p[..])
            .ok_or(StorageError::PageNotFound(id))
    }

    fn page_mut(&mut self, id: PageId) -> StorageResult<&mut [u8]> {
        self.load(id)?;
        self.dirty.insert(id);
        self.cache
            .get_mut(&id)
            .map(|p| &mut p[..])
            .ok_or(StorageError::PageNotFound(id))
    }

    fn append(&mut self, page: Vec<u8>) -> StorageResult<PageId> {
        if page.len() != self.page_size {
            return Err(StorageError::InvalidPageSize {
                expected: self.page_size,
                actual: page.len(),
            });
        }
        let id = PageId::new(self.page_count);
        self.page_count += 1;
        self.cache.insert(id, page.into_boxed_slice());
        self.dirty.insert(id);
        Ok(id)
    }
}

impl std::fmt::Debug for PageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFile")
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .field("page_count", &self.page_count)
            .field("cached", &self.cache.len())
            .field("dirty", &self.dirty.len())
            .finish()
    }
}
