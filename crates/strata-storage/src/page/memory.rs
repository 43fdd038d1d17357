//! In-memory page store.

use strata_common::types::PageId;

use super::PageStore;
use crate::error::{StorageError, StorageResult};

/// Page store backed by a vector of page buffers.
///
/// Page 0 is allocated up front so that appended pages start at id 1, the
/// same as in a file whose first page holds the meta page.
#[derive(Debug, Clone)]
pub struct MemoryPageStore {
    page_size: usize,
    pages: Vec<Box<[u8]>>,
}

impl MemoryPageStore {
    /// Creates a store with only the reserved page 0.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            pages: vec![vec![0u8; page_size].into_boxed_slice()],
        }
    }

    fn slot(&self, id: PageId) -> StorageResult<usize> {
        let idx = id.as_u64() as usize;
        if idx < self.pages.len() {
            Ok(idx)
        } else {
            Err(StorageError::PageNotFound(id))
        }
    }
}

impl PageStore for MemoryPageStore {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page_count(&self) -> u64 {
        self.pages.len() as u64
    }

    fn page(&mut self, id: PageId) -> StorageResult<&[u8]> {
        let idx = self.slot(id)?;
        Ok(&self.pages[idx])
    }

    fn page_mut(&mut self, id: PageId) -> StorageResult<&mut [u8]> {
        let idx = self.slot(id)?;
        Ok(&mut self.pages[idx])
    }

    fn append(&mut self, page: Vec<u8>) -> StorageResult<PageId> {
        if page.len() != self.page_size {
            return Err(StorageError::InvalidPageSize {
                expected: self.page_size,
                actual: page.len(),
            });
        }
        let id = PageId::new(self.pages.len() as u64);
        self.pages.push(page.into_boxed_slice());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_starts_after_meta() {
        let mut store = MemoryPageStore::new(128);
        assert_eq!(store.page_count(), 1);

        let id = store.append(vec![0u8; 128]).unwrap();
        assert_eq!(id, PageId::new(1));
        assert_eq!(store.page_count(), 2);
    }

    #[test]
    fn test_read_write() {
        let mut store = MemoryPageStore::new(128);
        let id = store.append(vec![0u8; 128]).unwrap();

        store.page_mut(id).unwrap()[..3].copy_from_slice(b"abc");
        assert_eq!(&store.page(id).unwrap()[..3], b"abc");
    }

    #[test]
    fn test_missing_page() {
        let mut store = MemoryPageStore::new(128);
        assert!(matches!(
            store.page(PageId::new(5)),
            Err(StorageError::PageNotFound(_))
        ));
    }

    #[test]
    fn test_wrong_size_rejected() {
        let mut store = MemoryPageStore::new(128);
        assert!(matches!(
            store.append(vec![0u8; 64]),
            Err(StorageError::InvalidPageSize {
                expected: 128,
                actual: 64
            })
        ));
    }
}
