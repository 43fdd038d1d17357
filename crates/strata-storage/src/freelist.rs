//! Persistent free list of reclaimable pages.
//!
//! The free list is a FIFO queue of page ids stored in a singly linked chain
//! of node pages. Items are pushed at the tail and popped at the head; a
//! node whose slots have all been consumed is itself recycled by pushing it
//! back onto the tail.
//!
//! ```text
//!   head_page                                     tail_page
//!      │                                              │
//!      ▼                                              ▼
//! ┌──────────┐    ┌──────────┐              ┌──────────┐
//! │ next ────┼──▶ │ next ────┼──▶  ...  ──▶ │ next = 0 │
//! │ ptr ptr  │    │ ptr ptr  │              │ ptr ...  │
//! └──────────┘    └──────────┘              └──────────┘
//!      ▲                                         ▲
//!   head_seq                                  tail_seq
//! ```
//!
//! Sequence numbers grow monotonically; `seq % capacity` is the slot index
//! within the current node. `max_seq` is an in-memory watermark: only items
//! pushed before the last [`FreeList::set_max_seq`] may be popped, so pages
//! freed by the commit in progress are never reused by that same commit.

use bytes::{Buf, BufMut};
use serde::Serialize;
use strata_common::constants::{FREE_LIST_HEADER, FREE_LIST_SLOT_SIZE};
use strata_common::types::PageId;
use tracing::trace;

use crate::error::{StorageError, StorageResult};
use crate::page::PageStore;

/// Persistent part of the free list, stored in the meta page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FreeListState {
    /// Node holding the oldest item.
    pub head_page: PageId,
    /// Sequence number of the oldest item.
    pub head_seq: u64,
    /// Node receiving new items.
    pub tail_page: PageId,
    /// Sequence number the next pushed item will get.
    pub tail_seq: u64,
}

/// Free-list controller.
///
/// The controller does not own the node pages; every operation borrows the
/// page store they live in.
#[derive(Debug, Clone)]
pub struct FreeList {
    head_page: PageId,
    head_seq: u64,
    tail_page: PageId,
    tail_seq: u64,
    max_seq: u64,
    capacity: u64,
}

impl FreeList {
    /// Number of page-id slots in one node of the given page size.
    pub const fn node_capacity(page_size: usize) -> usize {
        (page_size - FREE_LIST_HEADER) / FREE_LIST_SLOT_SIZE
    }

    /// Creates an empty list whose only node is `node`.
    pub fn new(node: PageId, page_size: usize) -> Self {
        Self::restore(
            FreeListState {
                head_page: node,
                head_seq: 0,
                tail_page: node,
                tail_seq: 0,
            },
            page_size,
        )
    }

    /// Rebuilds the controller from persisted state.
    ///
    /// Everything in a persisted list belongs to a finished commit, so the
    /// watermark starts at the tail.
    pub fn restore(state: FreeListState, page_size: usize) -> Self {
        Self {
            head_page: state.head_page,
            head_seq: state.head_seq,
            tail_page: state.tail_page,
            tail_seq: state.tail_seq,
            max_seq: state.tail_seq,
            capacity: Self::node_capacity(page_size) as u64,
        }
    }

    /// Returns the state to persist.
    pub fn state(&self) -> FreeListState {
        FreeListState {
            head_page: self.head_page,
            head_seq: self.head_seq,
            tail_page: self.tail_page,
            tail_seq: self.tail_seq,
        }
    }

    /// Number of items in the list.
    pub fn len(&self) -> u64 {
        self.tail_seq - self.head_seq
    }

    /// Returns true if the list holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of items that can be popped before the watermark.
    pub fn reusable(&self) -> u64 {
        self.max_seq.saturating_sub(self.head_seq)
    }

    /// Current watermark.
    pub fn max_seq(&self) -> u64 {
        self.max_seq
    }

    /// Slots per node.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Makes every item pushed so far available to [`pop_head`](Self::pop_head).
    ///
    /// Called once a commit is durable.
    pub fn set_max_seq(&mut self) {
        self.max_seq = self.tail_seq;
    }

    /// Removes the oldest reusable page id, or returns `None` if the head has
    /// reached the watermark.
    pub fn pop_head<P>(&mut self, pages: &mut P) -> StorageResult<Option<PageId>>
    where
        P: PageStore + ?Sized,
    {
        let (ptr, reclaimed) = self.pop(pages)?;
        if let Some(node) = reclaimed {
            self.push_tail(pages, node)?;
        }
        Ok(ptr)
    }

    /// Appends a page id to the tail.
    ///
    /// When the tail node fills up, the next node is taken from the head of
    /// the list, or appended to the store if nothing is reusable.
    pub fn push_tail<P>(&mut self, pages: &mut P, ptr: PageId) -> StorageResult<()>
    where
        P: PageStore + ?Sized,
    {
        let idx = self.index(self.tail_seq);
        set_ptr(pages.page_mut(self.tail_page)?, idx, ptr);
        self.tail_seq += 1;

        if self.index(self.tail_seq) != 0 {
            return Ok(());
        }

        let (next, reclaimed) = self.pop(pages)?;
        let next = match next {
            Some(id) => id,
            None => pages.append(vec![0u8; pages.page_size()])?,
        };
        set_next(pages.page_mut(self.tail_page)?, next);
        set_next(pages.page_mut(next)?, PageId::NULL);
        trace!(old = %self.tail_page, new = %next, "free list tail rolled over");
        self.tail_page = next;

        if let Some(node) = reclaimed {
            set_ptr(pages.page_mut(self.tail_page)?, 0, node);
            self.tail_seq += 1;
        }
        Ok(())
    }

    /// Pops one item. Also returns the head node if popping emptied it.
    fn pop<P>(&mut self, pages: &mut P) -> StorageResult<(Option<PageId>, Option<PageId>)>
    where
        P: PageStore + ?Sized,
    {
        if self.head_seq == self.max_seq {
            return Ok((None, None));
        }

        let node = pages.page(self.head_page)?;
        let ptr = get_ptr(node, self.index(self.head_seq));
        let next = get_next(node);
        if ptr.is_null() {
            return Err(StorageError::corruption(format!(
                "free list node {} holds a null page at sequence {}",
                self.head_page, self.head_seq
            )));
        }

        let exhausted = self.index(self.head_seq + 1) == 0;
        if exhausted && next.is_null() {
            return Err(StorageError::corruption(format!(
                "free list node {} has no successor",
                self.head_page
            )));
        }

        self.head_seq += 1;
        let reclaimed = if exhausted {
            let old = self.head_page;
            self.head_page = next;
            Some(old)
        } else {
            None
        };
        Ok((Some(ptr), reclaimed))
    }

    fn index(&self, seq: u64) -> usize {
        (seq % self.capacity) as usize
    }
}

fn slot_offset(idx: usize) -> usize {
    FREE_LIST_HEADER + FREE_LIST_SLOT_SIZE * idx
}

fn get_next(node: &[u8]) -> PageId {
    PageId::new((&node[..FREE_LIST_HEADER]).get_u64_le())
}

fn set_next(node: &mut [u8], next: PageId) {
    (&mut node[..FREE_LIST_HEADER]).put_u64_le(next.as_u64());
}

fn get_ptr(node: &[u8], idx: usize) -> PageId {
    let off = slot_offset(idx);
    PageId::new((&node[off..off + FREE_LIST_SLOT_SIZE]).get_u64_le())
}

fn set_ptr(node: &mut [u8], idx: usize, ptr: PageId) {
    let off = slot_offset(idx);
    debug_assert!(off + FREE_LIST_SLOT_SIZE <= node.len());
    (&mut node[off..off + FREE_LIST_SLOT_SIZE]).put_u64_le(ptr.as_u64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::MemoryPageStore;

    /// 16 slots per node.
    const PAGE_SIZE: usize = 136;

    fn setup() -> (MemoryPageStore, FreeList) {
        let mut pages = MemoryPageStore::new(PAGE_SIZE);
        let node = pages.append(vec![0u8; PAGE_SIZE]).unwrap();
        (pages, FreeList::new(node, PAGE_SIZE))
    }

    fn drain(fl: &mut FreeList, pages: &mut MemoryPageStore) -> Vec<u64> {
        let mut out = Vec::new();
        while let Some(id) = fl.pop_head(pages).unwrap() {
            out.push(id.as_u64());
        }
        out
    }

    #[test]
    fn test_capacity() {
        assert_eq!(FreeList::node_capacity(PAGE_SIZE), 16);
        assert_eq!(FreeList::node_capacity(4096), 511);
        let (_, fl) = setup();
        assert_eq!(fl.capacity(), FreeList::node_capacity(PAGE_SIZE));
    }

    #[test]
    fn test_empty_list() {
        let (mut pages, mut fl) = setup();
        assert!(fl.is_empty());
        assert_eq!(fl.pop_head(&mut pages).unwrap(), None);
        fl.set_max_seq();
        assert_eq!(fl.pop_head(&mut pages).unwrap(), None);
    }

    #[test]
    fn test_fifo_across_nodes() {
        let (mut pages, mut fl) = setup();
        for id in 1000..1020 {
            fl.push_tail(&mut pages, PageId::new(id)).unwrap();
        }
        // The tail filled the first node, so one node was appended.
        assert_eq!(pages.page_count(), 3);
        assert_eq!(fl.len(), 20);

        fl.set_max_seq();
        assert_eq!(drain(&mut fl, &mut pages), (1000..1020).collect::<Vec<_>>());
    }

    #[test]
    fn test_watermark() {
        let (mut pages, mut fl) = setup();
        for id in 10..15 {
            fl.push_tail(&mut pages, PageId::new(id)).unwrap();
        }
        fl.set_max_seq();
        for id in 20..23 {
            fl.push_tail(&mut pages, PageId::new(id)).unwrap();
        }

        assert_eq!(fl.reusable(), 5);
        assert_eq!(drain(&mut fl, &mut pages), vec![10, 11, 12, 13, 14]);
        assert_eq!(fl.len(), 3);

        fl.set_max_seq();
        assert_eq!(drain(&mut fl, &mut pages), vec![20, 21, 22]);
        assert!(fl.is_empty());
    }

    #[test]
    fn test_exhausted_head_is_recycled() {
        let (mut pages, mut fl) = setup();
        let first_node = fl.state().head_page;
        for id in 1000..1020 {
            fl.push_tail(&mut pages, PageId::new(id)).unwrap();
        }
        fl.set_max_seq();

        for _ in 0..16 {
            fl.pop_head(&mut pages).unwrap();
        }
        // The first node moved from head to tail as a free item.
        assert_ne!(fl.state().head_page, first_node);
        assert_eq!(fl.len(), 5);

        fl.set_max_seq();
        let rest = drain(&mut fl, &mut pages);
        assert_eq!(rest, vec![1016, 1017, 1018, 1019, first_node.as_u64()]);
    }

    #[test]
    fn test_steady_state_reuses_nodes() {
        let (mut pages, mut fl) = setup();
        let mut data = Vec::new();
        for _ in 0..40 {
            data.push(pages.append(vec![0u8; PAGE_SIZE]).unwrap());
        }
        for &id in &data {
            fl.push_tail(&mut pages, id).unwrap();
        }
        fl.set_max_seq();
        let page_count = pages.page_count();

        for _ in 0..200 {
            let id = fl.pop_head(&mut pages).unwrap().unwrap();
            assert!(id.as_u64() < page_count);
            fl.push_tail(&mut pages, id).unwrap();
            fl.set_max_seq();
        }
        assert_eq!(pages.page_count(), page_count);
    }

    #[test]
    fn test_restore() {
        let (mut pages, mut fl) = setup();
        for id in 50..53 {
            fl.push_tail(&mut pages, PageId::new(id)).unwrap();
        }
        // Not yet reusable in this session.
        assert_eq!(fl.reusable(), 0);

        let mut restored = FreeList::restore(fl.state(), PAGE_SIZE);
        assert_eq!(restored.reusable(), 3);
        assert_eq!(drain(&mut restored, &mut pages), vec![50, 51, 52]);
    }

    #[test]
    fn test_missing_successor_is_corruption() {
        let (mut pages, mut fl) = setup();
        let first_node = fl.state().head_page;
        for id in 1000..1016 {
            fl.push_tail(&mut pages, PageId::new(id)).unwrap();
        }
        fl.set_max_seq();
        pages.page_mut(first_node).unwrap()[..8].fill(0);

        for _ in 0..15 {
            fl.pop_head(&mut pages).unwrap();
        }
        let err = fl.pop_head(&mut pages).unwrap_err();
        assert!(err.is_corruption());
    }
}
