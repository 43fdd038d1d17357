//! Meta page format.
//!
//! Page 0 of every database file holds the meta page. It is the commit
//! point: a commit writes all data pages first and then overwrites the meta
//! page, so a reader always sees either the old or the new state.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ Offset │ Size │ Field                                      │
//! ├────────┼──────┼────────────────────────────────────────────┤
//! │ 0      │ 16   │ Signature                                  │
//! │ 16     │ 4    │ Page size                                  │
//! │ 20     │ 8    │ Page count                                 │
//! │ 28     │ 8    │ Head of the data snapshot chain            │
//! │ 36     │ 8    │ Entry count                                │
//! │ 44     │ 8    │ Free list head page                        │
//! │ 52     │ 8    │ Free list head sequence                    │
//! │ 60     │ 8    │ Free list tail page                        │
//! │ 68     │ 8    │ Free list tail sequence                    │
//! │ 76     │ 4    │ CRC32 of bytes 0..76                       │
//! └────────┴──────┴────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use bytes::{Buf, BufMut};
use strata_common::constants::{DB_SIGNATURE, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use strata_common::types::PageId;

use super::checksum::compute_checksum;
use crate::error::{StorageError, StorageResult};
use crate::freelist::FreeListState;

/// Encoded size of the meta page, including the checksum.
pub const META_SIZE: usize = 80;

const CHECKSUM_OFFSET: usize = META_SIZE - 4;

/// Decoded contents of the meta page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaPage {
    /// Page size the file was created with.
    pub page_size: u32,
    /// Number of pages covered by this commit.
    pub page_count: u64,
    /// First page of the data snapshot, or NULL when the store is empty.
    pub data_head: PageId,
    /// Number of key-value entries in the snapshot.
    pub entry_count: u64,
    /// Persistent free-list controller state.
    pub free_list: FreeListState,
}

impl MetaPage {
    /// Serializes the meta page into the start of `buf`.
    pub fn encode(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= META_SIZE);
        {
            let mut out = &mut buf[..CHECKSUM_OFFSET];
            out.put_slice(DB_SIGNATURE);
            out.put_u32_le(self.page_size);
            out.put_u64_le(self.page_count);
            out.put_u64_le(self.data_head.as_u64());
            out.put_u64_le(self.entry_count);
            out.put_u64_le(self.free_list.head_page.as_u64());
            out.put_u64_le(self.free_list.head_seq);
            out.put_u64_le(self.free_list.tail_page.as_u64());
            out.put_u64_le(self.free_list.tail_seq);
        }
        let checksum = compute_checksum(&buf[..CHECKSUM_OFFSET]);
        buf[CHECKSUM_OFFSET..META_SIZE].copy_from_slice(&checksum.to_le_bytes());
    }

    /// Parses and verifies a meta page.
    pub fn decode(buf: &[u8]) -> StorageResult<Self> {
        if buf.len() < META_SIZE {
            return Err(StorageError::corruption("meta page is truncated"));
        }
        if &buf[..DB_SIGNATURE.len()] != DB_SIGNATURE {
            return Err(StorageError::corruption("bad signature"));
        }

        let expected = (&buf[CHECKSUM_OFFSET..META_SIZE]).get_u32_le();
        let actual = compute_checksum(&buf[..CHECKSUM_OFFSET]);
        if expected != actual {
            return Err(StorageError::ChecksumMismatch { expected, actual });
        }

        let mut input = &buf[DB_SIGNATURE.len()..CHECKSUM_OFFSET];
        let meta = Self {
            page_size: input.get_u32_le(),
            page_count: input.get_u64_le(),
            data_head: PageId::new(input.get_u64_le()),
            entry_count: input.get_u64_le(),
            free_list: FreeListState {
                head_page: PageId::new(input.get_u64_le()),
                head_seq: input.get_u64_le(),
                tail_page: PageId::new(input.get_u64_le()),
                tail_seq: input.get_u64_le(),
            },
        };
        meta.check()?;
        Ok(meta)
    }

    fn check(&self) -> StorageResult<()> {
        let fl = &self.free_list;
        if fl.head_seq > fl.tail_seq {
            return Err(StorageError::corruption(format!(
                "free list head sequence {} is past tail sequence {}",
                fl.head_seq, fl.tail_seq
            )));
        }
        for page in [fl.head_page, fl.tail_page] {
            if page.is_null() || page.as_u64() >= self.page_count {
                return Err(StorageError::corruption(format!(
                    "free list node {} is out of bounds",
                    page
                )));
            }
        }
        if self.data_head.as_u64() >= self.page_count {
            return Err(StorageError::corruption(format!(
                "data head {} is out of bounds",
                self.data_head
            )));
        }
        Ok(())
    }
}

/// Reads the page size recorded in the meta page of the file at `path`.
///
/// The page size is needed before the file can be opened as a page store.
pub fn probe_page_size(path: &Path) -> StorageResult<usize> {
    let mut header = [0u8; 20];
    let mut file = File::open(path)?;
    file.read_exact(&mut header).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => StorageError::corruption("file is too short"),
        _ => StorageError::Io(e),
    })?;

    if &header[..DB_SIGNATURE.len()] != DB_SIGNATURE {
        return Err(StorageError::corruption("bad signature"));
    }
    let page_size = (&header[DB_SIGNATURE.len()..]).get_u32_le() as usize;
    if !page_size.is_power_of_two() || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(StorageError::corruption(format!(
            "invalid stored page size {}",
            page_size
        )));
    }
    Ok(page_size)
}
