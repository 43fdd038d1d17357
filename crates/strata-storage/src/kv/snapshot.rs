//! Snapshot page chain.
//!
//! The committed contents of a [`PagedKv`](super::PagedKv) are serialized as
//! one entry stream and split across a chain of pages:
//!
//! ```text
//! ┌───────────┬───────────┬─────────────────────────────┐
//! │ next (8)  │ used (4)  │ payload (used bytes)        │
//! └───────────┴───────────┴─────────────────────────────┘
//!
//! stream: [klen u32][key][vlen u32][value] ... in key order
//! ```

use bytes::{Buf, BufMut};
use strata_common::types::PageId;

use crate::error::{StorageError, StorageResult};
use crate::page::PageStore;

const SNAPSHOT_HEADER: usize = 12;

/// Payload bytes per snapshot page.
pub(crate) fn payload_capacity(page_size: usize) -> usize {
    page_size - SNAPSHOT_HEADER
}

pub(crate) fn encode_entries<'a, I>(entries: I) -> Vec<u8>
where
    I: Iterator<Item = (&'a [u8], &'a [u8])>,
{
    let mut out = Vec::new();
    for (key, value) in entries {
        out.put_u32_le(key.len() as u32);
        out.put_slice(key);
        out.put_u32_le(value.len() as u32);
        out.put_slice(value);
    }
    out
}

pub(crate) fn write_page(page: &mut [u8], next: PageId, chunk: &[u8]) {
    let mut out = &mut page[..SNAPSHOT_HEADER];
    out.put_u64_le(next.as_u64());
    out.put_u32_le(chunk.len() as u32);
    page[SNAPSHOT_HEADER..SNAPSHOT_HEADER + chunk.len()].copy_from_slice(chunk);
}

/// Reads the chain starting at `head` and returns the concatenated payload
/// and the ids of the pages it occupies.
pub(crate) fn read_chain<P>(pages: &mut P, head: PageId) -> StorageResult<(Vec<u8>, Vec<PageId>)>
where
    P: PageStore + ?Sized,
{
    let capacity = payload_capacity(pages.page_size());
    let limit = pages.page_count();
    let mut stream = Vec::new();
    let mut ids = Vec::new();
    let mut current = head;

    while !current.is_null() {
        if ids.len() as u64 >= limit {
            return Err(StorageError::corruption("snapshot chain has a cycle"));
        }
        let page = pages.page(current)?;
        let mut header = &page[..SNAPSHOT_HEADER];
        let next = PageId::new(header.get_u64_le());
        let used = header.get_u32_le() as usize;
        if used > capacity {
            return Err(StorageError::corruption(format!(
                "snapshot page {} claims {} payload bytes",
                current, used
            )));
        }
        stream.extend_from_slice(&page[SNAPSHOT_HEADER..SNAPSHOT_HEADER + used]);
        ids.push(current);
        current = next;
    }
    Ok((stream, ids))
}

/// Decodes an entry stream, checking key order and the expected count.
pub(crate) fn decode_entries(stream: &[u8], expected: u64) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut input = stream;
    let mut entries: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();

    while input.has_remaining() {
        let key = read_field(&mut input, "key")?;
        let value = read_field(&mut input, "value")?;
        if let Some((last, _)) = entries.last() {
            if key <= *last {
                return Err(StorageError::corruption("snapshot keys out of order"));
            }
        }
        entries.push((key, value));
    }

    if entries.len() as u64 != expected {
        return Err(StorageError::corruption(format!(
            "snapshot holds {} entries, meta page says {}",
            entries.len(),
            expected
        )));
    }
    Ok(entries)
}

fn read_field(input: &mut &[u8], what: &str) -> StorageResult<Vec<u8>> {
    if input.remaining() < 4 {
        return Err(StorageError::corruption(format!("truncated {} length", what)));
    }
    let len = input.get_u32_le() as usize;
    if input.remaining() < len {
        return Err(StorageError::corruption(format!("truncated {}", what)));
    }
    let field = input[..len].to_vec();
    input.advance(len);
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::MemoryPageStore;

    #[test]
    fn test_stream_layout() {
        let entries: Vec<(&[u8], &[u8])> = vec![(&b"a"[..], &b"xy"[..])];
        let stream = encode_entries(entries.into_iter());
        assert_eq!(stream, vec![1, 0, 0, 0, b'a', 2, 0, 0, 0, b'x', b'y']);
    }

    #[test]
    fn test_chain_across_pages() {
        let mut pages = MemoryPageStore::new(128);
        let owned: Vec<(Vec<u8>, Vec<u8>)> = (0u8..20)
            .map(|i| (vec![b'k', i], vec![i; 10]))
            .collect();
        let stream = encode_entries(owned.iter().map(|(k, v)| (k.as_slice(), v.as_slice())));

        let chunks: Vec<&[u8]> = stream.chunks(payload_capacity(128)).collect();
        assert!(chunks.len() > 1);
        let ids: Vec<PageId> = chunks
            .iter()
            .map(|_| pages.append(vec![0u8; 128]).unwrap())
            .collect();
        for (i, chunk) in chunks.iter().enumerate() {
            let next = ids.get(i + 1).copied().unwrap_or(PageId::NULL);
            write_page(pages.page_mut(ids[i]).unwrap(), next, chunk);
        }

        let (read, chain) = read_chain(&mut pages, ids[0]).unwrap();
        assert_eq!(chain, ids);
        assert_eq!(read, stream);
        assert_eq!(decode_entries(&read, 20).unwrap(), owned);
    }

    #[test]
    fn test_cycle_detected() {
        let mut pages = MemoryPageStore::new(128);
        let a = pages.append(vec![0u8; 128]).unwrap();
        let b = pages.append(vec![0u8; 128]).unwrap();
        write_page(pages.page_mut(a).unwrap(), b, &[]);
        write_page(pages.page_mut(b).unwrap(), a, &[]);

        assert!(read_chain(&mut pages, a).unwrap_err().is_corruption());
    }

    #[test]
    fn test_decode_rejects_bad_streams() {
        assert!(decode_entries(&[1, 0, 0], 1).unwrap_err().is_corruption());
        assert!(decode_entries(&[5, 0, 0, 0, b'a'], 1)
            .unwrap_err()
            .is_corruption());

        let entries: Vec<(&[u8], &[u8])> = vec![(&b"b"[..], &b""[..]), (&b"a"[..], &b""[..])];
        let stream = encode_entries(entries.into_iter());
        assert!(decode_entries(&stream, 2).unwrap_err().is_corruption());

        let entries: Vec<(&[u8], &[u8])> = vec![(&b"a"[..], &b""[..])];
        let stream = encode_entries(entries.into_iter());
        assert!(decode_entries(&stream, 3).unwrap_err().is_corruption());
    }
}
