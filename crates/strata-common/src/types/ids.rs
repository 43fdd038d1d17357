//! Core identifier types for StrataDB.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::META_PAGE_ID;

/// Page identifier - addresses one fixed-size page in a page store.
///
/// Page 0 holds the meta page and is never a data page, so `PageId::NULL`
/// is used as the "no page" link in on-disk chains.
///
/// # Example
///
/// ```rust
/// use strata_common::types::PageId;
///
/// let page = PageId::new(42);
/// assert_eq!(page.as_u64(), 42);
/// assert!(PageId::NULL.is_null());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PageId(u64);

impl PageId {
    /// The null link (also the meta page).
    pub const NULL: Self = Self(META_PAGE_ID);

    /// The meta page.
    pub const META: Self = Self(META_PAGE_ID);

    /// Creates a new `PageId` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true for the null link.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == META_PAGE_ID
    }

    /// Byte offset of this page in a file of `page_size` pages.
    #[inline]
    #[must_use]
    pub const fn offset(self, page_size: usize) -> u64 {
        self.0 * page_size as u64
    }

    /// Creates a PageId from little-endian bytes.
    #[inline]
    #[must_use]
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }

    /// Converts to little-endian bytes.
    #[inline]
    #[must_use]
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl fmt::Debug for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "PageId(NULL)")
        } else {
            write!(f, "PageId({})", self.0)
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PageId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<PageId> for u64 {
    #[inline]
    fn from(id: PageId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id() {
        let id = PageId::new(42);
        assert_eq!(id.as_u64(), 42);
        assert!(!id.is_null());
        assert!(PageId::NULL.is_null());
        assert_eq!(PageId::META, PageId::NULL);
    }

    #[test]
    fn test_page_id_offset() {
        assert_eq!(PageId::new(0).offset(4096), 0);
        assert_eq!(PageId::new(3).offset(4096), 3 * 4096);
    }

    #[test]
    fn test_page_id_bytes() {
        let id = PageId::new(0x0102_0304_0506_0708);
        assert_eq!(PageId::from_le_bytes(id.to_le_bytes()), id);
        assert_eq!(id.to_le_bytes()[0], 0x08);
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(format!("{}", PageId::new(7)), "7");
        assert_eq!(format!("{:?}", PageId::new(7)), "PageId(7)");
        assert_eq!(format!("{:?}", PageId::NULL), "PageId(NULL)");
    }
}
