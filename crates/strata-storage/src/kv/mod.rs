//! Ordered key-value stores.
//!
//! Keys and values are byte strings; keys sort lexicographically. Two
//! stores implement [`KvStore`]:
//! - [`MemoryKv`]: a `BTreeMap`, used for tests and as the index of the
//!   paged store
//! - [`PagedKv`]: a `MemoryKv` persisted to a database file through the
//!   page store and free list

mod memory;
mod paged;
mod snapshot;

pub use memory::{MapIter, MemoryKv};
pub use paged::{KvStats, PagedKv};

use crate::error::StorageResult;

/// Comparison operator for seeks and range bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cmp {
    /// Greater than or equal.
    Ge,
    /// Greater than.
    Gt,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
}

impl Cmp {
    /// Returns true for the operators that start an ascending scan.
    #[inline]
    pub fn is_ascending(self) -> bool {
        matches!(self, Cmp::Ge | Cmp::Gt)
    }

    /// Evaluates `key <op> reference`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use strata_storage::Cmp;
    ///
    /// assert!(Cmp::Ge.check(b"b", b"b"));
    /// assert!(!Cmp::Gt.check(b"b", b"b"));
    /// assert!(Cmp::Lt.check(b"a", b"ab"));
    /// ```
    #[inline]
    pub fn check(self, key: &[u8], reference: &[u8]) -> bool {
        match self {
            Cmp::Ge => key >= reference,
            Cmp::Gt => key > reference,
            Cmp::Lt => key < reference,
            Cmp::Le => key <= reference,
        }
    }
}

/// Conditional write mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpdateMode {
    /// Insert or replace.
    #[default]
    Upsert,
    /// Replace an existing key only.
    UpdateOnly,
    /// Insert a new key only.
    InsertOnly,
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    /// A new key was inserted.
    pub added: bool,
    /// The stored value changed (always true when `added` is).
    pub updated: bool,
}

impl UpdateOutcome {
    /// Nothing was written.
    pub const UNCHANGED: Self = Self {
        added: false,
        updated: false,
    };
}

/// Bidirectional cursor over a [`KvStore`].
pub trait KvIter {
    /// Returns true while the cursor is on an entry.
    fn valid(&self) -> bool;

    /// Moves to the next larger key. Invalidates the cursor past the end.
    fn next(&mut self);

    /// Moves to the next smaller key. Invalidates the cursor past the start.
    fn prev(&mut self);

    /// Returns the current entry, or `None` if the cursor is not valid.
    fn deref(&self) -> Option<(&[u8], &[u8])>;
}

/// Ordered byte-string store.
pub trait KvStore {
    /// Cursor type borrowed from the store.
    type Iter<'a>: KvIter
    where
        Self: 'a;

    /// Writes `value` under `key` according to `mode`.
    ///
    /// Writing the value a key already holds reports no change.
    fn update(&mut self, key: &[u8], value: &[u8], mode: UpdateMode)
        -> StorageResult<UpdateOutcome>;

    /// Removes `key`. Returns true if it existed.
    fn delete(&mut self, key: &[u8]) -> StorageResult<bool>;

    /// Returns the value stored under `key`.
    fn get(&self, key: &[u8]) -> Option<&[u8]>;

    /// Positions a cursor at the first key satisfying `key <cmp> reference`
    /// in the direction the operator implies: the smallest such key for
    /// `Ge`/`Gt`, the largest for `Lt`/`Le`.
    fn seek(&self, reference: &[u8], cmp: Cmp) -> Self::Iter<'_>;

    /// Number of entries.
    fn len(&self) -> usize;

    /// Returns true if the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes all previous writes durable.
    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }
}
