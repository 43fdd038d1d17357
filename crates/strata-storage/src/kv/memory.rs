//! In-memory ordered store.

use std::collections::BTreeMap;
use std::ops::Bound;

use strata_common::config::StorageConfig;

use super::{Cmp, KvIter, KvStore, UpdateMode, UpdateOutcome};
use crate::error::{StorageError, StorageResult};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// Ordered store backed by a `BTreeMap`.
///
/// # Example
///
/// ```rust
/// use strata_storage::{Cmp, KvIter, KvStore, MemoryKv, UpdateMode};
///
/// let mut kv = MemoryKv::new();
/// kv.update(b"a", b"1", UpdateMode::Upsert).unwrap();
/// kv.update(b"c", b"3", UpdateMode::Upsert).unwrap();
///
/// let iter = kv.seek(b"b", Cmp::Ge);
/// assert_eq!(iter.deref(), Some((&b"c"[..], &b"3"[..])));
/// ```
#[derive(Debug, Clone)]
pub struct MemoryKv {
    map: Map,
    max_key_size: usize,
    max_value_size: usize,
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKv {
    /// Creates an empty store with default size limits.
    pub fn new() -> Self {
        Self::with_config(&StorageConfig::default())
    }

    /// Creates an empty store with the size limits from `config`.
    pub fn with_config(config: &StorageConfig) -> Self {
        Self {
            map: BTreeMap::new(),
            max_key_size: config.max_key_size,
            max_value_size: config.max_value_size,
        }
    }

    /// Iterates all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.map.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Validates key and value sizes.
    pub fn check_entry(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::EmptyKey);
        }
        if key.len() > self.max_key_size {
            return Err(StorageError::KeyTooLarge {
                size: key.len(),
                max: self.max_key_size,
            });
        }
        if value.len() > self.max_value_size {
            return Err(StorageError::ValueTooLarge {
                size: value.len(),
                max: self.max_value_size,
            });
        }
        Ok(())
    }

    /// Applies a conditional write and returns the previous value when the
    /// stored value changed, so the caller can undo it.
    pub(crate) fn apply(
        &mut self,
        key: &[u8],
        value: &[u8],
        mode: UpdateMode,
    ) -> StorageResult<(UpdateOutcome, Option<Vec<u8>>)> {
        self.check_entry(key, value)?;

        match self.map.get_mut(key) {
            Some(current) => {
                if mode == UpdateMode::InsertOnly || current.as_slice() == value {
                    return Ok((UpdateOutcome::UNCHANGED, None));
                }
                let previous = std::mem::replace(current, value.to_vec());
                Ok((
                    UpdateOutcome {
                        added: false,
                        updated: true,
                    },
                    Some(previous),
                ))
            }
            None => {
                if mode == UpdateMode::UpdateOnly {
                    return Ok((UpdateOutcome::UNCHANGED, None));
                }
                self.map.insert(key.to_vec(), value.to_vec());
                Ok((
                    UpdateOutcome {
                        added: true,
                        updated: true,
                    },
                    None,
                ))
            }
        }
    }

    /// Removes `key`, returning its value.
    pub(crate) fn remove(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.map.remove(key)
    }

    /// Puts `key` back to `previous`, or removes it if it did not exist.
    pub(crate) fn restore(&mut self, key: &[u8], previous: Option<Vec<u8>>) {
        match previous {
            Some(value) => {
                self.map.insert(key.to_vec(), value);
            }
            None => {
                self.map.remove(key);
            }
        }
    }

    /// Inserts an entry without checks. Used when loading a snapshot.
    pub(crate) fn insert_loaded(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.map.insert(key, value);
    }
}

impl KvStore for MemoryKv {
    type Iter<'a> = MapIter<'a>;

    fn update(
        &mut self,
        key: &[u8],
        value: &[u8],
        mode: UpdateMode,
    ) -> StorageResult<UpdateOutcome> {
        self.apply(key, value, mode).map(|(outcome, _)| outcome)
    }

    fn delete(&mut self, key: &[u8]) -> StorageResult<bool> {
        Ok(self.remove(key).is_some())
    }

    fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.map.get(key).map(Vec::as_slice)
    }

    fn seek(&self, reference: &[u8], cmp: Cmp) -> MapIter<'_> {
        MapIter::seek(&self.map, reference, cmp)
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

/// Cursor over a [`MemoryKv`].
///
/// Holds the current entry and re-seeks the map on every step.
#[derive(Debug, Clone)]
pub struct MapIter<'a> {
    map: &'a Map,
    current: Option<(&'a [u8], &'a [u8])>,
}

impl<'a> MapIter<'a> {
    fn seek(map: &'a Map, reference: &[u8], cmp: Cmp) -> Self {
        let entry = match cmp {
            Cmp::Ge => map
                .range::<[u8], _>((Bound::Included(reference), Bound::Unbounded))
                .next(),
            Cmp::Gt => map
                .range::<[u8], _>((Bound::Excluded(reference), Bound::Unbounded))
                .next(),
            Cmp::Le => map
                .range::<[u8], _>((Bound::Unbounded, Bound::Included(reference)))
                .next_back(),
            Cmp::Lt => map
                .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(reference)))
                .next_back(),
        };
        Self {
            map,
            current: entry.map(|(k, v)| (k.as_slice(), v.as_slice())),
        }
    }
}

impl KvIter for MapIter<'_> {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) {
        if let Some((key, _)) = self.current {
            self.current = self
                .map
                .range::<[u8], _>((Bound::Excluded(key), Bound::Unbounded))
                .next()
                .map(|(k, v)| (k.as_slice(), v.as_slice()));
        }
    }

    fn prev(&mut self) {
        if let Some((key, _)) = self.current {
            self.current = self
                .map
                .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(key)))
                .next_back()
                .map(|(k, v)| (k.as_slice(), v.as_slice()));
        }
    }

    fn deref(&self) -> Option<(&[u8], &[u8])> {
        self.current
    }
}
