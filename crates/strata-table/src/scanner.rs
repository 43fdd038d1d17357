//! Range scans over a table.

use std::sync::Arc;

use strata_storage::{Cmp, KvIter};
use tracing::warn;

use crate::codec::{decode_key, decode_values};
use crate::error::{CodecError, DbError, DbResult};
use crate::record::Record;
use crate::schema::TableDef;

/// Bounds of a range scan.
///
/// `cmp1`/`key1` position the start of the scan and `cmp2`/`key2` bound
/// its end. The comparators must point toward each other: an ascending
/// start (`Ge`, `Gt`) pairs with a descending end (`Le`, `Lt`) and vice
/// versa. Both keys must set exactly the primary-key columns.
///
/// # Example
///
/// ```rust
/// use strata_table::{Cmp, Record, ScanRange};
///
/// // 2 <= id <= 5, ascending.
/// let range = ScanRange::new(
///     Cmp::Ge,
///     Record::new().add_int64("id", 2),
///     Cmp::Le,
///     Record::new().add_int64("id", 5),
/// );
/// assert!(range.is_valid());
/// ```
#[derive(Debug, Clone)]
pub struct ScanRange {
    /// Start comparator.
    pub cmp1: Cmp,
    /// End comparator.
    pub cmp2: Cmp,
    /// Start key.
    pub key1: Record,
    /// End key.
    pub key2: Record,
}

impl ScanRange {
    /// Creates a range.
    pub fn new(cmp1: Cmp, key1: Record, cmp2: Cmp, key2: Record) -> Self {
        Self {
            cmp1,
            cmp2,
            key1,
            key2,
        }
    }

    /// Range matching exactly one key.
    pub fn point(key: Record) -> Self {
        Self::new(Cmp::Ge, key.clone(), Cmp::Le, key)
    }

    /// Returns true if the comparators point toward each other.
    pub fn is_valid(&self) -> bool {
        self.cmp1.is_ascending() != self.cmp2.is_ascending()
    }
}

/// A live cursor over a key range of one table.
///
/// Created by [`Db::scan`](crate::Db::scan). The cursor borrows the store,
/// so the table cannot be modified while it is alive. Decode failures
/// poison the database handle that created the scanner.
pub struct Scanner<'a, I> {
    def: Arc<TableDef>,
    iter: I,
    forward: bool,
    cmp2: Cmp,
    end: Vec<u8>,
    poison: &'a mut Option<String>,
}

impl<'a, I: KvIter> Scanner<'a, I> {
    pub(crate) fn new(
        def: Arc<TableDef>,
        iter: I,
        cmp1: Cmp,
        cmp2: Cmp,
        end: Vec<u8>,
        poison: &'a mut Option<String>,
    ) -> Self {
        Self {
            def,
            iter,
            forward: cmp1.is_ascending(),
            cmp2,
            end,
            poison,
        }
    }

    /// Schema of the scanned table.
    pub fn table(&self) -> &TableDef {
        &self.def
    }

    /// Returns true while the cursor is on a row inside the range.
    pub fn valid(&self) -> bool {
        match self.iter.deref() {
            Some((key, _)) => self.cmp2.check(key, &self.end),
            None => false,
        }
    }

    /// Moves to the next row in scan direction.
    pub fn next(&mut self) -> DbResult<()> {
        if !self.valid() {
            return Err(DbError::InvalidCursor);
        }
        if self.forward {
            self.iter.next();
        } else {
            self.iter.prev();
        }
        Ok(())
    }

    /// Decodes the current row into `rec`, replacing its contents with all
    /// columns in schema order.
    pub fn deref(&mut self, rec: &mut Record) -> DbResult<()> {
        let decoded = match self.iter.deref() {
            Some((key, val)) if self.cmp2.check(key, &self.end) => decode_row(&self.def, key, val),
            _ => return Err(DbError::InvalidCursor),
        };
        match decoded {
            Ok(vals) => {
                rec.fill(&self.def, vals);
                Ok(())
            }
            Err(e) => {
                warn!(table = %self.def.name, error = %e, "undecodable row, poisoning handle");
                *self.poison = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Reads all remaining rows.
    pub fn collect_rows(mut self) -> DbResult<Vec<Record>> {
        let mut rows = Vec::new();
        while self.valid() {
            let mut rec = Record::new();
            self.deref(&mut rec)?;
            rows.push(rec);
            self.next()?;
        }
        Ok(rows)
    }
}

fn decode_row(def: &TableDef, key: &[u8], val: &[u8]) -> Result<Vec<crate::Value>, CodecError> {
    let mut vals = decode_key(key, def.prefix, &def.types[..def.pkeys])?;
    vals.extend(decode_values(val, &def.types[def.pkeys..])?);
    Ok(vals)
}

impl<I> std::fmt::Debug for Scanner<'_, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("table", &self.def.name)
            .field("forward", &self.forward)
            .field("cmp2", &self.cmp2)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_key, encode_values};
    use crate::value::{Value, ValueType};
    use strata_storage::{KvStore, MemoryKv, UpdateMode};

    fn def() -> Arc<TableDef> {
        let mut def = TableDef::new("t")
            .column("id", ValueType::Int64)
            .column("v", ValueType::Bytes)
            .primary_keys(1);
        def.prefix = 100;
        Arc::new(def)
    }

    fn store(ids: &[i64]) -> MemoryKv {
        let mut kv = MemoryKv::new();
        for &id in ids {
            let key = encode_key(100, &[Value::Int64(id)]);
            let mut val = Vec::new();
            encode_values(&mut val, &[Value::from(format!("v{}", id).as_str())]);
            kv.update(&key, &val, UpdateMode::Upsert).unwrap();
        }
        // A neighbouring table must never leak into the range.
        kv.update(&encode_key(101, &[Value::Int64(0)]), b"\x00", UpdateMode::Upsert)
            .unwrap();
        kv
    }

    fn ids(scanner: Scanner<'_, impl KvIter>) -> Vec<i64> {
        scanner
            .collect_rows()
            .unwrap()
            .iter()
            .map(|r| r.get("id").and_then(Value::as_int64).unwrap())
            .collect()
    }

    fn scan<'a>(
        kv: &'a MemoryKv,
        poison: &'a mut Option<String>,
        cmp1: Cmp,
        k1: i64,
        cmp2: Cmp,
        k2: i64,
    ) -> Scanner<'a, strata_storage::MapIter<'a>> {
        let start = encode_key(100, &[Value::Int64(k1)]);
        let end = encode_key(100, &[Value::Int64(k2)]);
        Scanner::new(def(), kv.seek(&start, cmp1), cmp1, cmp2, end, poison)
    }

    #[test]
    fn test_inclusive_ascending() {
        let kv = store(&[1, 2, 3, 5]);
        let mut poison = None;
        assert_eq!(ids(scan(&kv, &mut poison, Cmp::Ge, 2, Cmp::Le, 5)), vec![2, 3, 5]);
    }

    #[test]
    fn test_exclusive_bounds() {
        let kv = store(&[1, 2, 3, 5]);
        let mut poison = None;
        assert_eq!(ids(scan(&kv, &mut poison, Cmp::Gt, 2, Cmp::Lt, 5)), vec![3]);
    }

    #[test]
    fn test_descending() {
        let kv = store(&[1, 2, 3, 5]);
        let mut poison = None;
        assert_eq!(ids(scan(&kv, &mut poison, Cmp::Le, 5, Cmp::Ge, 2)), vec![5, 3, 2]);
        assert_eq!(ids(scan(&kv, &mut poison, Cmp::Lt, 4, Cmp::Gt, 1)), vec![3, 2]);
    }

    #[test]
    fn test_empty_range() {
        let kv = store(&[1, 2, 3, 5]);
        let mut poison = None;
        assert!(!scan(&kv, &mut poison, Cmp::Ge, 6, Cmp::Le, 9).valid());
        assert!(!scan(&kv, &mut poison, Cmp::Ge, 4, Cmp::Le, 3).valid());
    }

    #[test]
    fn test_invalid_cursor() {
        let kv = store(&[1]);
        let mut poison = None;
        let mut sc = scan(&kv, &mut poison, Cmp::Ge, 2, Cmp::Le, 3);
        assert!(matches!(sc.next(), Err(DbError::InvalidCursor)));
        let mut rec = Record::new();
        assert!(matches!(sc.deref(&mut rec), Err(DbError::InvalidCursor)));
    }

    #[test]
    fn test_deref_fills_schema_order() {
        let kv = store(&[7]);
        let mut poison = None;
        let mut sc = scan(&kv, &mut poison, Cmp::Ge, 7, Cmp::Le, 7);
        let mut rec = Record::new().add_bytes("junk", "x");
        sc.deref(&mut rec).unwrap();
        assert_eq!(rec.columns(), ["id", "v"]);
        assert_eq!(rec.get("v"), Some(&Value::from("v7")));
    }

    #[test]
    fn test_corrupt_row_poisons() {
        let mut kv = MemoryKv::new();
        let key = encode_key(100, &[Value::Int64(1)]);
        kv.update(&key, b"no terminator", UpdateMode::Upsert).unwrap();

        let mut poison = None;
        {
            let mut sc = scan(&kv, &mut poison, Cmp::Ge, 1, Cmp::Le, 1);
            let err = sc.deref(&mut Record::new()).unwrap_err();
            assert!(err.is_fatal());
        }
        assert!(poison.is_some());
    }
}
