//! Database handle: schema registry, CRUD and scans.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use strata_common::config::DbConfig;
use strata_common::constants::TABLE_PREFIX_MIN;
use strata_storage::{
    Cmp, KvStats, KvStore, MemoryKv, PagedKv, StorageError, UpdateMode, UpdateOutcome,
};
use tracing::{debug, info, warn};

use crate::codec::{encode_key, encode_values, prefix_key};
use crate::error::{DbError, DbResult};
use crate::record::{check_record, get_values, Record};
use crate::scanner::{ScanRange, Scanner};
use crate::schema::{TableDef, META_TABLE, SCHEMA_TABLE};

/// `@meta` key holding the next table prefix (u32, little-endian).
const NEXT_PREFIX_KEY: &[u8] = b"next_prefix";

/// A database handle.
///
/// Owns the key-value store and the schema cache. Any fatal error (a
/// corrupted row, schema or page) poisons the handle: every later call
/// returns [`DbError::Poisoned`].
pub struct Db<K: KvStore = PagedKv> {
    kv: K,
    internal: HashMap<String, Arc<TableDef>>,
    tables: HashMap<String, Arc<TableDef>>,
    poisoned: Option<String>,
}

impl Db<PagedKv> {
    /// Opens (or creates) the database described by `config`.
    pub fn open(config: DbConfig) -> DbResult<Self> {
        config.validate().map_err(StorageError::InvalidConfig)?;
        let kv = PagedKv::open(&config.path, &config.storage)?;
        info!(path = %config.path.display(), "database opened");
        Ok(Self::with_store(kv))
    }

    /// Opens (or creates) the database file at `path` with default settings.
    pub fn open_path(path: impl AsRef<Path>) -> DbResult<Self> {
        Self::open(DbConfig::new(path.as_ref()))
    }

    /// Database file path.
    pub fn path(&self) -> &Path {
        self.kv.path()
    }

    /// Storage statistics.
    pub fn stats(&self) -> KvStats {
        self.kv.stats()
    }
}

impl Db<MemoryKv> {
    /// Creates a database that lives only in memory.
    pub fn memory() -> Self {
        Self::with_store(MemoryKv::new())
    }
}

impl<K: KvStore> Db<K> {
    /// Wraps an existing store.
    pub fn with_store(kv: K) -> Self {
        let internal = [TableDef::meta(), TableDef::schema()]
            .into_iter()
            .map(|def| (def.name.clone(), Arc::new(def)))
            .collect();
        Self {
            kv,
            internal,
            tables: HashMap::new(),
            poisoned: None,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &K {
        &self.kv
    }

    /// Returns true if an earlier fatal error poisoned the handle.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Makes all changes durable.
    pub fn flush(&mut self) -> DbResult<()> {
        self.check_poisoned()?;
        let result = self.kv.flush().map_err(DbError::from);
        self.guard(result)
    }

    /// Flushes and releases the database.
    pub fn close(mut self) -> DbResult<()> {
        self.flush()?;
        debug!("database closed");
        Ok(())
    }

    // =========================================================================
    // Schemas
    // =========================================================================

    /// Creates a table.
    ///
    /// The prefix is assigned here; `def.prefix` must be left at 0. If no
    /// index is declared the primary index is added.
    pub fn table_new(&mut self, def: TableDef) -> DbResult<()> {
        self.check_poisoned()?;
        let result = self.table_new_inner(def);
        self.guard(result)
    }

    /// Returns the schema of `name`.
    pub fn table_def(&mut self, name: &str) -> DbResult<Arc<TableDef>> {
        self.check_poisoned()?;
        let result = self.resolve(name);
        self.guard(result)
    }

    /// Names of all user tables, in name order.
    pub fn tables(&mut self) -> DbResult<Vec<String>> {
        let rows = self.scan_table(SCHEMA_TABLE)?.collect_rows()?;
        rows.iter()
            .map(|row| match row.get("name").and_then(|v| v.as_bytes()) {
                Some(name) => Ok(String::from_utf8_lossy(name).into_owned()),
                None => Err(DbError::corruption("schema row without a name")),
            })
            .collect()
    }

    fn table_new_inner(&mut self, mut def: TableDef) -> DbResult<()> {
        def.validate()?;
        if def.name.starts_with('@') {
            return Err(DbError::TableExists(def.name));
        }
        if def.prefix != 0 {
            return Err(DbError::bad_schema(
                &def.name,
                "prefix is assigned by the database",
            ));
        }
        def.fill_primary_index();
        def.validate()?;

        let schema = self.internal_def(SCHEMA_TABLE)?;
        let mut existing = Record::new().add_bytes("name", def.name.as_bytes());
        if self.get_with(&schema, &mut existing)? {
            return Err(DbError::TableExists(def.name));
        }

        let meta = self.internal_def(META_TABLE)?;
        let mut counter = Record::new().add_bytes("key", NEXT_PREFIX_KEY);
        let previous = if self.get_with(&meta, &mut counter)? {
            let stored = counter
                .get("val")
                .and_then(|v| v.as_bytes())
                .and_then(|b| <[u8; 4]>::try_from(b).ok())
                .map(u32::from_le_bytes)
                .ok_or_else(|| DbError::corruption("malformed next_prefix counter"))?;
            if stored < TABLE_PREFIX_MIN {
                return Err(DbError::corruption(format!(
                    "next_prefix counter {} is below {}",
                    stored, TABLE_PREFIX_MIN
                )));
            }
            Some(stored)
        } else {
            None
        };
        def.prefix = previous.unwrap_or(TABLE_PREFIX_MIN);
        let next = def
            .prefix
            .checked_add(1)
            .ok_or_else(|| DbError::bad_schema(&def.name, "table prefixes exhausted"))?;

        let counter = Record::new()
            .add_bytes("key", NEXT_PREFIX_KEY)
            .add_bytes("val", next.to_le_bytes());
        self.set_with(&meta, &counter, UpdateMode::Upsert)?;

        let inserted = serde_json::to_vec(&def)
            .map_err(|e| DbError::bad_schema(&def.name, e.to_string()))
            .and_then(|json| {
                let row = Record::new()
                    .add_bytes("name", def.name.as_bytes())
                    .add_bytes("def", json);
                self.set_with(&schema, &row, UpdateMode::InsertOnly)
            });
        if let Err(err) = inserted {
            self.restore_prefix_counter(&meta, previous);
            return Err(err);
        }

        debug!(table = %def.name, prefix = def.prefix, "created table");
        self.tables.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    /// Puts `next_prefix` back after a schema row could not be stored.
    fn restore_prefix_counter(&mut self, meta: &TableDef, previous: Option<u32>) {
        let restored = match previous {
            Some(stored) => {
                let counter = Record::new()
                    .add_bytes("key", NEXT_PREFIX_KEY)
                    .add_bytes("val", stored.to_le_bytes());
                self.set_with(meta, &counter, UpdateMode::Upsert).map(|_| ())
            }
            None => {
                let key = Record::new().add_bytes("key", NEXT_PREFIX_KEY);
                check_record(meta, &key, meta.pkeys)
                    .map(|vals| encode_key(meta.prefix, &vals))
                    .and_then(|key| Ok(self.kv.delete(&key).map(|_| ())?))
            }
        };
        if let Err(err) = restored {
            warn!(error = %err, "failed to restore next_prefix counter");
        }
    }

    fn internal_def(&self, name: &str) -> DbResult<Arc<TableDef>> {
        self.internal
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    /// Looks a table up in the internal tables, then the cache, then `@table`.
    fn resolve(&mut self, name: &str) -> DbResult<Arc<TableDef>> {
        if let Some(def) = self.internal.get(name).or_else(|| self.tables.get(name)) {
            return Ok(Arc::clone(def));
        }

        let schema = self.internal_def(SCHEMA_TABLE)?;
        let mut rec = Record::new().add_bytes("name", name.as_bytes());
        if !self.get_with(&schema, &mut rec)? {
            return Err(DbError::TableNotFound(name.to_string()));
        }

        let json = rec
            .get("def")
            .and_then(|v| v.as_bytes())
            .ok_or_else(|| DbError::corruption(format!("schema of {} has no definition", name)))?;
        let def: TableDef = serde_json::from_slice(json)
            .map_err(|e| DbError::corruption(format!("schema of {}: {}", name, e)))?;
        if def.name != name || def.prefix < TABLE_PREFIX_MIN {
            return Err(DbError::corruption(format!("schema of {} is inconsistent", name)));
        }
        def.validate()
            .map_err(|e| DbError::corruption(format!("stored schema rejected: {}", e)))?;

        let def = Arc::new(def);
        self.tables.insert(name.to_string(), Arc::clone(&def));
        Ok(def)
    }

    // =========================================================================
    // Rows
    // =========================================================================

    /// Looks up the row whose primary key is set in `rec`.
    ///
    /// On a hit `rec` is replaced by the full row in schema order.
    pub fn get(&mut self, table: &str, rec: &mut Record) -> DbResult<bool> {
        self.check_poisoned()?;
        let result = self
            .resolve(table)
            .and_then(|def| self.get_with(&def, rec));
        self.guard(result)
    }

    /// Writes a complete row according to `mode`.
    pub fn set(&mut self, table: &str, rec: &Record, mode: UpdateMode) -> DbResult<UpdateOutcome> {
        self.check_poisoned()?;
        let result = self
            .resolve(table)
            .and_then(|def| self.set_with(&def, rec, mode));
        self.guard(result)
    }

    /// Inserts a new row. Returns false if the key already exists.
    pub fn insert(&mut self, table: &str, rec: &Record) -> DbResult<bool> {
        Ok(self.set(table, rec, UpdateMode::InsertOnly)?.updated)
    }

    /// Replaces an existing row. Returns false if the key does not exist or
    /// the row is unchanged.
    pub fn update(&mut self, table: &str, rec: &Record) -> DbResult<bool> {
        Ok(self.set(table, rec, UpdateMode::UpdateOnly)?.updated)
    }

    /// Inserts or replaces a row. Returns false only if the stored row was
    /// already identical.
    pub fn upsert(&mut self, table: &str, rec: &Record) -> DbResult<bool> {
        Ok(self.set(table, rec, UpdateMode::Upsert)?.updated)
    }

    /// Deletes the row whose primary key is set in `rec`; no other column
    /// may be set. Returns false if there was no such row.
    pub fn delete(&mut self, table: &str, rec: &Record) -> DbResult<bool> {
        self.check_poisoned()?;
        let result = self.resolve(table).and_then(|def| {
            let key = encode_key(def.prefix, &check_record(&def, rec, def.pkeys)?);
            Ok(self.kv.delete(&key)?)
        });
        self.guard(result)
    }

    fn get_with(&mut self, def: &Arc<TableDef>, rec: &mut Record) -> DbResult<bool> {
        let key = encode_key(def.prefix, &get_values(def, rec, def.primary_key_columns())?);
        let iter = self.kv.seek(&key, Cmp::Ge);
        let mut scanner = Scanner::new(
            Arc::clone(def),
            iter,
            Cmp::Ge,
            Cmp::Le,
            key,
            &mut self.poisoned,
        );
        if !scanner.valid() {
            return Ok(false);
        }
        scanner.deref(rec)?;
        Ok(true)
    }

    fn set_with(&mut self, def: &TableDef, rec: &Record, mode: UpdateMode) -> DbResult<UpdateOutcome> {
        let vals = check_record(def, rec, def.cols.len())?;
        let key = encode_key(def.prefix, &vals[..def.pkeys]);
        let mut val = Vec::new();
        encode_values(&mut val, &vals[def.pkeys..]);
        Ok(self.kv.update(&key, &val, mode)?)
    }

    // =========================================================================
    // Scans
    // =========================================================================

    /// Starts a range scan.
    ///
    /// Fails with `BadRange` unless the comparators point toward each
    /// other, and with a record error unless both keys set exactly the
    /// primary-key columns.
    pub fn scan(&mut self, table: &str, range: ScanRange) -> DbResult<Scanner<'_, K::Iter<'_>>> {
        self.check_poisoned()?;
        let prepared = self.prepare_scan(table, &range);
        let (def, start, end) = self.guard(prepared)?;
        let iter = self.kv.seek(&start, range.cmp1);
        Ok(Scanner::new(
            def,
            iter,
            range.cmp1,
            range.cmp2,
            end,
            &mut self.poisoned,
        ))
    }

    /// Scans every row of a table in key order.
    pub fn scan_table(&mut self, table: &str) -> DbResult<Scanner<'_, K::Iter<'_>>> {
        self.check_poisoned()?;
        let resolved = self.resolve(table);
        let def = self.guard(resolved)?;
        let start = prefix_key(def.prefix);
        let end = match def.prefix.checked_add(1) {
            Some(next) => prefix_key(next),
            None => vec![0xff; start.len() + 1],
        };
        let iter = self.kv.seek(&start, Cmp::Ge);
        Ok(Scanner::new(
            def,
            iter,
            Cmp::Ge,
            Cmp::Lt,
            end,
            &mut self.poisoned,
        ))
    }

    fn prepare_scan(
        &mut self,
        table: &str,
        range: &ScanRange,
    ) -> DbResult<(Arc<TableDef>, Vec<u8>, Vec<u8>)> {
        if !range.is_valid() {
            return Err(DbError::BadRange {
                cmp1: range.cmp1,
                cmp2: range.cmp2,
            });
        }
        let def = self.resolve(table)?;
        let start = encode_key(def.prefix, &check_record(&def, &range.key1, def.pkeys)?);
        let end = encode_key(def.prefix, &check_record(&def, &range.key2, def.pkeys)?);
        Ok((def, start, end))
    }

    // =========================================================================
    // Poisoning
    // =========================================================================

    fn check_poisoned(&self) -> DbResult<()> {
        match &self.poisoned {
            Some(reason) => Err(DbError::Poisoned(reason.clone())),
            None => Ok(()),
        }
    }

    fn guard<T>(&mut self, result: DbResult<T>) -> DbResult<T> {
        if let Err(e) = &result {
            if e.is_fatal() && self.poisoned.is_none() {
                warn!(error = %e, "fatal error, poisoning database handle");
                self.poisoned = Some(e.to_string());
            }
        }
        result
    }
}

impl<K: KvStore> std::fmt::Debug for Db<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("entries", &self.kv.len())
            .field("cached_tables", &self.tables.len())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}
