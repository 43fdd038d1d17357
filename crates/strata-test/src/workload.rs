//! Seeded random workloads checked against an in-memory model.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata_storage::KvStore;
use strata_table::{Db, DbResult, Record, Value};

use crate::utils::{user, user_key};

/// One mutation of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Insert-only write.
    Insert(i64, String, i64),
    /// Update-only write.
    Update(i64, String, i64),
    /// Insert or replace.
    Upsert(i64, String, i64),
    /// Delete by key.
    Delete(i64),
}

impl Op {
    /// Applies the operation to `db` and returns the reported result.
    pub fn apply<K: KvStore>(&self, db: &mut Db<K>) -> DbResult<bool> {
        match self {
            Op::Insert(id, name, age) => db.insert("users", &user(*id, name, *age)),
            Op::Update(id, name, age) => db.update("users", &user(*id, name, *age)),
            Op::Upsert(id, name, age) => db.upsert("users", &user(*id, name, *age)),
            Op::Delete(id) => db.delete("users", &user_key(*id)),
        }
    }
}

/// Generates operations over a small key space so that every mode hits
/// both present and absent keys.
pub struct Workload {
    rng: StdRng,
    key_space: i64,
}

impl Workload {
    /// Creates a generator.
    pub fn new(seed: u64, key_space: i64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            key_space: key_space.max(1),
        }
    }

    /// Produces the next operation.
    pub fn next_op(&mut self) -> Op {
        let id = self.rng.gen_range(0..self.key_space);
        // Few distinct names so identical rewrites happen too.
        let name = format!("user{}", self.rng.gen_range(0..3));
        let age = self.rng.gen_range(0..3);
        match self.rng.gen_range(0..4) {
            0 => Op::Insert(id, name, age),
            1 => Op::Update(id, name, age),
            2 => Op::Upsert(id, name, age),
            _ => Op::Delete(id),
        }
    }
}

/// Reference model of the `users` table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Model {
    rows: BTreeMap<i64, (String, i64)>,
}

impl Model {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `op` and returns what the database must report.
    pub fn apply(&mut self, op: &Op) -> bool {
        match op {
            Op::Insert(id, name, age) => {
                if self.rows.contains_key(id) {
                    return false;
                }
                self.rows.insert(*id, (name.clone(), *age));
                true
            }
            Op::Update(id, name, age) => match self.rows.get_mut(id) {
                Some(row) if *row != (name.clone(), *age) => {
                    *row = (name.clone(), *age);
                    true
                }
                _ => false,
            },
            Op::Upsert(id, name, age) => {
                let row = (name.clone(), *age);
                self.rows.insert(*id, row.clone()) != Some(row)
            }
            Op::Delete(id) => self.rows.remove(id).is_some(),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the model has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Expected rows in primary-key order.
    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|(id, (name, age))| user(*id, name, *age))
            .collect()
    }

    /// Expected ids in `[lo, hi]`, ascending.
    pub fn ids_between(&self, lo: i64, hi: i64) -> Vec<i64> {
        self.rows.range(lo..=hi).map(|(id, _)| *id).collect()
    }
}

/// Extracts the `id` column of each row.
pub fn ids(rows: &[Record]) -> Vec<i64> {
    rows.iter()
        .filter_map(|r| r.get("id").and_then(Value::as_int64))
        .collect()
}
