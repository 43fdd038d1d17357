//! Benchmark utilities and helpers.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use strata_table::{Record, TableDef, Value, ValueType};

/// Generates random string data for benchmarks.
pub fn random_string(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generates a batch of random key-value pairs.
pub fn generate_kv_pairs(
    count: usize,
    key_size: usize,
    value_size: usize,
) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| {
            let key: Vec<u8> = (0..key_size).map(|_| rng.gen()).collect();
            let value: Vec<u8> = (0..value_size).map(|_| rng.gen()).collect();
            (key, value)
        })
        .collect()
}

/// Generates mixed rows of values, including bytes that need escaping.
pub fn generate_values(count: usize) -> Vec<Vec<Value>> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| {
            let raw: Vec<u8> = (0..24).map(|_| rng.gen_range(0..4u8)).collect();
            vec![
                Value::Int64(rng.gen()),
                Value::Bytes(raw),
                Value::from(random_string(&mut rng, 16).as_str()),
            ]
        })
        .collect()
}

/// Schema used by the table benchmarks.
pub fn users_table() -> TableDef {
    TableDef::new("users")
        .column("id", ValueType::Int64)
        .column("name", ValueType::Bytes)
        .column("age", ValueType::Int64)
        .primary_keys(1)
}

/// Generates random user records with ids `1..=count` in random order.
pub fn generate_user_records(count: usize) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(42);
    let names = [
        "Alice", "Bob", "Charlie", "Diana", "Eve", "Frank", "Grace", "Henry",
    ];

    let mut ids: Vec<i64> = (1..=count as i64).collect();
    ids.shuffle(&mut rng);

    ids.into_iter()
        .map(|id| {
            let name = format!("{}_{}", names[rng.gen_range(0..names.len())], rng.gen_range(0..10000u32));
            Record::new()
                .add_int64("id", id)
                .add_bytes("name", name)
                .add_int64("age", rng.gen_range(18..80))
        })
        .collect()
}
