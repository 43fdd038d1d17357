//! End-to-end integration tests for StrataDB.
//!
//! These tests drive `Db` over real database files and check persistence,
//! page recycling, scan semantics and corruption handling.

use strata_common::config::StorageConfig;
use strata_storage::{KvStore, PagedKv, UpdateMode};
use strata_table::codec::encode_key;
use strata_table::{
    Cmp, DbError, ErrorCategory, Record, ScanRange, TableDef, Value, ValueType,
};
use strata_test::utils::{init_logging, user, user_key, users_table, TempDb};
use strata_test::workload::{ids, Model, Workload};

fn range(cmp1: Cmp, lo: i64, cmp2: Cmp, hi: i64) -> ScanRange {
    ScanRange::new(cmp1, user_key(lo), cmp2, user_key(hi))
}

#[test]
fn test_rows_survive_reopen() {
    init_logging();
    let tmp = TempDb::new().unwrap();

    {
        let mut db = tmp.open().unwrap();
        db.table_new(users_table()).unwrap();
        for id in 1..=50 {
            assert!(db.insert("users", &user(id, &format!("u{}", id), id % 7)).unwrap());
        }
        db.close().unwrap();
    }

    let mut db = tmp.open().unwrap();
    assert_eq!(db.tables().unwrap(), vec!["users"]);
    let rows = db.scan_table("users").unwrap().collect_rows().unwrap();
    assert_eq!(ids(&rows), (1..=50).collect::<Vec<_>>());

    let mut rec = user_key(42);
    assert!(db.get("users", &mut rec).unwrap());
    assert_eq!(rec, user(42, "u42", 0));
}

#[test]
fn test_workload_matches_model() {
    let tmp = TempDb::new().unwrap();
    let mut db = tmp.open().unwrap();
    db.table_new(users_table()).unwrap();

    let mut workload = Workload::new(42, 40);
    let mut model = Model::new();
    for step in 0..600 {
        let op = workload.next_op();
        let expected = model.apply(&op);
        assert_eq!(op.apply(&mut db).unwrap(), expected, "step {}: {:?}", step, op);
    }

    let rows = db.scan_table("users").unwrap().collect_rows().unwrap();
    assert_eq!(rows, model.records());
    db.close().unwrap();

    let mut db = tmp.open().unwrap();
    let rows = db.scan_table("users").unwrap().collect_rows().unwrap();
    assert_eq!(rows, model.records());
    assert_eq!(
        ids(&db.scan("users", range(Cmp::Ge, 10, Cmp::Le, 20)).unwrap().collect_rows().unwrap()),
        model.ids_between(10, 20)
    );
}

#[test]
fn test_file_size_reaches_steady_state() {
    let tmp = TempDb::new().unwrap();
    let mut db = tmp.open().unwrap();
    db.table_new(users_table()).unwrap();
    for id in 0..20 {
        db.insert("users", &user(id, "initial", 0)).unwrap();
    }

    // Warm up until freed pages start being reused.
    for round in 1..=20 {
        for id in 0..20 {
            db.upsert("users", &user(id, "warm", round)).unwrap();
        }
    }
    let settled = db.stats().page_count;

    for round in 21..=200 {
        for id in 0..20 {
            db.upsert("users", &user(id, "steady", round)).unwrap();
        }
    }
    let stats = db.stats();
    assert!(
        stats.page_count <= settled + stats.snapshot_pages as u64 + 2,
        "file grew from {} to {} pages",
        settled,
        stats.page_count
    );
    assert_eq!(tmp.file_len(), stats.page_count * stats.page_size as u64);
    assert!(stats.free_pages > 0);
}

#[test]
fn test_prefixes_are_never_reused() {
    let tmp = TempDb::new().unwrap();
    let names = ["a", "b", "c"];

    {
        let mut db = tmp.open().unwrap();
        for name in &names[..2] {
            db.table_new(TableDef::new(*name).column("k", ValueType::Int64))
                .unwrap();
        }
        assert!(matches!(
            db.table_new(TableDef::new("a").column("k", ValueType::Int64)),
            Err(DbError::TableExists(_))
        ));
        db.close().unwrap();
    }

    let mut db = tmp.open().unwrap();
    db.table_new(TableDef::new("c").column("k", ValueType::Int64))
        .unwrap();
    let prefixes: Vec<u32> = names
        .iter()
        .map(|n| db.table_def(n).unwrap().prefix)
        .collect();
    assert_eq!(prefixes, vec![100, 101, 102]);
}

#[test]
fn test_tables_do_not_overlap() {
    let tmp = TempDb::new().unwrap();
    let mut db = tmp.open().unwrap();
    db.table_new(users_table()).unwrap();
    db.table_new(
        TableDef::new("tags")
            .column("tag", ValueType::Bytes)
            .column("id", ValueType::Int64)
            .column("note", ValueType::Bytes)
            .primary_keys(2),
    )
    .unwrap();

    for id in 1..=5 {
        db.insert("users", &user(id, "x", 1)).unwrap();
        let tag = Record::new()
            .add_bytes("tag", "t\x00")
            .add_int64("id", id)
            .add_bytes("note", "n");
        db.insert("tags", &tag).unwrap();
    }

    assert_eq!(db.scan_table("users").unwrap().collect_rows().unwrap().len(), 5);
    let tags = db.scan_table("tags").unwrap().collect_rows().unwrap();
    assert_eq!(tags.len(), 5);
    assert_eq!(tags[0].get("tag"), Some(&Value::from("t\x00")));

    // Descending scan from the top of users stops at its lower bound.
    let rows = db
        .scan("users", range(Cmp::Le, 100, Cmp::Gt, 2))
        .unwrap()
        .collect_rows()
        .unwrap();
    assert_eq!(ids(&rows), vec![5, 4, 3]);
}

#[test]
fn test_scan_semantics() {
    let tmp = TempDb::new().unwrap();
    let mut db = tmp.open().unwrap();
    db.table_new(users_table()).unwrap();
    for id in [-3, 1, 2, 3, 5] {
        db.insert("users", &user(id, "x", 0)).unwrap();
    }

    let scan_ids = |db: &mut strata_table::Db, r: ScanRange| {
        ids(&db.scan("users", r).unwrap().collect_rows().unwrap())
    };
    assert_eq!(scan_ids(&mut db, range(Cmp::Ge, 2, Cmp::Le, 5)), vec![2, 3, 5]);
    assert_eq!(scan_ids(&mut db, range(Cmp::Gt, -10, Cmp::Lt, 2)), vec![-3, 1]);
    assert_eq!(scan_ids(&mut db, range(Cmp::Le, 4, Cmp::Ge, -3)), vec![3, 2, 1, -3]);
    assert!(scan_ids(&mut db, range(Cmp::Gt, 5, Cmp::Le, 100)).is_empty());

    let err = db
        .scan("users", range(Cmp::Ge, 1, Cmp::Gt, 5))
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Range);
    assert!(!db.is_poisoned());
}

#[test]
fn test_deferred_commit_flushes_on_close() {
    let tmp = TempDb::with_storage(StorageConfig::for_testing().with_auto_commit(false)).unwrap();

    {
        let mut db = tmp.open().unwrap();
        db.table_new(users_table()).unwrap();
        db.insert("users", &user(1, "a", 1)).unwrap();
        db.close().unwrap();
    }
    {
        let mut db = tmp.open().unwrap();
        db.insert("users", &user(2, "b", 2)).unwrap();
        // Dropped without flush.
    }

    let mut db = tmp.open().unwrap();
    let rows = db.scan_table("users").unwrap().collect_rows().unwrap();
    assert_eq!(ids(&rows), vec![1]);
}

#[test]
fn test_corrupt_row_poisons_handle() {
    let tmp = TempDb::new().unwrap();
    {
        let mut db = tmp.open().unwrap();
        db.table_new(users_table()).unwrap();
        db.insert("users", &user(1, "ok", 1)).unwrap();
        db.close().unwrap();
    }

    // Store a value with no string terminator under a valid users key.
    {
        let mut kv = PagedKv::open(tmp.path(), &tmp.config().storage).unwrap();
        let key = encode_key(100, &[Value::Int64(2)]);
        kv.update(&key, b"broken", UpdateMode::Upsert).unwrap();
        kv.close().unwrap();
    }

    let mut db = tmp.open().unwrap();
    let mut rec = user_key(1);
    assert!(db.get("users", &mut rec).unwrap());

    let err = db.get("users", &mut user_key(2)).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Corruption);
    assert!(db.is_poisoned());
    assert!(matches!(
        db.get("users", &mut user_key(1)),
        Err(DbError::Poisoned(_))
    ));

    // Reopening clears the poison; the bad row is still reported.
    let mut db = tmp.open().unwrap();
    assert!(db.get("users", &mut user_key(1)).unwrap());
    assert!(db.scan_table("users").unwrap().collect_rows().is_err());
}

#[test]
fn test_corrupt_meta_page_rejected() {
    let tmp = TempDb::new().unwrap();
    tmp.open().unwrap().close().unwrap();

    let mut bytes = std::fs::read(tmp.path()).unwrap();
    bytes[20] ^= 0x5a;
    std::fs::write(tmp.path(), &bytes).unwrap();

    let err = tmp.open().unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Corruption);
    assert!(err.is_fatal());
}

#[test]
fn test_memory_store_has_same_semantics() {
    let mut db = strata_table::Db::memory();
    db.table_new(users_table()).unwrap();
    assert!(db.insert("users", &user(1, "a", 1)).unwrap());
    assert!(!db.insert("users", &user(1, "a", 1)).unwrap());
    let outcome = db
        .set("users", &user(1, "b", 1), UpdateMode::UpdateOnly)
        .unwrap();
    assert!(outcome.updated && !outcome.added);
    assert_eq!(db.store().len(), 3);
}
