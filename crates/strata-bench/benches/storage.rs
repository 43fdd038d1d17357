//! Storage benchmarks for StrataDB.
//!
//! Benchmarks for:
//! - In-memory ordered store inserts and seeks
//! - Free list push/pop cycles
//! - Paged store commits

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use strata_bench::utils::generate_kv_pairs;
use strata_common::config::StorageConfig;
use strata_storage::{
    Cmp, FreeList, KvIter, KvStore, MemoryKv, MemoryPageStore, PageStore, PagedKv, UpdateMode,
};
use tempfile::tempdir;

/// Benchmark random inserts into the in-memory store.
fn bench_memory_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage/memory_insert");

    for size in [1000, 10_000, 50_000].iter() {
        let pairs = generate_kv_pairs(*size, 16, 100);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut kv = MemoryKv::new();
                for (key, value) in &pairs {
                    kv.update(key, value, UpdateMode::Upsert).unwrap();
                }
                black_box(kv.len())
            });
        });
    }

    group.finish();
}

/// Benchmark seeks followed by a short forward walk.
fn bench_memory_seek(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage/memory_seek");

    let pairs = generate_kv_pairs(10_000, 16, 100);
    let mut kv = MemoryKv::new();
    for (key, value) in &pairs {
        kv.update(key, value, UpdateMode::Upsert).unwrap();
    }

    group.throughput(Throughput::Elements(1000));
    group.bench_function("seek_and_walk_10", |b| {
        b.iter(|| {
            let mut seen = 0;
            for (key, _) in pairs.iter().take(1000) {
                let mut iter = kv.seek(key, Cmp::Ge);
                for _ in 0..10 {
                    if !iter.valid() {
                        break;
                    }
                    seen += 1;
                    iter.next();
                }
            }
            black_box(seen)
        });
    });

    group.finish();
}

/// Benchmark releasing and reusing pages through the free list.
fn bench_free_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage/free_list");

    for size in [100, 1000, 10_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut pages = MemoryPageStore::new(4096);
                let node = pages.append(vec![0u8; 4096]).unwrap();
                let mut list = FreeList::new(node, 4096);
                for i in 0..size {
                    list.push_tail(&mut pages, strata_common::PageId::new(1000 + i as u64))
                        .unwrap();
                }
                list.set_max_seq();
                let mut reused = 0;
                while list.pop_head(&mut pages).unwrap().is_some() {
                    reused += 1;
                }
                black_box(reused)
            });
        });
    }

    group.finish();
}

/// Benchmark committing single-entry updates to a file.
fn bench_paged_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage/paged_commit");
    group.sample_size(20);

    let dir = tempdir().unwrap();
    let config = StorageConfig::default().with_sync_on_commit(false);
    let mut kv = PagedKv::open(dir.path().join("bench.db"), &config).unwrap();
    for (key, value) in generate_kv_pairs(1000, 16, 100) {
        kv.update(&key, &value, UpdateMode::Upsert).unwrap();
    }

    let mut counter = 0u64;
    group.bench_function("update_1000_entries", |b| {
        b.iter(|| {
            counter += 1;
            kv.update(b"counter", &counter.to_le_bytes(), UpdateMode::Upsert)
                .unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_memory_insert,
    bench_memory_seek,
    bench_free_list,
    bench_paged_commit
);
criterion_main!(benches);
