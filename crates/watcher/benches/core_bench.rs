//! Scan and compare benchmarks for pollmon

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pollmon_core::{build_snapshot, FileRecord, Snapshot};
use pollmon_watcher::{compare, Callbacks, ChangeSet};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn synthetic(count: usize, offset: usize, bump_every: usize) -> Snapshot {
    (0..count)
        .map(|i| {
            let n = i + offset;
            let modified = if bump_every > 0 && n % bump_every == 0 { 2 } else { 1 };
            FileRecord::new(format!("dir{}/file{}.txt", n % 64, n), modified, n as u64)
        })
        .collect()
}

fn bench_compare(c: &mut Criterion) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let callbacks = Callbacks::from_fn(move |_, _| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    let small_old = synthetic(100, 0, 0);
    let small_new = synthetic(100, 5, 10);
    c.bench_function("compare_small", |b| {
        b.iter(|| compare(black_box(&small_old), black_box(&small_new), &callbacks));
    });

    // Target: well under one poll interval for 10k files
    let large_old = synthetic(10_000, 0, 0);
    let large_new = synthetic(10_000, 50, 100);
    c.bench_function("compare_large", |b| {
        b.iter(|| compare(black_box(&large_old), black_box(&large_new), &callbacks));
    });

    c.bench_function("compare_identical_large", |b| {
        b.iter(|| compare(black_box(&large_old), black_box(&large_old), &callbacks));
    });

    c.bench_function("changeset_large", |b| {
        b.iter(|| black_box(ChangeSet::between(&large_old, &large_new)));
    });
}

fn bench_scan(c: &mut Criterion) {
    let temp_dir = tempfile::TempDir::new().unwrap();
    for d in 0..20 {
        let dir = temp_dir.path().join(format!("dir{d}"));
        fs::create_dir_all(&dir).unwrap();
        for f in 0..50 {
            fs::write(dir.join(format!("file{f}.txt")), b"payload").unwrap();
        }
    }

    c.bench_function("scan_1000_files", |b| {
        b.iter(|| black_box(build_snapshot(temp_dir.path()).unwrap()));
    });
}

criterion_group!(benches, bench_compare, bench_scan);
criterion_main!(benches);
