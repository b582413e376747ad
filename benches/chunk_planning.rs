//! Benchmarks `ChunkMaster::split_to_chunks` under a fully-seeded inventory,
//! the hot path on every store request.

use criterion::{criterion_group, criterion_main, Criterion};
use distributed_storage::chunkmaster::ChunkMaster;

fn seeded(n: usize) -> ChunkMaster {
    let cm = ChunkMaster::new(n);
    for i in 0..n {
        cm.update_storage_info(&format!("node-{i}"), 1024 * 1024 * 1024);
    }
    cm
}

fn split_to_chunks(c: &mut Criterion) {
    let cm = seeded(6);
    let mut i = 0u64;
    c.bench_function("split_to_chunks/6-nodes/9007-bytes", |b| {
        b.iter(|| {
            i += 1;
            cm.split_to_chunks(&format!("bench/{i}"), 9007).unwrap()
        })
    });
}

fn split_to_chunks_large_inventory(c: &mut Criterion) {
    let cm = seeded(64);
    let mut i = 0u64;
    c.bench_function("split_to_chunks/64-nodes/9007-bytes", |b| {
        b.iter(|| {
            i += 1;
            cm.split_to_chunks(&format!("bench/{i}"), 9007).unwrap()
        })
    });
}

criterion_group!(benches, split_to_chunks, split_to_chunks_large_inventory);
criterion_main!(benches);
