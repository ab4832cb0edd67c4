// FastHash primitive benchmarks: insert, lookup, remove, and fork-under-write
// at a few table sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use triad_store::fasthash::{FastHash, KeyPolicy};

#[derive(Clone, Default)]
struct U64Policy;
impl KeyPolicy<u64> for U64Policy {
    fn eq(&self, a: &u64, b: &u64) -> bool {
        a == b
    }
    fn hash(&self, k: &u64) -> u64 {
        *k
    }
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("fasthash_insert");
    for size in [100u64, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut table: FastHash<u64, u64, U64Policy> = FastHash::new(U64Policy);
                for i in 0..size {
                    table.try_add(black_box(i), i);
                }
                black_box(table);
            });
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut table: FastHash<u64, u64, U64Policy> = FastHash::new(U64Policy);
    for i in 0..10_000u64 {
        table.try_add(i, i);
    }

    c.bench_function("fasthash_lookup", |b| {
        b.iter(|| {
            for i in (0..10_000u64).step_by(10) {
                black_box(table.get(&i));
            }
        });
    });
}

fn bench_remove_and_reinsert(c: &mut Criterion) {
    c.bench_function("fasthash_remove_and_reinsert", |b| {
        b.iter(|| {
            let mut table: FastHash<u64, u64, U64Policy> = FastHash::new(U64Policy);
            for i in 0..1_000u64 {
                table.try_add(i, i);
            }
            for i in (0..1_000u64).step_by(2) {
                table.try_remove(&i);
            }
            for i in (0..1_000u64).step_by(2) {
                table.try_add(i, i * 2);
            }
            black_box(table);
        });
    });
}

fn bench_fork_under_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("fasthash_fork_under_write");
    for size in [100u64, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut table: FastHash<u64, u64, U64Policy> = FastHash::new(U64Policy);
            for i in 0..size {
                table.try_add(i, i);
            }
            b.iter(|| {
                let snapshot = table.fork();
                table.put(0, 999);
                black_box(&snapshot);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insert, bench_lookup, bench_remove_and_reinsert, bench_fork_under_write);
criterion_main!(benches);
