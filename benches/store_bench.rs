// TripleStore benchmarks: bulk insert, pattern-matched lookups across the
// eight pattern classes, and fork cost under a live writer.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use triad_store::{Term, Triple, TripleMatch, TripleStore};

fn triple(i: u64) -> Triple {
    Triple::of(
        Term::iri(format!("http://example.org/s{}", i % 1000)),
        Term::iri(format!("http://example.org/p{}", i % 20)),
        Term::iri(format!("http://example.org/o{}", i)),
    )
}

fn populated(size: u64) -> TripleStore {
    let mut store = TripleStore::new();
    for i in 0..size {
        store.add(triple(i));
    }
    store
}

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_add");
    for size in [1_000u64, 10_000, 50_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut store = TripleStore::new();
                for i in 0..size {
                    store.add(black_box(triple(i)));
                }
                black_box(store);
            });
        });
    }
    group.finish();
}

fn bench_find_spo(c: &mut Criterion) {
    let store = populated(50_000);
    c.bench_function("store_find_spo", |b| {
        b.iter(|| {
            for i in (0..50_000u64).step_by(500) {
                let t = triple(i);
                let pattern = TripleMatch::new(t.subject, t.predicate, t.object);
                black_box(store.find(&pattern));
            }
        });
    });
}

fn bench_find_any_p_any(c: &mut Criterion) {
    let store = populated(50_000);
    c.bench_function("store_find_any_p_any", |b| {
        b.iter(|| {
            for p in 0..20 {
                let pattern = TripleMatch::of(Term::Any, Term::iri(format!("http://example.org/p{p}")), Term::Any);
                black_box(store.find(&pattern));
            }
        });
    });
}

fn bench_find_any_po(c: &mut Criterion) {
    let store = populated(50_000);
    c.bench_function("store_find_any_po", |b| {
        b.iter(|| {
            for i in (0..50_000u64).step_by(1000) {
                let pattern = TripleMatch::of(
                    Term::Any,
                    Term::iri(format!("http://example.org/p{}", i % 20)),
                    Term::iri(format!("http://example.org/o{i}")),
                );
                black_box(store.find(&pattern));
            }
        });
    });
}

fn bench_fork_under_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_fork_under_write");
    for size in [1_000u64, 10_000, 50_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut store = populated(size);
            b.iter(|| {
                let snapshot = store.fork();
                store.add(triple(size + 1));
                black_box(&snapshot);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_add, bench_find_spo, bench_find_any_p_any, bench_find_any_po, bench_fork_under_write);
criterion_main!(benches);
