//! # Entity Store Benchmark
//!
//! Structural operations: creation, component add/remove migration and
//! deletion with swap-remove patching.
//!
//! Run with: `cargo bench --package tessera_core --bench store_benchmark`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera_core::{EntityStore, Position, Rotation, Scale3};

fn bench_create_entities(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_entities");

    for count in [1_000, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::new("empty", count), &count, |b, &count| {
            b.iter(|| {
                let mut store = EntityStore::new();
                for _ in 0..count {
                    black_box(store.create_entity().ok());
                }
                store.entity_count()
            });
        });

        group.bench_with_input(BenchmarkId::new("bundle", count), &count, |b, &count| {
            b.iter(|| {
                let mut store = EntityStore::new();
                for i in 0..count {
                    let f = i as f32;
                    black_box(
                        store
                            .create_entity_with((Position::new(f, f, f), Rotation::IDENTITY))
                            .ok(),
                    );
                }
                store.entity_count()
            });
        });
    }

    group.finish();
}

fn bench_add_remove_component(c: &mut Criterion) {
    const COUNT: usize = 10_000;

    c.bench_function("add_remove_scale_10k", |b| {
        let mut store = EntityStore::new();
        let entities: Vec<_> = (0..COUNT)
            .filter_map(|_| store.create_entity_with((Position::default(),)).ok())
            .collect();

        b.iter(|| {
            for &entity in &entities {
                store.add_component(entity, Scale3::new(2.0, 2.0, 2.0));
            }
            for &entity in &entities {
                store.remove_component::<Scale3>(entity);
            }
            black_box(store.archetypes().len())
        });
    });
}

fn bench_delete_entities(c: &mut Criterion) {
    const COUNT: usize = 10_000;

    c.bench_function("create_delete_10k", |b| {
        let mut store = EntityStore::new();
        b.iter(|| {
            let entities: Vec<_> = (0..COUNT)
                .filter_map(|_| store.create_entity_with((Position::default(),)).ok())
                .collect();
            for entity in entities {
                store.delete_entity(entity);
            }
            black_box(store.entity_count())
        });
    });
}

criterion_group!(
    benches,
    bench_create_entities,
    bench_add_remove_component,
    bench_delete_entities
);
criterion_main!(benches);
