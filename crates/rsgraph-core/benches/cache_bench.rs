//! # Temporal Cache Benchmarks
//!
//! Performance benchmarks for rsgraph-core temporal operations.
//!
//! Run with: `cargo bench -p rsgraph-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use glam::DVec3;
use rsgraph_core::{
    AccessPolicy, Duration, Scene, TemporalCache, TimeStamp, pose_from_translation,
};
use std::hint::black_box;

/// Fill a cache with `size` entries spaced one second apart.
fn create_filled_cache(size: usize) -> TemporalCache<u64> {
    let mut cache = TemporalCache::new(Duration::from_seconds(size as f64 * 2.0));
    for index in 0..size {
        cache.insert(index as u64, TimeStamp::from_seconds(index as f64));
    }
    cache
}

/// Build a scene with a transform chain of the given depth.
fn create_transform_chain(depth: usize) -> (Scene, rsgraph_core::Id) {
    let mut scene = Scene::new();
    let stamp = TimeStamp::from_seconds(1.0);
    let mut parent = scene.root_id();
    for index in 0..depth {
        parent = scene
            .add_transform_node(
                parent,
                Vec::new(),
                pose_from_translation(DVec3::new(index as f64, 0.0, 0.0)),
                stamp,
            )
            .expect("add transform");
    }
    (scene, parent)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_cache_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_insertion");

    for size in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("in_order", size), &size, |b, &size| {
            b.iter(|| {
                let mut cache =
                    TemporalCache::new(Duration::from_seconds(size as f64 * 2.0));
                for index in 0..size {
                    cache.insert(
                        black_box(index as u64),
                        TimeStamp::from_seconds(index as f64),
                    );
                }
                cache
            });
        });
    }
    group.finish();
}

fn bench_cache_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_lookup");

    for size in [100, 1_000, 10_000] {
        let cache = create_filled_cache(size);
        let query = TimeStamp::from_seconds(size as f64 / 2.0 + 0.25);

        group.bench_with_input(BenchmarkId::new("closest", size), &cache, |b, cache| {
            b.iter(|| cache.get(black_box(query), AccessPolicy::Closest));
        });
        group.bench_with_input(BenchmarkId::new("preceding", size), &cache, |b, cache| {
            b.iter(|| cache.get(black_box(query), AccessPolicy::Preceding));
        });
    }
    group.finish();
}

fn bench_global_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("global_transform");

    for depth in [4, 16, 64] {
        let (scene, leaf) = create_transform_chain(depth);
        let stamp = TimeStamp::from_seconds(1.0);

        group.bench_with_input(BenchmarkId::new("chain", depth), &scene, |b, scene| {
            b.iter(|| {
                scene
                    .get_transform_for_node(black_box(leaf), stamp)
                    .expect("global")
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_cache_insertion,
    bench_cache_lookup,
    bench_global_transform
);
criterion_main!(benches);
