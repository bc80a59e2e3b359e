//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: bulk_load.rs | CORE/SPATIAL_ENGINE/benches/bulk_load.rs
//! PURPOSE: Bulk loading vs per-entity insertion throughput
//! MODIFIED: 2026-07-28
//! ═══════════════════════════════════════════════════════════════════════════════

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use spatial_engine::{BulkItem, IndexOptions, Octree, SpatialIndex};

fn dataset(count: usize) -> Vec<BulkItem<u32>> {
    let mut rng = StdRng::seed_from_u64(0xB01D);
    let max = (1u32 << 21) as f32;
    let mut items: Vec<BulkItem<u32>> = (0..count)
        .map(|i| BulkItem {
            point: Vec3::new(
                rng.gen_range(0.0..max),
                rng.gen_range(0.0..max),
                rng.gen_range(0.0..max),
            ),
            level: 12,
            content: i as u32,
            bounds: None,
        })
        .collect();
    items.sort_by(|a, b| a.point.x.total_cmp(&b.point.x));
    items
}

fn bench_loading(c: &mut Criterion) {
    let mut group = c.benchmark_group("loading");
    for &count in &[10_000usize, 100_000] {
        let items = dataset(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("bulk", count), &items, |b, items| {
            b.iter(|| {
                let index: Octree<u32> = SpatialIndex::new(IndexOptions::default());
                index.bulk_insert(items.clone(), None)
            });
        });

        group.bench_with_input(
            BenchmarkId::new("bulk_parallel", count),
            &items,
            |b, items| {
                b.iter(|| {
                    let index: Octree<u32> = SpatialIndex::new(IndexOptions {
                        bulk_parallel: true,
                        ..IndexOptions::default()
                    });
                    index.bulk_insert(items.clone(), None)
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("iterative", count),
            &items,
            |b, items| {
                b.iter(|| {
                    let index: Octree<u32> = SpatialIndex::new(IndexOptions::default());
                    for item in items {
                        index
                            .insert(item.point, item.level, item.content, None)
                            .unwrap();
                    }
                });
            },
        );
    }
    group.finish();
}

fn bench_knn_cache(c: &mut Criterion) {
    let index: Octree<u32> = SpatialIndex::new(IndexOptions::default());
    let items = dataset(50_000);
    index.bulk_insert(items, None);
    let query = Vec3::splat(1_000_000.0);

    c.bench_function("knn_cold_vs_cached", |b| {
        b.iter(|| index.k_nearest(query, 16, 100_000.0));
    });
}

criterion_group!(benches, bench_loading, bench_knn_cache);
criterion_main!(benches);
