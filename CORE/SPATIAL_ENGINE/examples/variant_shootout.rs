//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: variant_shootout.rs | CORE/SPATIAL_ENGINE/examples/variant_shootout.rs
//! PURPOSE: Side-by-side workload comparison of the three index variants
//! MODIFIED: 2026-07-28
//! ═══════════════════════════════════════════════════════════════════════════════

//! Loads the same random population into an octree, a tetree, and a prism
//! index, then runs an identical mixed workload against each and prints a
//! small report.
//!
//! Run with: cargo run --release --example variant_shootout

use std::time::Instant;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sfc_engine::{Aabb, Ray, SpatialKey};
use spatial_engine::{BulkItem, IndexOptions, RayCastMode, SpatialIndex};

const POPULATION: usize = 100_000;
const QUERIES: usize = 2_000;
const MOVES: usize = 5_000;
const LEVEL: u8 = 12;

#[derive(Default)]
struct Report {
    load_ms: f64,
    knn_ms: f64,
    range_ms: f64,
    ray_ms: f64,
    move_ms: f64,
    nodes: usize,
    max_depth: u8,
    cache_hit_rate: f32,
}

fn dataset(seed: u64) -> Vec<BulkItem<u64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let max = (1u32 << 21) as f32;
    (0..POPULATION)
        .map(|i| BulkItem {
            point: Vec3::new(
                rng.gen_range(0.0..max),
                rng.gen_range(0.0..max),
                rng.gen_range(0.0..max),
            ),
            level: LEVEL,
            content: i as u64,
            bounds: None,
        })
        .collect()
}

fn run_workload<K: SpatialKey>(name: &str, index: &SpatialIndex<K, u64>) -> Report {
    let mut rng = StdRng::seed_from_u64(0xCAFE);
    let max = (1u32 << 21) as f32;
    let mut report = Report::default();

    let start = Instant::now();
    let results = index.bulk_insert(dataset(7), None);
    report.load_ms = start.elapsed().as_secs_f64() * 1e3;
    let ids: Vec<_> = results.into_iter().filter_map(Result::ok).collect();

    let start = Instant::now();
    for _ in 0..QUERIES {
        let p = Vec3::new(
            rng.gen_range(0.0..max),
            rng.gen_range(0.0..max),
            rng.gen_range(0.0..max),
        );
        let hits = index.k_nearest(p, 8, 200_000.0);
        assert!(hits.len() <= 8);
    }
    report.knn_ms = start.elapsed().as_secs_f64() * 1e3;

    let start = Instant::now();
    for _ in 0..QUERIES {
        let corner = Vec3::new(
            rng.gen_range(0.0..max * 0.9),
            rng.gen_range(0.0..max * 0.9),
            rng.gen_range(0.0..max * 0.9),
        );
        let region = Aabb::new(corner, corner + Vec3::splat(50_000.0));
        let _ = index.entities_in_region(&region);
    }
    report.range_ms = start.elapsed().as_secs_f64() * 1e3;

    let start = Instant::now();
    for _ in 0..QUERIES {
        let origin = Vec3::new(rng.gen_range(0.0..max), rng.gen_range(0.0..max), 0.0);
        let dir = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            1.0,
        );
        let _ = index.ray_cast(Ray::new(origin, dir), RayCastMode::First);
    }
    report.ray_ms = start.elapsed().as_secs_f64() * 1e3;

    let start = Instant::now();
    for slot in 0..MOVES {
        let id = ids[slot % ids.len()];
        let p = Vec3::new(
            rng.gen_range(0.0..max),
            rng.gen_range(0.0..max),
            rng.gen_range(0.0..max),
        );
        index.update(id, p, None).expect("move failed");
    }
    report.move_ms = start.elapsed().as_secs_f64() * 1e3;

    let stats = index.statistics();
    report.nodes = stats.node_count;
    report.max_depth = stats.max_depth;
    report.cache_hit_rate = stats.knn_cache_hit_rate();

    let violations = index.validate();
    assert!(violations.is_empty(), "{name}: {violations:?}");
    report
}

fn print_report(name: &str, r: &Report) {
    println!(
        "{name:<8} load {:>8.1}ms | knn {:>8.1}ms | range {:>8.1}ms | ray {:>8.1}ms | \
         moves {:>8.1}ms | nodes {:>7} | depth {:>2} | cache {:>5.1}%",
        r.load_ms,
        r.knn_ms,
        r.range_ms,
        r.ray_ms,
        r.move_ms,
        r.nodes,
        r.max_depth,
        r.cache_hit_rate * 100.0
    );
}

fn main() {
    println!(
        "variant shootout: {POPULATION} entities at level {LEVEL}, {QUERIES} queries per kind, {MOVES} moves"
    );

    let octree: spatial_engine::Octree<u64> = SpatialIndex::new(IndexOptions::default());
    print_report("octree", &run_workload("octree", &octree));

    let tetree: spatial_engine::Tetree<u64> = SpatialIndex::new(IndexOptions::default());
    print_report("tetree", &run_workload("tetree", &tetree));

    let prism: spatial_engine::Prism<u64> = SpatialIndex::new(IndexOptions::default());
    print_report("prism", &run_workload("prism", &prism));
}
