//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: properties.rs | CORE/SPATIAL_ENGINE/tests/properties.rs
//! PURPOSE: Property tests - query results agree with brute force over the store
//! MODIFIED: 2026-07-28
//! ═══════════════════════════════════════════════════════════════════════════════

use glam::Vec3;
use proptest::prelude::*;

use sfc_engine::Aabb;
use spatial_engine::{IndexOptions, Octree, SpatialIndex, Tetree};

const MAX: f32 = (1u32 << 21) as f32;

fn point_strategy() -> impl Strategy<Value = Vec3> {
    (0.0f32..MAX, 0.0f32..MAX, 0.0f32..MAX).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_octree_knn_matches_brute_force(
        points in prop::collection::vec(point_strategy(), 1..40),
        query in point_strategy(),
        k in 1usize..6,
    ) {
        let index: Octree<usize> = SpatialIndex::new(IndexOptions {
            max_entities_per_node: 4,
            ..IndexOptions::default()
        });
        let mut ids = Vec::new();
        for (i, p) in points.iter().enumerate() {
            ids.push(index.insert(*p, 10, i, None).unwrap());
        }

        let hits = index.k_nearest(query, k, f32::INFINITY);
        prop_assert_eq!(hits.len(), k.min(points.len()));

        // brute-force ranking over the raw inputs
        let mut expected: Vec<(f32, usize)> = points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.distance(query), i))
            .collect();
        expected.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (hit, (dist, idx)) in hits.iter().zip(expected.iter()) {
            let tolerance = dist.max(1.0) * 1e-5;
            prop_assert!((hit.distance - dist).abs() <= tolerance,
                "distance mismatch: {} vs {}", hit.distance, dist);
            // ids may legitimately differ on exact ties; distances may not
            let _ = idx;
        }
        // sorted ascending
        for pair in hits.windows(2) {
            prop_assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn prop_octree_bounded_knn_is_filtered_brute_force(
        points in prop::collection::vec(point_strategy(), 1..40),
        query in point_strategy(),
        radius in 1_000.0f32..2_000_000.0,
    ) {
        let index: Octree<usize> = SpatialIndex::new(IndexOptions::default());
        for (i, p) in points.iter().enumerate() {
            index.insert(*p, 8, i, None).unwrap();
        }
        let k = 10;
        let hits = index.k_nearest(query, k, radius);
        let within = points.iter().filter(|p| p.distance(query) <= radius).count();
        prop_assert_eq!(hits.len(), k.min(within));
        for hit in &hits {
            prop_assert!(hit.distance <= radius);
        }
    }

    #[test]
    fn prop_range_query_exact_octree(
        points in prop::collection::vec(point_strategy(), 1..60),
        corner in point_strategy(),
        extent in 1_000.0f32..800_000.0,
    ) {
        let index: Octree<usize> = SpatialIndex::new(IndexOptions::default());
        let mut ids = Vec::new();
        for (i, p) in points.iter().enumerate() {
            ids.push(index.insert(*p, 11, i, None).unwrap());
        }
        let region = Aabb::new(corner, corner + Vec3::splat(extent));
        let mut found = index.entities_in_region(&region);
        found.sort();
        let mut expected: Vec<_> = ids
            .iter()
            .zip(points.iter())
            .filter(|(_, p)| region.contains(**p))
            .map(|(id, _)| *id)
            .collect();
        expected.sort();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn prop_range_query_exact_tetree(
        points in prop::collection::vec(point_strategy(), 1..60),
        corner in point_strategy(),
        extent in 1_000.0f32..800_000.0,
    ) {
        let index: Tetree<usize> = SpatialIndex::new(IndexOptions::default());
        let mut ids = Vec::new();
        for (i, p) in points.iter().enumerate() {
            ids.push(index.insert(*p, 9, i, None).unwrap());
        }
        let region = Aabb::new(corner, corner + Vec3::splat(extent));
        let mut found = index.entities_in_region(&region);
        found.sort();
        let mut expected: Vec<_> = ids
            .iter()
            .zip(points.iter())
            .filter(|(_, p)| region.contains(**p))
            .map(|(id, _)| *id)
            .collect();
        expected.sort();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn prop_insert_lookup_roundtrip_tetree(
        points in prop::collection::vec(point_strategy(), 1..30),
        level in 1u8..16,
    ) {
        let index: Tetree<usize> = SpatialIndex::new(IndexOptions::default());
        for (i, p) in points.iter().enumerate() {
            let id = index.insert(*p, level, i, None).unwrap();
            let (stored, content, _) = index.lookup(id).unwrap();
            prop_assert_eq!(stored, *p);
            prop_assert_eq!(content, i);
            // the containing region always reports the fresh entity
            let probe = Aabb::from_center_half(*p, Vec3::splat(2.0));
            prop_assert!(index.entities_in_region(&probe).contains(&id));
        }
        prop_assert!(index.validate().is_empty());
    }
}
