//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: queries.rs | CORE/SPATIAL_ENGINE/tests/queries.rs
//! PURPOSE: Ray, frustum, plane, collision, and traversal behavior
//! MODIFIED: 2026-07-28
//! ═══════════════════════════════════════════════════════════════════════════════

use std::sync::Arc;

use glam::Vec3;

use sfc_engine::{Aabb, Frustum, Plane, Ray, TopologyKind};
use spatial_engine::{
    CollisionDetector, EntityRecord, GhostElement, IndexOptions, Octree, Prism, RayCastMode,
    SpatialIndex, Tetree, TraversalStrategy, VisitAction, Visitor,
};

#[test]
fn test_ray_first_hits_nearest() {
    let index: Octree<&str> = SpatialIndex::new(IndexOptions::default());
    let near = index
        .insert(
            Vec3::new(5_000.0, 100.0, 100.0),
            10,
            "near",
            Some(Aabb::from_center_half(
                Vec3::new(5_000.0, 100.0, 100.0),
                Vec3::splat(50.0),
            )),
        )
        .unwrap();
    let _far = index
        .insert(
            Vec3::new(9_000.0, 100.0, 100.0),
            10,
            "far",
            Some(Aabb::from_center_half(
                Vec3::new(9_000.0, 100.0, 100.0),
                Vec3::splat(50.0),
            )),
        )
        .unwrap();
    let _off = index
        .insert(Vec3::new(5_000.0, 90_000.0, 100.0), 10, "off-axis", None)
        .unwrap();

    let ray = Ray::new(Vec3::new(0.0, 100.0, 100.0), Vec3::X);
    let hits = index.ray_cast(ray, RayCastMode::First);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, near);
    assert!((hits[0].t - 4_950.0).abs() < 1.0, "{}", hits[0].t);
    assert!(hits[0].t > 0.0);
}

#[test]
fn test_ray_all_ordered_and_within_distance() {
    let index: Octree<u32> = SpatialIndex::new(IndexOptions::default());
    for i in 1..=5u32 {
        let center = Vec3::new(10_000.0 * i as f32, 500.0, 500.0);
        index
            .insert(
                center,
                10,
                i,
                Some(Aabb::from_center_half(center, Vec3::splat(100.0))),
            )
            .unwrap();
    }
    let ray = Ray::new(Vec3::new(0.0, 500.0, 500.0), Vec3::X);

    let all = index.ray_cast(ray, RayCastMode::All);
    assert_eq!(all.len(), 5);
    for pair in all.windows(2) {
        assert!(pair[0].t <= pair[1].t, "front-to-back order");
    }

    let capped = index.ray_cast(ray, RayCastMode::WithinDistance(25_000.0));
    assert_eq!(capped.len(), 2);
}

#[test]
fn test_ray_misses_everything() {
    let index: Octree<u32> = SpatialIndex::new(IndexOptions::default());
    index.insert(Vec3::splat(100_000.0), 8, 1, None).unwrap();
    let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 1.0, 0.0));
    assert!(index.ray_cast(ray, RayCastMode::All).is_empty());
}

#[test]
fn test_frustum_cull_reports_contained_entities() {
    let index: Tetree<&str> = SpatialIndex::new(IndexOptions::default());
    let inside = index
        .insert(Vec3::splat(50_000.0), 8, "inside", None)
        .unwrap();
    let outside = index
        .insert(Vec3::splat(900_000.0), 8, "outside", None)
        .unwrap();

    let frustum = Frustum::from_aabb(&Aabb::new(Vec3::splat(10_000.0), Vec3::splat(100_000.0)));
    let visible = index.frustum_cull(&frustum);
    assert!(visible.contains(&inside));
    assert!(!visible.contains(&outside));
}

#[test]
fn test_plane_query_straddlers_only() {
    let index: Octree<&str> = SpatialIndex::new(IndexOptions::default());
    let plane_x = 65_536.0;
    let crossing = index
        .insert(
            Vec3::new(plane_x, 1_000.0, 1_000.0),
            8,
            "crossing",
            Some(Aabb::new(
                Vec3::new(plane_x - 500.0, 500.0, 500.0),
                Vec3::new(plane_x + 500.0, 1_500.0, 1_500.0),
            )),
        )
        .unwrap();
    let clear = index
        .insert(
            Vec3::new(plane_x + 400_000.0, 1_000.0, 1_000.0),
            8,
            "clear",
            Some(Aabb::from_center_half(
                Vec3::new(plane_x + 400_000.0, 1_000.0, 1_000.0),
                Vec3::splat(100.0),
            )),
        )
        .unwrap();

    let plane = Plane::from_point_normal(Vec3::new(plane_x, 0.0, 0.0), Vec3::X);
    let found = index.plane_query(&plane);
    assert!(found.contains(&crossing));
    assert!(!found.contains(&clear));
}

#[test]
fn test_collision_pairs_with_detector() {
    struct RejectHalf;
    impl CollisionDetector<u32> for RejectHalf {
        fn refine(&self, a: &EntityRecord<u32>, b: &EntityRecord<u32>) -> bool {
            // narrow phase keeps only pairs whose contents differ by one
            a.content.abs_diff(b.content) == 1
        }
    }

    let index: Octree<u32> = SpatialIndex::new(IndexOptions::default());
    let center = Vec3::splat(40_000.0);
    for i in 0..3u32 {
        let offset = Vec3::new(30.0 * i as f32, 0.0, 0.0);
        index
            .insert(
                center + offset,
                10,
                i,
                Some(Aabb::from_center_half(center + offset, Vec3::splat(40.0))),
            )
            .unwrap();
    }

    let broad = index.collision_pairs();
    assert_eq!(broad.len(), 3, "all boxes overlap pairwise: {broad:?}");

    index.set_collision_detector(Arc::new(RejectHalf));
    let refined = index.collision_pairs();
    assert_eq!(refined.len(), 2, "0-2 pair rejected by the detector");
}

#[test]
fn test_prism_end_to_end() {
    let index: Prism<&str> = SpatialIndex::new(IndexOptions::default());
    let a = index
        .insert(Vec3::new(1_000.0, 500.0, 9_000.0), 9, "a", None)
        .unwrap();
    let b = index
        .insert(Vec3::new(1_100.0, 600.0, 9_100.0), 9, "b", None)
        .unwrap();
    let hits = index.k_nearest(Vec3::new(1_010.0, 510.0, 9_010.0), 2, f32::INFINITY);
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, a);
    assert_eq!(hits[1].id, b);

    let region = Aabb::new(Vec3::new(900.0, 400.0, 8_900.0), Vec3::new(1_200.0, 700.0, 9_200.0));
    let mut found = index.entities_in_region(&region);
    found.sort();
    assert_eq!(found, vec![a, b]);

    index.update(a, Vec3::new(500_000.0, 500.0, 9_000.0), None).unwrap();
    let moved = index.entities_in_region(&region);
    assert_eq!(moved, vec![b]);
    assert!(index.validate().is_empty());
}

#[test]
fn test_multi_level_neighbors_and_ghosts() {
    let index: Octree<&str> = SpatialIndex::new(IndexOptions::default());
    let anchor = index.insert(Vec3::splat(500_000.0), 6, "anchor", None).unwrap();
    let keys = {
        let mut out = Vec::new();
        struct Grab<'a>(&'a mut Vec<sfc_engine::MortonKey>);
        impl Visitor<sfc_engine::MortonKey> for Grab<'_> {
            fn enter_node(
                &mut self,
                key: &sfc_engine::MortonKey,
                _occupancy: usize,
            ) -> VisitAction {
                self.0.push(*key);
                VisitAction::Continue
            }
        }
        index.traverse(TraversalStrategy::SfcOrder, &mut Grab(&mut out));
        out
    };
    assert_eq!(keys.len(), 1);
    let home = keys[0];
    let _ = anchor;

    // occupy a face neighbor at the child level
    use sfc_engine::SpatialKey;
    let neighbor = home.face_neighbor(1).unwrap();
    let child_point = neighbor.cell_bounds().center();
    index.insert(child_point, 7, "deep", None).unwrap();

    let related = index.multi_level_neighbors(&home, TopologyKind::Face);
    assert!(
        related
            .iter()
            .any(|(_, rel)| *rel == sfc_engine::LevelRelation::ChildLevel),
        "{related:?}"
    );

    // ghost interface is storage-only
    let ghost_key = home.face_neighbor(0).unwrap();
    index.add_ghost(
        ghost_key,
        GhostElement {
            owner: 9,
            payload: vec![0xAB],
        },
    );
    assert_eq!(index.lookup_ghost(&ghost_key).unwrap().owner, 9);
    assert_eq!(index.statistics().ghost_count, 1);
    assert!(index.remove_ghost(&ghost_key).is_some());
}

#[test]
fn test_traversal_strategies_agree_on_node_set() {
    let index: Octree<u32> = SpatialIndex::new(IndexOptions {
        max_entities_per_node: 4,
        ..IndexOptions::default()
    });
    for i in 0..40u32 {
        index
            .insert(
                Vec3::new(((i * 37) % 1000) as f32 * 2000.0, 777.0, 777.0),
                9,
                i,
                None,
            )
            .unwrap();
    }

    struct Count(usize, usize);
    impl Visitor<sfc_engine::MortonKey> for Count {
        fn enter_node(&mut self, _k: &sfc_engine::MortonKey, _o: usize) -> VisitAction {
            self.0 += 1;
            VisitAction::Continue
        }
        fn visit_entity(
            &mut self,
            _k: &sfc_engine::MortonKey,
            _id: spatial_engine::EntityId,
        ) -> VisitAction {
            self.1 += 1;
            VisitAction::Continue
        }
    }

    let mut counts = Vec::new();
    for strategy in [
        TraversalStrategy::DepthFirst,
        TraversalStrategy::BreadthFirst,
        TraversalStrategy::PostOrder,
        TraversalStrategy::SfcOrder,
        TraversalStrategy::LevelOrder,
    ] {
        let mut visitor = Count(0, 0);
        assert!(index.traverse(strategy, &mut visitor));
        counts.push((visitor.0, visitor.1));
    }
    assert!(counts.windows(2).all(|w| w[0] == w[1]), "{counts:?}");
    assert_eq!(counts[0].1, 40);
}
