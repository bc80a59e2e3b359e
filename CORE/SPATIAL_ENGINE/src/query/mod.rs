// ═══════════════════════════════════════════════════════════════════════════════
// FILE: mod.rs | CORE/SPATIAL_ENGINE/src/query/mod.rs
// PURPOSE: Query engine - shared result types, entity shape tests, dedupe rules
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// All queries are read-only: they take the structural lock shared, never
// exclusive. Spanning entities are referenced from several nodes, and an
// in-flight move leaves an entity briefly referenced from two cells, so every
// query deduplicates candidates by entity id before reporting.

use std::cmp::Ordering;

use dashmap::DashMap;
use glam::Vec3;

use crate::entity::{EntityId, EntityRecord, EntityStore};
use crate::node::NodeMap;
use sfc_engine::{cell_extent, Aabb, SpatialKey};

pub mod collision;
pub mod frustum;
pub mod knn;
pub mod range;
pub mod raycast;

pub use collision::{CollisionDetector, CollisionPair};
pub use raycast::{RayCastMode, RayHit};

/// One k-NN result
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KnnHit {
    pub id: EntityId,
    pub distance: f32,
}

/// Total order on f32 for priority queues
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct OrdF32(pub f32);

impl Eq for OrdF32 {}

impl PartialOrd for OrdF32 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrdF32 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Read-only view of the engine state a query needs
pub(crate) struct QueryCtx<'a, K: SpatialKey, C> {
    pub nodes: &'a NodeMap<K>,
    pub store: &'a EntityStore<C>,
    pub placements: &'a DashMap<EntityId, Vec<K>>,
}

impl<K: SpatialKey, C> QueryCtx<'_, K, C> {
    /// Collision/ray radius of a point entity: half the cell diagonal at the
    /// level it resides at, floored at one grid unit.
    pub fn point_radius(&self, id: EntityId) -> f32 {
        const HALF_SQRT3: f32 = 0.866_025_4;
        let level = self
            .placements
            .get(&id)
            .and_then(|keys| keys.first().map(|k| k.level()))
            .unwrap_or(sfc_engine::MAX_LEVEL);
        (cell_extent(level) as f32 * HALF_SQRT3).max(1.0)
    }

    /// True when the stored state of an entity intersects `region`
    pub fn record_in_region(&self, record: &EntityRecord<C>, region: &Aabb) -> bool {
        match record.bounds {
            Some(bounds) => bounds.intersects(region),
            None => region.contains(record.point),
        }
    }
}

/// Sort hits ascending by distance, ties broken by id order
pub(crate) fn sort_hits(hits: &mut [KnnHit]) {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
}

/// Squared distance between a query point and an entity position
#[inline]
pub(crate) fn entity_distance_squared(point: Vec3, record_point: Vec3) -> f32 {
    point.distance_squared(record_point)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_hits_tie_break_by_id() {
        let mut hits = vec![
            KnnHit {
                id: EntityId::Seq(5),
                distance: 1.0,
            },
            KnnHit {
                id: EntityId::Seq(2),
                distance: 1.0,
            },
            KnnHit {
                id: EntityId::Seq(9),
                distance: 0.5,
            },
        ];
        sort_hits(&mut hits);
        assert_eq!(hits[0].id, EntityId::Seq(9));
        assert_eq!(hits[1].id, EntityId::Seq(2));
        assert_eq!(hits[2].id, EntityId::Seq(5));
    }

    #[test]
    fn test_ordf32_total_order() {
        let mut values = [OrdF32(3.0), OrdF32(1.0), OrdF32(2.0)];
        values.sort();
        assert_eq!(values[0].0, 1.0);
        assert_eq!(values[2].0, 3.0);
    }
}
