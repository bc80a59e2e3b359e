// ═══════════════════════════════════════════════════════════════════════════════
// FILE: collision.rs | CORE/SPATIAL_ENGINE/src/query/collision.rs
// PURPOSE: Broad-phase collision pair discovery
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// Candidate pairs come from co-residency: two entities in the same node, or
// in face-adjacent nodes at the same level. The broad phase tests stored
// bounds (or point spheres); a registered detector refines pairs with
// narrow-phase shape knowledge the engine does not have.

use std::collections::HashSet;

use super::QueryCtx;
use crate::entity::{EntityId, EntityRecord};
use sfc_engine::SpatialKey;

/// Unordered candidate pair, normalized to a < b
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CollisionPair {
    pub a: EntityId,
    pub b: EntityId,
}

impl CollisionPair {
    pub fn new(x: EntityId, y: EntityId) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }
}

/// Narrow-phase hook implemented by an external shape library
pub trait CollisionDetector<C>: Send + Sync {
    /// Keep or reject a broad-phase pair
    fn refine(&self, a: &EntityRecord<C>, b: &EntityRecord<C>) -> bool;
}

fn overlaps<K: SpatialKey, C>(
    ctx: &QueryCtx<'_, K, C>,
    a: &EntityRecord<C>,
    b: &EntityRecord<C>,
) -> bool {
    match (a.bounds, b.bounds) {
        (Some(ba), Some(bb)) => ba.intersects(&bb),
        (Some(ba), None) => ba.distance_squared(b.point) <= ctx.point_radius(b.id).powi(2),
        (None, Some(bb)) => bb.distance_squared(a.point) <= ctx.point_radius(a.id).powi(2),
        (None, None) => {
            let r = ctx.point_radius(a.id) + ctx.point_radius(b.id);
            a.point.distance_squared(b.point) <= r * r
        }
    }
}

pub(crate) fn collision_pairs<K: SpatialKey, C>(
    ctx: &QueryCtx<'_, K, C>,
    detector: Option<&dyn CollisionDetector<C>>,
) -> Vec<CollisionPair> {
    let mut pairs: HashSet<CollisionPair> = HashSet::new();
    let mut out = Vec::new();
    for (key, node) in ctx
        .nodes
        .keys()
        .into_iter()
        .filter_map(|k| ctx.nodes.get(&k).map(|n| (k, n)))
    {
        let residents = node.snapshot();
        if residents.is_empty() {
            continue;
        }
        // same-node candidates plus face-adjacent occupancy
        let mut candidates = residents.clone();
        for face in 0..key.face_count() {
            if let Some(neighbor) = key.face_neighbor(face) {
                if let Some(other) = ctx.nodes.get(&neighbor) {
                    candidates.extend(other.snapshot());
                }
            }
        }
        for (i, &a) in residents.iter().enumerate() {
            let Some(rec_a) = ctx.store.get(a) else { continue };
            for &b in candidates.iter().skip(i + 1) {
                if a == b {
                    continue;
                }
                let pair = CollisionPair::new(a, b);
                if pairs.contains(&pair) {
                    continue;
                }
                let Some(rec_b) = ctx.store.get(b) else { continue };
                if !overlaps(ctx, &rec_a, &rec_b) {
                    continue;
                }
                if let Some(det) = detector {
                    if !det.refine(&rec_a, &rec_b) {
                        continue;
                    }
                }
                pairs.insert(pair);
                out.push(pair);
            }
        }
    }
    out.sort_by(|x, y| x.a.cmp(&y.a).then(x.b.cmp(&y.b)));
    out
}
