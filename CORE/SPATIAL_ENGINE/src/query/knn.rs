// ═══════════════════════════════════════════════════════════════════════════════
// FILE: knn.rs | CORE/SPATIAL_ENGINE/src/query/knn.rs
// PURPOSE: Best-first k-nearest-neighbor search
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// The frontier is a min-heap of keys ordered by the distance from the query
// point to their cell box - a lower bound on the distance to anything stored
// beneath them. Traversal is level-blind: a coarse node and a deep node
// compete purely on cell distance. Search starts with a small radius and
// widens a bounded number of times before conceding, which keeps dense-case
// cost proportional to the result, not the radius argument. Unlimited-radius
// queries scan the entity store directly instead of walking the tree.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use glam::Vec3;

use super::{entity_distance_squared, sort_hits, KnnHit, OrdF32, QueryCtx};
use sfc_engine::{SpatialKey, MAX_EXTENT};

/// Radius widening schedule: factor per retry, bounded retries
const EXPANSION_FACTOR: f32 = 8.0;
const MAX_EXPANSIONS: u32 = 3;

pub(crate) fn k_nearest<K: SpatialKey, C>(
    ctx: &QueryCtx<'_, K, C>,
    point: Vec3,
    k: usize,
    max_distance: f32,
) -> Vec<KnnHit> {
    if k == 0 {
        return Vec::new();
    }
    // unlimited-distance queries degenerate to a full scan of the store
    if !max_distance.is_finite() || max_distance >= MAX_EXTENT {
        return full_scan(ctx, point, k);
    }

    let mut radius = (max_distance / EXPANSION_FACTOR.powi(MAX_EXPANSIONS as i32))
        .max(1.0)
        .min(max_distance);
    let mut expansions = 0;
    loop {
        let hits = best_first(ctx, point, k, radius);
        if hits.len() >= k || radius >= max_distance || expansions >= MAX_EXPANSIONS {
            return hits;
        }
        radius = (radius * EXPANSION_FACTOR).min(max_distance);
        expansions += 1;
    }
}

/// Single bounded best-first pass
fn best_first<K: SpatialKey, C>(
    ctx: &QueryCtx<'_, K, C>,
    point: Vec3,
    k: usize,
    radius: f32,
) -> Vec<KnnHit> {
    let radius_sq = radius * radius;
    // max-heap of the current best k, worst on top
    let mut best: BinaryHeap<(OrdF32, crate::entity::EntityId)> = BinaryHeap::new();
    let mut seen: HashSet<crate::entity::EntityId> = HashSet::new();
    let mut frontier: BinaryHeap<Reverse<(OrdF32, K)>> = BinaryHeap::new();

    for root in K::roots() {
        let (lo, hi) = root.sfc_range();
        if ctx.nodes.any_in_range(&lo, &hi) {
            let d = root.cell_bounds().distance_squared(point);
            if d <= radius_sq {
                frontier.push(Reverse((OrdF32(d), root)));
            }
        }
    }

    while let Some(Reverse((OrdF32(cell_dist), key))) = frontier.pop() {
        if cell_dist > radius_sq {
            break;
        }
        if best.len() == k {
            let worst = best.peek().map(|(OrdF32(d), _)| *d).unwrap_or(f32::INFINITY);
            // every remaining frontier cell is at least this far away
            if cell_dist > worst {
                break;
            }
        }

        if let Some(node) = ctx.nodes.get(&key) {
            for id in node.snapshot() {
                if !seen.insert(id) {
                    continue;
                }
                let Some(record) = ctx.store.get(id) else {
                    continue; // raced a removal
                };
                let d = entity_distance_squared(point, record.point);
                if d > radius_sq {
                    continue;
                }
                if best.len() < k {
                    best.push((OrdF32(d), id));
                } else if let Some((OrdF32(worst), worst_id)) = best.peek().copied() {
                    if d < worst || (d == worst && id < worst_id) {
                        best.pop();
                        best.push((OrdF32(d), id));
                    }
                }
            }
        }

        for child in key.children() {
            let (lo, hi) = child.sfc_range();
            if !ctx.nodes.any_in_range(&lo, &hi) {
                continue;
            }
            let d = child.cell_bounds().distance_squared(point);
            if d <= radius_sq {
                frontier.push(Reverse((OrdF32(d), child)));
            }
        }
    }

    let mut hits: Vec<KnnHit> = best
        .into_iter()
        .map(|(OrdF32(d), id)| KnnHit {
            id,
            distance: d.sqrt(),
        })
        .collect();
    sort_hits(&mut hits);
    hits
}

/// Unbounded query: rank the whole store
fn full_scan<K: SpatialKey, C>(ctx: &QueryCtx<'_, K, C>, point: Vec3, k: usize) -> Vec<KnnHit> {
    let mut best: BinaryHeap<(OrdF32, crate::entity::EntityId)> = BinaryHeap::new();
    ctx.store.for_each(|record| {
        let d = entity_distance_squared(point, record.point);
        if best.len() < k {
            best.push((OrdF32(d), record.id));
        } else if let Some((OrdF32(worst), worst_id)) = best.peek().copied() {
            if d < worst || (d == worst && record.id < worst_id) {
                best.pop();
                best.push((OrdF32(d), record.id));
            }
        }
    });
    let mut hits: Vec<KnnHit> = best
        .into_iter()
        .map(|(OrdF32(d), id)| KnnHit {
            id,
            distance: d.sqrt(),
        })
        .collect();
    sort_hits(&mut hits);
    hits
}
