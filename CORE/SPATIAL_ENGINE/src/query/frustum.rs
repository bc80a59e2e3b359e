// ═══════════════════════════════════════════════════════════════════════════════
// FILE: frustum.rs | CORE/SPATIAL_ENGINE/src/query/frustum.rs
// PURPOSE: Frustum culling and plane queries with subtree pruning
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// Cells fully outside the volume prune their whole subtree; cells fully
// inside surrender their subtree wholesale; straddling cells test entities
// individually. Entities whose bounds exceed their cell are seen through
// their spanning references, which is the contract for exact results with
// oversized bounds.

use std::collections::HashSet;

use super::QueryCtx;
use crate::entity::EntityId;
use sfc_engine::{Containment, Frustum, HalfspaceSide, Plane, SpatialKey};

pub(crate) fn frustum_cull<K: SpatialKey, C>(
    ctx: &QueryCtx<'_, K, C>,
    frustum: &Frustum,
) -> Vec<EntityId> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut stack: Vec<K> = K::roots();
    while let Some(key) = stack.pop() {
        let (lo, hi) = key.sfc_range();
        if !ctx.nodes.any_in_range(&lo, &hi) {
            continue;
        }
        match frustum.classify_aabb(&key.cell_bounds()) {
            Containment::Outside => {}
            Containment::Inside => {
                // whole subtree is visible
                for (_, node) in ctx.nodes.scan(&lo, &hi) {
                    for id in node.snapshot() {
                        if seen.insert(id) {
                            out.push(id);
                        }
                    }
                }
            }
            Containment::Intersecting => {
                if let Some(node) = ctx.nodes.get(&key) {
                    for id in node.snapshot() {
                        if !seen.insert(id) {
                            continue;
                        }
                        let Some(record) = ctx.store.get(id) else {
                            continue;
                        };
                        let visible = match record.bounds {
                            Some(bounds) => {
                                frustum.classify_aabb(&bounds) != Containment::Outside
                            }
                            None => frustum.contains_point(record.point),
                        };
                        if visible {
                            out.push(id);
                        } else {
                            seen.remove(&id); // another cell may expose it
                        }
                    }
                }
                stack.extend(key.children());
            }
        }
    }
    out
}

pub(crate) fn plane_query<K: SpatialKey, C>(
    ctx: &QueryCtx<'_, K, C>,
    plane: &Plane,
) -> Vec<EntityId> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut stack: Vec<K> = K::roots();
    while let Some(key) = stack.pop() {
        let (lo, hi) = key.sfc_range();
        if !ctx.nodes.any_in_range(&lo, &hi) {
            continue;
        }
        match plane.classify_aabb(&key.cell_bounds()) {
            HalfspaceSide::Front | HalfspaceSide::Back => {}
            HalfspaceSide::Straddling => {
                if let Some(node) = ctx.nodes.get(&key) {
                    for id in node.snapshot() {
                        if !seen.insert(id) {
                            continue;
                        }
                        let Some(record) = ctx.store.get(id) else {
                            continue;
                        };
                        let crosses = match record.bounds {
                            Some(bounds) => {
                                plane.classify_aabb(&bounds) == HalfspaceSide::Straddling
                            }
                            None => plane.signed_distance(record.point).abs() < 1e-4,
                        };
                        if crosses {
                            out.push(id);
                        } else {
                            seen.remove(&id);
                        }
                    }
                }
                stack.extend(key.children());
            }
        }
    }
    out
}
