// ═══════════════════════════════════════════════════════════════════════════════
// FILE: range.rs | CORE/SPATIAL_ENGINE/src/query/range.rs
// PURPOSE: Axis-aligned range queries over the covering key intervals
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// The variant's region planner produces the minimal covering set of curve
// intervals plus the coarse ancestor probes; candidates from interval scans
// are filtered by the exact stored geometry. Results are unsorted; callers
// wanting order sort on their side.

use std::collections::HashSet;

use glam::Vec3;

use super::QueryCtx;
use crate::entity::EntityId;
use sfc_engine::{Aabb, SpatialKey, MAX_EXTENT};

pub(crate) fn entities_in_region<K: SpatialKey, C>(
    ctx: &QueryCtx<'_, K, C>,
    region: &Aabb,
) -> Vec<EntityId> {
    // a region swallowing the whole domain degenerates to a store scan
    let domain = Aabb::new(Vec3::ZERO, Vec3::splat(MAX_EXTENT));
    if region.contains_aabb(&domain) {
        let mut out = Vec::new();
        ctx.store.for_each(|record| {
            if ctx.record_in_region(record, region) {
                out.push(record.id);
            }
        });
        return out;
    }

    let cover = K::region_cover(region);
    let mut seen: HashSet<EntityId> = HashSet::new();
    let mut out = Vec::new();
    let consider = |key: &K, ctx: &QueryCtx<'_, K, C>, out: &mut Vec<EntityId>,
                    seen: &mut HashSet<EntityId>| {
        if !key.cell_bounds().intersects(region) {
            return;
        }
        let Some(node) = ctx.nodes.get(key) else {
            return;
        };
        for id in node.snapshot() {
            if !seen.insert(id) {
                continue;
            }
            let Some(record) = ctx.store.get(id) else {
                continue;
            };
            if ctx.record_in_region(&record, region) {
                out.push(id);
            }
        }
    };

    for (lo, hi) in &cover.intervals {
        for (key, _) in ctx.nodes.scan(lo, hi) {
            consider(&key, ctx, &mut out, &mut seen);
        }
    }
    for key in &cover.probes {
        consider(key, ctx, &mut out, &mut seen);
    }
    out
}
