// ═══════════════════════════════════════════════════════════════════════════════
// FILE: raycast.rs | CORE/SPATIAL_ENGINE/src/query/raycast.rs
// PURPOSE: Ray casting with front-to-back cell ordering
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// Cells are expanded from a min-heap keyed by ray entry parameter, so nodes
// come off front-to-back and `first` can stop at the earliest confirmed hit.
// Entities with bounds are slab-tested; point entities are treated as small
// spheres sized by their cell. Hits at the ray origin are excluded (t > 0).

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use glam::Vec3;

use super::{OrdF32, QueryCtx};
use crate::entity::EntityId;
use sfc_engine::{Ray, SpatialKey};

const ORIGIN_EPS: f32 = 1e-5;

/// What a cast should report
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RayCastMode {
    /// Nearest positive-t hit only
    First,
    /// Every hit, ordered by t
    All,
    /// Hits with t ≤ distance / |dir|, ordered by t
    WithinDistance(f32),
}

/// One ray intersection
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub id: EntityId,
    pub t: f32,
    pub point: Vec3,
}

pub(crate) fn ray_cast<K: SpatialKey, C>(
    ctx: &QueryCtx<'_, K, C>,
    ray: Ray,
    mode: RayCastMode,
) -> Vec<RayHit> {
    if ray.dir == Vec3::ZERO {
        return Vec::new();
    }
    let t_limit = match mode {
        RayCastMode::WithinDistance(d) => d / ray.dir.length(),
        _ => f32::INFINITY,
    };

    let mut frontier: BinaryHeap<Reverse<(OrdF32, K)>> = BinaryHeap::new();
    for root in K::roots() {
        let (lo, hi) = root.sfc_range();
        if !ctx.nodes.any_in_range(&lo, &hi) {
            continue;
        }
        if let Some((t_enter, _)) = ray.intersect_aabb(&root.cell_bounds()) {
            if t_enter <= t_limit {
                frontier.push(Reverse((OrdF32(t_enter), root)));
            }
        }
    }

    // smallest t per entity; an entity referenced from two cells reports once
    let mut hits: HashMap<EntityId, RayHit> = HashMap::new();
    let mut first_confirmed: f32 = f32::INFINITY;

    while let Some(Reverse((OrdF32(t_enter), key))) = frontier.pop() {
        if t_enter > t_limit {
            break;
        }
        if matches!(mode, RayCastMode::First) && t_enter > first_confirmed {
            // every later cell starts past the best hit
            break;
        }

        if let Some(node) = ctx.nodes.get(&key) {
            for id in node.snapshot() {
                let Some(record) = ctx.store.get(id) else {
                    continue;
                };
                let t = match record.bounds {
                    Some(bounds) => ray.intersect_aabb(&bounds).and_then(|(enter, exit)| {
                        if enter > ORIGIN_EPS {
                            Some(enter)
                        } else if exit > ORIGIN_EPS {
                            // origin inside the box: first boundary crossing
                            Some(exit)
                        } else {
                            None
                        }
                    }),
                    None => ray.intersect_sphere(record.point, ctx.point_radius(id)),
                };
                let Some(t) = t else { continue };
                if t <= ORIGIN_EPS || t > t_limit {
                    continue;
                }
                let hit = RayHit {
                    id,
                    t,
                    point: ray.at(t),
                };
                hits.entry(id)
                    .and_modify(|existing| {
                        if t < existing.t {
                            *existing = hit;
                        }
                    })
                    .or_insert(hit);
                if t < first_confirmed {
                    first_confirmed = t;
                }
            }
        }

        for child in key.children() {
            let (lo, hi) = child.sfc_range();
            if !ctx.nodes.any_in_range(&lo, &hi) {
                continue;
            }
            if let Some((enter, _)) = ray.intersect_aabb(&child.cell_bounds()) {
                if enter <= t_limit {
                    frontier.push(Reverse((OrdF32(enter), child)));
                }
            }
        }
    }

    let mut out: Vec<RayHit> = hits.into_values().collect();
    out.sort_by(|a, b| a.t.total_cmp(&b.t).then(a.id.cmp(&b.id)));
    if matches!(mode, RayCastMode::First) {
        out.truncate(1);
    }
    out
}
