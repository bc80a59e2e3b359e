// ═══════════════════════════════════════════════════════════════════════════════
// FILE: mod.rs | CORE/SFC_ENGINE/src/key/mod.rs
// PURPOSE: SpatialKey abstraction shared by the Morton, tetrahedral, and prism
//          index variants
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// A key names one cell of a hierarchical decomposition of the [0, 2^21)³ cube.
// Keys are immutable values: totally ordered (subtrees form contiguous key
// intervals), hashable, and cheap to copy. The engine is generic over this
// trait; variants differ only in how cells are shaped and how the curve index
// is derived.

use std::fmt::Debug;
use std::hash::Hash;

use glam::Vec3;
use thiserror::Error;

use crate::geometry::Aabb;
use crate::range_plan::RegionCover;

use cache::KeyCache;

pub mod cache;
pub mod morton;
pub mod prism;
pub mod tetree;

/// Key derivation and validation failures
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum KeyError {
    #[error("position ({}, {}, {}) outside the indexable domain", .point.x, .point.y, .point.z)]
    OutOfDomain { point: Vec3 },
    #[error("refinement level {level} not supported")]
    InvalidLevel { level: u8 },
    #[error("cell type {ty} invalid at level {level}")]
    InvalidType { ty: u8, level: u8 },
}

/// Adjacency kind for neighbor queries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TopologyKind {
    Face,
    Edge,
    Vertex,
}

/// Level relationship of a neighbor relative to the queried key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelRelation {
    SameLevel,
    ParentLevel,
    ChildLevel,
}

/// One cell of a space-filling-curve keyed spatial decomposition.
///
/// Implementations guarantee:
/// - `parent(child(k, i)) == k` for every valid child index
/// - children tile their parent cell exactly
/// - the key interval `sfc_range(k)` covers `k` and every descendant of `k`
pub trait SpatialKey:
    Copy + Clone + Eq + Ord + Hash + Debug + Send + Sync + 'static
{
    /// Variant name for diagnostics
    const NAME: &'static str;

    /// The canonical level-0 key covering the whole domain
    fn root() -> Self;

    /// All level-0 traversal seeds. Cubic variants have exactly one; simplex
    /// variants expose one seed per root simplex family so every reachable
    /// key has a seed ancestor.
    fn roots() -> Vec<Self> {
        vec![Self::root()]
    }

    fn level(&self) -> u8;

    #[inline]
    fn is_root(&self) -> bool {
        self.level() == 0
    }

    /// Parent key, `None` for level 0
    fn parent(&self) -> Option<Self>;

    /// Number of children of this key
    fn child_count(&self) -> u8 {
        8
    }

    /// Child `i` in canonical child order, `None` past the deepest level or
    /// for an out-of-range index
    fn child(&self, i: u8) -> Option<Self>;

    fn children(&self) -> Vec<Self> {
        (0..self.child_count()).filter_map(|i| self.child(i)).collect()
    }

    /// Derive the key of the cell containing `point` at `level`
    fn encode(point: Vec3, level: u8) -> Result<Self, KeyError>;

    /// `encode` with an explicit key cache. Variants with O(1) derivation
    /// ignore the cache.
    fn encode_with(point: Vec3, level: u8, cache: &KeyCache) -> Result<Self, KeyError> {
        let _ = cache;
        Self::encode(point, level)
    }

    /// Cell origin in deepest-level grid units
    fn anchor(&self) -> [u32; 3];

    /// All keys occupying the grid cell at `anchor`/`level`: one for cubic
    /// variants, one per simplex type otherwise. Invalid anchors yield an
    /// empty list.
    fn cell_keys(anchor: [u32; 3], level: u8) -> Vec<Self>;

    /// Variant-specific cell type (simplex orientation); 0 for cubic cells
    fn type_id(&self) -> u8 {
        0
    }

    /// Axis-aligned bounds of the cell (exact for boxes, enclosing for
    /// simplex cells)
    fn cell_bounds(&self) -> Aabb;

    /// Exact geometric containment of a point in this cell
    fn contains(&self, point: Vec3) -> bool;

    /// Closed key interval `[self, max]` covering this key and all
    /// descendants
    fn sfc_range(&self) -> (Self, Self);

    /// Structural validity: alignment, level range, and (for typed variants)
    /// consistency of the type chain with the transition tables
    fn validate(&self) -> Result<(), KeyError>;

    /// Key intervals covering a query region, plus coarse ancestor keys that
    /// must be probed individually because they straddle interval starts
    fn region_cover(region: &Aabb) -> RegionCover<Self>;

    // ── topology ────────────────────────────────────────────────────────────

    /// Number of faces of this cell shape
    fn face_count(&self) -> u8;

    /// Same-level neighbor across face `face`, `None` on the domain boundary
    fn face_neighbor(&self, face: u8) -> Option<Self>;

    /// Corner points of the cell in deepest-level grid units; shared-vertex
    /// counting against these drives the generic neighbor search
    fn cell_vertices(&self) -> Vec<[u32; 3]>;

    /// Same-level keys in the immediate surrounding of this cell that could
    /// share a face, edge, or vertex with it
    fn adjacent_candidates(&self) -> Vec<Self>;

    /// Same-level neighbors of the requested adjacency kind.
    ///
    /// Uniform rule over shared cell corners: three or more shared corners is
    /// face adjacency, exactly two is edge adjacency, exactly one is vertex
    /// adjacency. (Box pairs can share 0, 1, 2, or 4 corners, so the rule is
    /// exact for every variant.)
    fn neighbors(&self, kind: TopologyKind) -> Vec<Self> {
        let own: Vec<[u32; 3]> = self.cell_vertices();
        let mut out = Vec::new();
        for cand in self.adjacent_candidates() {
            if cand == *self {
                continue;
            }
            let shared = cand
                .cell_vertices()
                .iter()
                .filter(|v| own.contains(v))
                .count();
            let matches = match kind {
                TopologyKind::Face => shared >= 3,
                TopologyKind::Edge => shared == 2,
                TopologyKind::Vertex => shared == 1,
            };
            if matches {
                out.push(cand);
            }
        }
        out
    }

    /// True when some face of this cell lies on the domain boundary
    fn on_domain_boundary(&self) -> bool {
        (0..self.face_count()).any(|f| self.face_neighbor(f).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_error_display() {
        let err = KeyError::InvalidLevel { level: 40 };
        assert!(err.to_string().contains("40"));
    }
}
