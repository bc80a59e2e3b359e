// ═══════════════════════════════════════════════════════════════════════════════
// FILE: tetree.rs | CORE/SFC_ENGINE/src/key/tetree.rs
// PURPOSE: Tetrahedral TM-SFC keys over the S0-S5 cube decomposition
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// Every grid cell splits into six characteristic tetrahedra S0..S5 (the Kuhn
// decomposition: one simplex per ordering of the cell-local coordinates).
// Refining a simplex through vertex midpoints yields eight children that are
// themselves characteristic simplices of the eight half-cells, so the whole
// hierarchy is driven by two 6×8 tables: which sub-cell each child occupies
// and which type it gets. The inverse table makes the parent chain a pure
// table walk.
//
// A key carries the full TM index: six bits per level, the high three being
// the sub-cell position and the low three the simplex type. The type at a
// level is NOT derivable from coordinates alone: equal coordinates and level
// with different type chains are different keys. Keys compare by
// (tm bits, level, type), which keeps each subtree contiguous.
//
// Level 0 is special: the canonical root (type 0) stands for the whole cube,
// and the five remaining level-0 simplex families exist only as traversal
// seeds and `parent()` results for chains that do not reach the canonical
// root.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use glam::Vec3;

use crate::domain::{cell_extent, check_level, in_domain, quantize, MAX_COORD, MAX_LEVEL};
use crate::geometry::{Aabb, Tetrahedron};
use crate::key::cache::KeyCache;
use crate::key::{KeyError, SpatialKey};
use crate::range_plan::{ancestor_probes, cover_level, grid_range, merge_intervals, RegionCover};

/// Axis visit order of each simplex type: the type-`t` simplex of a cell is
/// the chain anchor → +axis[0] → +axis[1] → +axis[2].
pub const SIMPLEX_AXES: [[usize; 3]; 6] = [
    [0, 2, 1], // S0: x, z, y
    [0, 1, 2], // S1: x, y, z
    [1, 2, 0], // S2: y, z, x
    [2, 1, 0], // S3: z, y, x
    [2, 0, 1], // S4: z, x, y
    [1, 0, 2], // S5: y, x, z
];

/// Sub-cell (cube id, x|y<<1|z<<2) of child `i` of a type-`t` simplex
pub const CHILD_CUBE: [[u8; 8]; 6] = [
    [0, 1, 1, 1, 5, 5, 5, 7],
    [0, 1, 1, 1, 3, 3, 3, 7],
    [0, 2, 2, 2, 6, 6, 6, 7],
    [0, 4, 4, 4, 6, 6, 6, 7],
    [0, 4, 4, 4, 5, 5, 5, 7],
    [0, 2, 2, 2, 3, 3, 3, 7],
];

/// Type of child `i` of a type-`t` simplex
pub const CHILD_TYPE: [[u8; 8]; 6] = [
    [0, 0, 3, 4, 0, 5, 1, 0],
    [1, 1, 2, 5, 1, 4, 0, 1],
    [2, 2, 4, 3, 2, 1, 5, 2],
    [3, 3, 5, 2, 3, 0, 4, 3],
    [4, 4, 1, 0, 4, 2, 3, 4],
    [5, 5, 0, 1, 5, 3, 2, 5],
];

/// Parent type of a child simplex, indexed by the child's sub-cell id and
/// type. Inverse of (CHILD_CUBE, CHILD_TYPE): every (cube, type) pair occurs
/// exactly once as a child across the six parent types.
pub const PARENT_TYPE: [[u8; 6]; 8] = [
    [0, 1, 2, 3, 4, 5],
    [0, 1, 1, 0, 0, 1],
    [5, 5, 2, 2, 2, 5],
    [1, 1, 5, 5, 1, 5],
    [4, 4, 3, 3, 4, 3],
    [0, 0, 4, 4, 4, 0],
    [3, 2, 2, 3, 3, 2],
    [0, 1, 2, 3, 4, 5],
];

const TYPE_COUNT: u8 = 6;

#[inline]
fn digit_shift(level: u8) -> u32 {
    6 * (MAX_LEVEL - level) as u32
}

/// TM-SFC key of one tetrahedral cell
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TetKey {
    bits: u128,
    anchor: [u32; 3],
    level: u8,
    ty: u8,
}

impl PartialEq for TetKey {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits && self.level == other.level && self.ty == other.ty
    }
}

impl Eq for TetKey {}

impl Hash for TetKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits.hash(state);
        self.level.hash(state);
        self.ty.hash(state);
    }
}

impl PartialOrd for TetKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TetKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Type breaks ties only among level-0 seeds; everywhere else it is
        // determined by the last TM digit.
        self.bits
            .cmp(&other.bits)
            .then(self.level.cmp(&other.level))
            .then(self.ty.cmp(&other.ty))
    }
}

impl TetKey {
    /// The canonical root: type 0, whole domain
    pub const ROOT: Self = Self {
        bits: 0,
        anchor: [0; 3],
        level: 0,
        ty: 0,
    };

    /// Level-0 seed of a simplex family. Only type 0 is the engine root; the
    /// others appear as `parent()` results and traversal seeds.
    pub fn family_seed(ty: u8) -> Self {
        debug_assert!(ty < TYPE_COUNT);
        Self {
            bits: 0,
            anchor: [0; 3],
            level: 0,
            ty,
        }
    }

    /// Raw 126-bit TM index (six bits per refined level, high-aligned)
    #[inline]
    pub fn tm_bits(&self) -> u128 {
        self.bits
    }

    /// Compact 64-bit TM form, available through level 10
    pub fn compact(&self) -> Option<u64> {
        if self.level > 10 {
            return None;
        }
        let digits = (self.bits >> digit_shift(10)) as u64; // 60 bits
        Some((digits << 4) | self.level as u64)
    }

    /// Sub-cell id of this key within its parent cell
    #[inline]
    fn cube_id(&self) -> u8 {
        if self.level == 0 {
            return 0;
        }
        (((self.bits >> digit_shift(self.level)) >> 3) & 0b111) as u8
    }

    /// Build a key from decoded parts, reconstructing the ancestor type chain
    /// by walking up through the transition tables (O(level)).
    pub fn from_parts(anchor: [u32; 3], level: u8, ty: u8) -> Result<Self, KeyError> {
        check_level(level)?;
        if ty >= TYPE_COUNT {
            return Err(KeyError::InvalidType { ty, level });
        }
        let e = cell_extent(level);
        for &c in &anchor {
            if c >= MAX_COORD || c % e != 0 {
                return Err(KeyError::InvalidLevel { level });
            }
        }
        let mut bits = 0u128;
        let mut cur_ty = ty;
        for l in (1..=level).rev() {
            let el = cell_extent(l);
            let cid = (((anchor[0] / el) & 1)
                | (((anchor[1] / el) & 1) << 1)
                | (((anchor[2] / el) & 1) << 2)) as u8;
            let digit = (((cid as u128) << 3) | cur_ty as u128) << digit_shift(l);
            bits |= digit;
            cur_ty = PARENT_TYPE[cid as usize][cur_ty as usize];
        }
        Ok(Self {
            bits,
            anchor,
            level,
            ty,
        })
    }

    /// `from_parts` with chain memoization in a key cache
    pub fn from_parts_cached(
        anchor: [u32; 3],
        level: u8,
        ty: u8,
        cache: &KeyCache,
    ) -> Result<Self, KeyError> {
        if let Some(bits) = cache.lookup_chain(anchor, level, ty) {
            return Ok(Self {
                bits,
                anchor,
                level,
                ty,
            });
        }
        let key = Self::from_parts(anchor, level, ty)?;
        cache.store_chain(anchor, level, ty, key.bits);
        Ok(key)
    }

    /// Simplex type whose region of the unit cell contains the fractional
    /// point `f` (first match in type order; total over [0, 1)³)
    fn rank_type(f: Vec3) -> u8 {
        for (t, axes) in SIMPLEX_AXES.iter().enumerate() {
            if f[axes[0]] >= f[axes[1]] && f[axes[1]] >= f[axes[2]] {
                return t as u8;
            }
        }
        unreachable!("coordinate ranking is total")
    }

    /// Geometric simplex of this key. For level-0 keys this is the family
    /// simplex of the whole cube; note the canonical root additionally acts
    /// as an absorbing cell for `contains`.
    pub fn simplex(&self) -> Tetrahedron {
        let e = cell_extent(self.level) as f32;
        let axes = SIMPLEX_AXES[self.ty as usize];
        let mut v = Vec3::new(
            self.anchor[0] as f32,
            self.anchor[1] as f32,
            self.anchor[2] as f32,
        );
        let mut verts = [v; 4];
        for (slot, &axis) in axes.iter().enumerate() {
            v[axis] += e;
            verts[slot + 1] = v;
        }
        Tetrahedron::new(verts)
    }

    fn vertices_int(&self) -> [[u32; 3]; 4] {
        let e = cell_extent(self.level);
        let axes = SIMPLEX_AXES[self.ty as usize];
        let mut v = self.anchor;
        let mut verts = [v; 4];
        for (slot, &axis) in axes.iter().enumerate() {
            v[axis] += e;
            verts[slot + 1] = v;
        }
        verts
    }
}

impl SpatialKey for TetKey {
    const NAME: &'static str = "tetree";

    fn root() -> Self {
        Self::ROOT
    }

    fn roots() -> Vec<Self> {
        (0..TYPE_COUNT).map(Self::family_seed).collect()
    }

    #[inline]
    fn level(&self) -> u8 {
        self.level
    }

    fn parent(&self) -> Option<Self> {
        if self.level == 0 {
            return None;
        }
        let cid = self.cube_id();
        let parent_ty = PARENT_TYPE[cid as usize][self.ty as usize];
        let parent_level = self.level - 1;
        let pe = cell_extent(parent_level);
        Some(Self {
            bits: self.bits & !(0x3Fu128 << digit_shift(self.level)),
            anchor: [
                self.anchor[0] & !(pe - 1),
                self.anchor[1] & !(pe - 1),
                self.anchor[2] & !(pe - 1),
            ],
            level: parent_level,
            ty: parent_ty,
        })
    }

    fn child(&self, i: u8) -> Option<Self> {
        if self.level >= MAX_LEVEL || i >= 8 {
            return None;
        }
        let cid = CHILD_CUBE[self.ty as usize][i as usize];
        let child_ty = CHILD_TYPE[self.ty as usize][i as usize];
        let level = self.level + 1;
        let e = cell_extent(level);
        let anchor = [
            self.anchor[0] + (cid as u32 & 1) * e,
            self.anchor[1] + ((cid as u32 >> 1) & 1) * e,
            self.anchor[2] + ((cid as u32 >> 2) & 1) * e,
        ];
        let digit = (((cid as u128) << 3) | child_ty as u128) << digit_shift(level);
        Some(Self {
            bits: self.bits | digit,
            anchor,
            level,
            ty: child_ty,
        })
    }

    fn encode(point: Vec3, level: u8) -> Result<Self, KeyError> {
        Self::encode_with(point, level, KeyCache::process_default())
    }

    fn encode_with(point: Vec3, level: u8, cache: &KeyCache) -> Result<Self, KeyError> {
        let anchor = quantize(point, level)?;
        if level == 0 {
            return Ok(Self::ROOT);
        }
        let e = cell_extent(level) as f32;
        let origin = Vec3::new(anchor[0] as f32, anchor[1] as f32, anchor[2] as f32);
        let f = ((point - origin) / e).clamp(Vec3::ZERO, Vec3::ONE);
        let ty = Self::rank_type(f);
        Self::from_parts_cached(anchor, level, ty, cache)
    }

    #[inline]
    fn anchor(&self) -> [u32; 3] {
        self.anchor
    }

    fn cell_keys(anchor: [u32; 3], level: u8) -> Vec<Self> {
        let cache = KeyCache::process_default();
        (0..TYPE_COUNT)
            .filter_map(|ty| Self::from_parts_cached(anchor, level, ty, cache).ok())
            .collect()
    }

    #[inline]
    fn type_id(&self) -> u8 {
        self.ty
    }

    fn cell_bounds(&self) -> Aabb {
        // A characteristic simplex touches all eight corners' span of its
        // cell, so the enclosing box is the cell cube itself.
        let origin = Vec3::new(
            self.anchor[0] as f32,
            self.anchor[1] as f32,
            self.anchor[2] as f32,
        );
        Aabb::cube(origin, cell_extent(self.level) as f32)
    }

    fn contains(&self, point: Vec3) -> bool {
        if self.level == 0 && self.ty == 0 {
            return in_domain(point); // absorbing root
        }
        let Ok(cell) = quantize(point, self.level) else {
            return false;
        };
        if cell != self.anchor {
            return false;
        }
        let e = cell_extent(self.level) as f32;
        let origin = Vec3::new(
            self.anchor[0] as f32,
            self.anchor[1] as f32,
            self.anchor[2] as f32,
        );
        let f = ((point - origin) / e).clamp(Vec3::ZERO, Vec3::ONE);
        let axes = SIMPLEX_AXES[self.ty as usize];
        f[axes[0]] >= f[axes[1]] && f[axes[1]] >= f[axes[2]]
    }

    fn sfc_range(&self) -> (Self, Self) {
        let suffix = if self.level == MAX_LEVEL {
            0
        } else {
            (1u128 << digit_shift(self.level)) - 1
        };
        let end = Self {
            bits: self.bits | suffix,
            anchor: self.anchor,
            level: MAX_LEVEL,
            ty: TYPE_COUNT - 1,
        };
        (*self, end)
    }

    fn validate(&self) -> Result<(), KeyError> {
        check_level(self.level)?;
        if self.ty >= TYPE_COUNT {
            return Err(KeyError::InvalidType {
                ty: self.ty,
                level: self.level,
            });
        }
        if self.level == 0 {
            // the root must be type 0; other families are internal seeds
            if self.ty != 0 || self.bits != 0 || self.anchor != [0; 3] {
                return Err(KeyError::InvalidType {
                    ty: self.ty,
                    level: self.level,
                });
            }
            return Ok(());
        }
        // the type chain must match what the transition tables derive from
        // the coordinates and leaf type
        let rebuilt = Self::from_parts(self.anchor, self.level, self.ty)?;
        if rebuilt.bits != self.bits {
            return Err(KeyError::InvalidType {
                ty: self.ty,
                level: self.level,
            });
        }
        Ok(())
    }

    fn region_cover(region: &Aabb) -> RegionCover<Self> {
        let level = cover_level(region);
        let Some((lo, hi)) = grid_range(region, level) else {
            return RegionCover::default();
        };
        if level == 0 {
            // whole-domain query: one interval spanning every key
            let root = Self::ROOT;
            let (_, end) = Self::family_seed(TYPE_COUNT - 1).sfc_range();
            return RegionCover {
                intervals: vec![(root, end)],
                probes: Vec::new(),
            };
        }
        let e = cell_extent(level);
        let cache = KeyCache::process_default();
        let mut intervals = Vec::new();
        let mut starts = Vec::new();
        for x in lo[0]..=hi[0] {
            for y in lo[1]..=hi[1] {
                for z in lo[2]..=hi[2] {
                    let anchor = [x * e, y * e, z * e];
                    // grid cells enumerate the curve; each carries all six
                    // simplex types
                    for ty in 0..TYPE_COUNT {
                        if let Ok(key) = Self::from_parts_cached(anchor, level, ty, cache) {
                            intervals.push(key.sfc_range());
                            starts.push(key);
                        }
                    }
                }
            }
        }
        RegionCover {
            intervals: merge_intervals(intervals),
            probes: ancestor_probes(starts),
        }
    }

    fn face_count(&self) -> u8 {
        4
    }

    fn face_neighbor(&self, face: u8) -> Option<Self> {
        if face >= 4 || self.level == 0 {
            return None;
        }
        let verts = self.vertices_int();
        let face_verts: Vec<[u32; 3]> = verts
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != face as usize)
            .map(|(_, v)| *v)
            .collect();
        self.adjacent_candidates()
            .into_iter()
            .find(|cand| {
                let cv = cand.vertices_int();
                face_verts.iter().all(|fv| cv.contains(fv))
            })
    }

    fn cell_vertices(&self) -> Vec<[u32; 3]> {
        self.vertices_int().to_vec()
    }

    fn adjacent_candidates(&self) -> Vec<Self> {
        if self.level == 0 {
            return (0..TYPE_COUNT)
                .filter(|&t| t != self.ty)
                .map(Self::family_seed)
                .collect();
        }
        let e = cell_extent(self.level) as i64;
        let max = MAX_COORD as i64;
        let cache = KeyCache::process_default();
        let mut out = Vec::new();
        for dz in -1i64..=1 {
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let nx = self.anchor[0] as i64 + dx * e;
                    let ny = self.anchor[1] as i64 + dy * e;
                    let nz = self.anchor[2] as i64 + dz * e;
                    if nx < 0 || ny < 0 || nz < 0 || nx >= max || ny >= max || nz >= max {
                        continue;
                    }
                    let anchor = [nx as u32, ny as u32, nz as u32];
                    for ty in 0..TYPE_COUNT {
                        if anchor == self.anchor && ty == self.ty {
                            continue;
                        }
                        if let Ok(key) =
                            Self::from_parts_cached(anchor, self.level, ty, cache)
                        {
                            out.push(key);
                        }
                    }
                }
            }
        }
        out
    }
}
