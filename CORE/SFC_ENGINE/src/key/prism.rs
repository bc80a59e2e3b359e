// ═══════════════════════════════════════════════════════════════════════════════
// FILE: prism.rs | CORE/SFC_ENGINE/src/key/prism.rs
// PURPOSE: Composite prism keys - triangular base SFC × linear height
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// A prism cell is a right triangle in x/y extruded along z. The triangle
// hierarchy is the 2D analog of the tetrahedral one: each square splits into
// two characteristic triangles (type 0: fx ≥ fy, type 1: fy ≥ fx), and
// midpoint refinement of a triangle yields three corner children of the same
// type plus one center child of the flipped type, each in one quadrant. The
// line hierarchy is a plain bit shift of z.
//
// Triangle and line keys always refine in lockstep; the composite child
// index is tri_child + 4 * line_child, giving 4 × 2 = 8 children per prism.
// Keys compare by (composite code, level, triangle type).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use glam::Vec3;

use crate::domain::{cell_extent, check_level, in_domain, quantize, MAX_COORD, MAX_LEVEL};
use crate::geometry::Aabb;
use crate::key::{KeyError, SpatialKey};
use crate::range_plan::{ancestor_probes, cover_level, grid_range, merge_intervals, RegionCover};

/// Quadrant (x | y<<1) of triangle child `i` of a type-`t` triangle
pub const TRI_CHILD_CELL: [[u8; 4]; 2] = [[0, 1, 1, 3], [0, 2, 2, 3]];

/// Type of triangle child `i` of a type-`t` triangle
pub const TRI_CHILD_TYPE: [[u8; 4]; 2] = [[0, 0, 1, 0], [1, 1, 0, 1]];

/// Parent type by (quadrant, child type); inverse of the child tables
pub const TRI_PARENT_TYPE: [[u8; 2]; 4] = [[0, 1], [0, 0], [1, 1], [0, 1]];

#[inline]
fn digit_shift(level: u8) -> u32 {
    3 * (MAX_LEVEL - level) as u32
}

/// Triangular-SFC component of a prism key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriKey {
    pub x: u32,
    pub y: u32,
    pub level: u8,
    pub ty: u8,
}

impl TriKey {
    pub fn new(x: u32, y: u32, level: u8, ty: u8) -> Self {
        Self { x, y, level, ty }
    }

    /// 2D corner points in grid units
    pub fn vertices(&self) -> [[u32; 2]; 3] {
        let e = cell_extent(self.level);
        if self.ty == 0 {
            [
                [self.x, self.y],
                [self.x + e, self.y],
                [self.x + e, self.y + e],
            ]
        } else {
            [
                [self.x, self.y],
                [self.x, self.y + e],
                [self.x + e, self.y + e],
            ]
        }
    }
}

/// Linear (height) component of a prism key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub z: u32,
    pub level: u8,
}

impl LineKey {
    pub fn new(z: u32, level: u8) -> Self {
        Self { z, level }
    }
}

/// Composite prism key
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PrismKey {
    tri: TriKey,
    line: LineKey,
    code: u64,
}

impl PartialEq for PrismKey {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
            && self.tri.level == other.tri.level
            && self.tri.ty == other.tri.ty
    }
}

impl Eq for PrismKey {}

impl Hash for PrismKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
        self.tri.level.hash(state);
        self.tri.ty.hash(state);
    }
}

impl PartialOrd for PrismKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PrismKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // type only separates the two level-0 seeds; deeper keys carry it in
        // the code
        self.code
            .cmp(&other.code)
            .then(self.tri.level.cmp(&other.tri.level))
            .then(self.tri.ty.cmp(&other.tri.ty))
    }
}

impl PrismKey {
    pub const ROOT: Self = Self {
        tri: TriKey {
            x: 0,
            y: 0,
            level: 0,
            ty: 0,
        },
        line: LineKey { z: 0, level: 0 },
        code: 0,
    };

    /// Compose a prism key from its components. Level synchronization between
    /// the triangle and line parts is a hard invariant.
    pub fn new(tri: TriKey, line: LineKey) -> Result<Self, KeyError> {
        if tri.level != line.level {
            return Err(KeyError::InvalidLevel { level: line.level });
        }
        Self::from_parts([tri.x, tri.y, line.z], tri.level, tri.ty)
    }

    /// Level-0 seed of one triangle family
    pub fn family_seed(ty: u8) -> Self {
        debug_assert!(ty < 2);
        Self {
            tri: TriKey {
                x: 0,
                y: 0,
                level: 0,
                ty,
            },
            line: LineKey { z: 0, level: 0 },
            code: 0,
        }
    }

    #[inline]
    pub fn tri(&self) -> TriKey {
        self.tri
    }

    #[inline]
    pub fn line(&self) -> LineKey {
        self.line
    }

    /// Composite curve code (three bits per refined level, high-aligned)
    #[inline]
    pub fn code(&self) -> u64 {
        self.code
    }

    /// Rebuild a key from decoded parts, deriving the triangle type chain by
    /// walking up through the triangle tables.
    pub fn from_parts(anchor: [u32; 3], level: u8, ty: u8) -> Result<Self, KeyError> {
        check_level(level)?;
        if ty >= 2 {
            return Err(KeyError::InvalidType { ty, level });
        }
        let e = cell_extent(level);
        for &c in &anchor {
            if c >= MAX_COORD || c % e != 0 {
                return Err(KeyError::InvalidLevel { level });
            }
        }
        let mut code = 0u64;
        let mut cur_ty = ty;
        for l in (1..=level).rev() {
            let el = cell_extent(l);
            let quadrant = (((anchor[0] / el) & 1) | (((anchor[1] / el) & 1) << 1)) as u8;
            let line_bit = ((anchor[2] / el) & 1) as u8;
            let parent_ty = TRI_PARENT_TYPE[quadrant as usize][cur_ty as usize];
            let tri_child = (0..4)
                .find(|&j| {
                    TRI_CHILD_CELL[parent_ty as usize][j] == quadrant
                        && TRI_CHILD_TYPE[parent_ty as usize][j] == cur_ty
                })
                .expect("triangle tables are a bijection") as u8;
            let digit = (tri_child + 4 * line_bit) as u64;
            code |= digit << digit_shift(l);
            cur_ty = parent_ty;
        }
        Ok(Self {
            tri: TriKey {
                x: anchor[0],
                y: anchor[1],
                level,
                ty,
            },
            line: LineKey {
                z: anchor[2],
                level,
            },
            code,
        })
    }

    fn vertices_int(&self) -> [[u32; 3]; 6] {
        let e = cell_extent(self.tri.level);
        let tv = self.tri.vertices();
        let z0 = self.line.z;
        let z1 = self.line.z + e;
        [
            [tv[0][0], tv[0][1], z0],
            [tv[1][0], tv[1][1], z0],
            [tv[2][0], tv[2][1], z0],
            [tv[0][0], tv[0][1], z1],
            [tv[1][0], tv[1][1], z1],
            [tv[2][0], tv[2][1], z1],
        ]
    }
}

impl SpatialKey for PrismKey {
    const NAME: &'static str = "prism";

    fn root() -> Self {
        Self::ROOT
    }

    fn roots() -> Vec<Self> {
        vec![Self::family_seed(0), Self::family_seed(1)]
    }

    #[inline]
    fn level(&self) -> u8 {
        self.tri.level
    }

    fn parent(&self) -> Option<Self> {
        let level = self.tri.level;
        if level == 0 {
            return None;
        }
        let e = cell_extent(level);
        let quadrant =
            (((self.tri.x / e) & 1) | (((self.tri.y / e) & 1) << 1)) as usize;
        let parent_ty = TRI_PARENT_TYPE[quadrant][self.tri.ty as usize];
        let pe = cell_extent(level - 1);
        Some(Self {
            tri: TriKey {
                x: self.tri.x & !(pe - 1),
                y: self.tri.y & !(pe - 1),
                level: level - 1,
                ty: parent_ty,
            },
            line: LineKey {
                z: self.line.z & !(pe - 1),
                level: level - 1,
            },
            code: self.code & !(0b111u64 << digit_shift(level)),
        })
    }

    fn child(&self, i: u8) -> Option<Self> {
        let level = self.tri.level;
        if level >= MAX_LEVEL || i >= 8 {
            return None;
        }
        let tri_child = (i & 3) as usize;
        let line_child = (i >> 2) as u32;
        let quadrant = TRI_CHILD_CELL[self.tri.ty as usize][tri_child];
        let child_ty = TRI_CHILD_TYPE[self.tri.ty as usize][tri_child];
        let child_level = level + 1;
        let e = cell_extent(child_level);
        Some(Self {
            tri: TriKey {
                x: self.tri.x + (quadrant as u32 & 1) * e,
                y: self.tri.y + ((quadrant as u32 >> 1) & 1) * e,
                level: child_level,
                ty: child_ty,
            },
            line: LineKey {
                z: self.line.z + line_child * e,
                level: child_level,
            },
            code: self.code | ((i as u64) << digit_shift(child_level)),
        })
    }

    fn encode(point: Vec3, level: u8) -> Result<Self, KeyError> {
        let anchor = quantize(point, level)?;
        if level == 0 {
            return Ok(Self::ROOT);
        }
        let e = cell_extent(level) as f32;
        let fx = ((point.x - anchor[0] as f32) / e).clamp(0.0, 1.0);
        let fy = ((point.y - anchor[1] as f32) / e).clamp(0.0, 1.0);
        let ty = if fx >= fy { 0 } else { 1 };
        Self::from_parts(anchor, level, ty)
    }

    #[inline]
    fn anchor(&self) -> [u32; 3] {
        [self.tri.x, self.tri.y, self.line.z]
    }

    fn cell_keys(anchor: [u32; 3], level: u8) -> Vec<Self> {
        (0..2)
            .filter_map(|ty| Self::from_parts(anchor, level, ty).ok())
            .collect()
    }

    #[inline]
    fn type_id(&self) -> u8 {
        self.tri.ty
    }

    fn cell_bounds(&self) -> Aabb {
        let e = cell_extent(self.tri.level) as f32;
        let origin = Vec3::new(self.tri.x as f32, self.tri.y as f32, self.line.z as f32);
        Aabb::cube(origin, e)
    }

    fn contains(&self, point: Vec3) -> bool {
        if self.tri.level == 0 && self.tri.ty == 0 {
            return in_domain(point); // absorbing root
        }
        let Ok(anchor) = quantize(point, self.tri.level) else {
            return false;
        };
        if anchor != self.anchor() {
            return false;
        }
        let e = cell_extent(self.tri.level) as f32;
        let fx = ((point.x - self.tri.x as f32) / e).clamp(0.0, 1.0);
        let fy = ((point.y - self.tri.y as f32) / e).clamp(0.0, 1.0);
        if self.tri.ty == 0 {
            fx >= fy
        } else {
            fy >= fx
        }
    }

    fn sfc_range(&self) -> (Self, Self) {
        let suffix = if self.tri.level == MAX_LEVEL {
            0
        } else {
            (1u64 << digit_shift(self.tri.level)) - 1
        };
        let end = Self {
            tri: TriKey {
                x: self.tri.x,
                y: self.tri.y,
                level: MAX_LEVEL,
                ty: 1,
            },
            line: LineKey {
                z: self.line.z,
                level: MAX_LEVEL,
            },
            code: self.code | suffix,
        };
        (*self, end)
    }

    fn validate(&self) -> Result<(), KeyError> {
        check_level(self.tri.level)?;
        if self.tri.level != self.line.level {
            return Err(KeyError::InvalidLevel {
                level: self.line.level,
            });
        }
        if self.tri.ty >= 2 {
            return Err(KeyError::InvalidType {
                ty: self.tri.ty,
                level: self.tri.level,
            });
        }
        if self.tri.level == 0 {
            if self.tri.ty != 0 || self.code != 0 {
                return Err(KeyError::InvalidType {
                    ty: self.tri.ty,
                    level: 0,
                });
            }
            return Ok(());
        }
        let rebuilt = Self::from_parts(self.anchor(), self.tri.level, self.tri.ty)?;
        if rebuilt.code != self.code {
            return Err(KeyError::InvalidType {
                ty: self.tri.ty,
                level: self.tri.level,
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
            let (_, end) = Self::family_seed(1).sfc_range();
            return RegionCover {
                intervals: vec![(Self::ROOT, end)],
                probes: Vec::new(),
            };
        }
        let e = cell_extent(level);
        let mut intervals = Vec::new();
        let mut starts = Vec::new();
        for x in lo[0]..=hi[0] {
            for y in lo[1]..=hi[1] {
                for z in lo[2]..=hi[2] {
                    let anchor = [x * e, y * e, z * e];
                    for ty in 0..2 {
                        if let Ok(key) = Self::from_parts(anchor, level, ty) {
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
        5
    }

    /// Faces 0/1 are the lower/upper triangle caps; faces 2..4 are the quad
    /// faces opposite triangle vertex (face - 2).
    fn face_neighbor(&self, face: u8) -> Option<Self> {
        let level = self.tri.level;
        if face >= 5 || level == 0 {
            return None;
        }
        let e = cell_extent(level);
        match face {
            0 => {
                if self.line.z < e {
                    return None;
                }
                Self::from_parts(
                    [self.tri.x, self.tri.y, self.line.z - e],
                    level,
                    self.tri.ty,
                )
                .ok()
            }
            1 => {
                if self.line.z + e >= MAX_COORD {
                    return None;
                }
                Self::from_parts(
                    [self.tri.x, self.tri.y, self.line.z + e],
                    level,
                    self.tri.ty,
                )
                .ok()
            }
            _ => {
                let skip = (face - 2) as usize;
                let verts = self.vertices_int();
                // quad = the two triangle vertices not opposite this face, at
                // both heights
                let quad: Vec<[u32; 3]> = (0..3)
                    .filter(|&i| i != skip)
                    .flat_map(|i| [verts[i], verts[i + 3]])
                    .collect();
                self.adjacent_candidates().into_iter().find(|cand| {
                    cand.line.z == self.line.z && {
                        let cv = cand.vertices_int();
                        quad.iter().all(|v| cv.contains(v))
                    }
                })
            }
        }
    }

    fn cell_vertices(&self) -> Vec<[u32; 3]> {
        self.vertices_int().to_vec()
    }

    fn adjacent_candidates(&self) -> Vec<Self> {
        let level = self.tri.level;
        if level == 0 {
            return vec![Self::family_seed(1 - self.tri.ty)];
        }
        let e = cell_extent(level) as i64;
        let max = MAX_COORD as i64;
        let mut out = Vec::new();
        for dz in -1i64..=1 {
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let nx = self.tri.x as i64 + dx * e;
                    let ny = self.tri.y as i64 + dy * e;
                    let nz = self.line.z as i64 + dz * e;
                    if nx < 0 || ny < 0 || nz < 0 || nx >= max || ny >= max || nz >= max {
                        continue;
                    }
                    let anchor = [nx as u32, ny as u32, nz as u32];
                    for ty in 0..2 {
                        if anchor == self.anchor() && ty == self.tri.ty {
                            continue;
                        }
                        if let Ok(key) = Self::from_parts(anchor, level, ty) {
                            out.push(key);
                        }
                    }
                }
            }
        }
        out
    }
}
