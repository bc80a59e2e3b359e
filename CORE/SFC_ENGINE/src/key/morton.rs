// ═══════════════════════════════════════════════════════════════════════════════
// FILE: morton.rs | CORE/SFC_ENGINE/src/key/morton.rs
// PURPOSE: Morton (Z-order) keys for the cubic octree variant
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// A Morton key stores the 63-bit Z-order code of its cell anchor at the
// deepest resolution plus the refinement level. Keys compare by
// (code, level), which lays every subtree out as one contiguous key
// interval: a parent sorts immediately before its first descendant.

use serde::{Deserialize, Serialize};

use glam::Vec3;

use crate::domain::{cell_extent, check_level, quantize, MAX_COORD, MAX_LEVEL};
use crate::geometry::Aabb;
use crate::key::{KeyError, SpatialKey};
use crate::range_plan::{
    ancestor_probes, cover_level, deinterleave3, grid_range, interleave3, zorder_runs, RegionCover,
};

/// Z-order key: (level, interleaved x/y/z) with the code padded to the
/// deepest level
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MortonKey {
    code: u64,
    level: u8,
}

impl MortonKey {
    pub const ROOT: Self = Self { code: 0, level: 0 };

    /// Key from a cell anchor in deepest-level grid units. The anchor must be
    /// aligned to the cell grid of `level`.
    pub fn from_anchor(anchor: [u32; 3], level: u8) -> Self {
        debug_assert!(level <= MAX_LEVEL);
        debug_assert!(anchor.iter().all(|&c| c % cell_extent(level) == 0));
        Self {
            code: interleave3(anchor),
            level,
        }
    }

    /// Raw 63-bit Z-order code (anchor at deepest resolution)
    #[inline]
    pub fn code(&self) -> u64 {
        self.code
    }

    /// Bit position of this key's own child-index group in the code
    #[inline]
    fn child_shift(level: u8) -> u32 {
        3 * (MAX_LEVEL - level) as u32
    }

    /// Index of this key among its parent's children
    #[inline]
    pub fn child_index(&self) -> u8 {
        if self.level == 0 {
            return 0;
        }
        ((self.code >> Self::child_shift(self.level)) & 0b111) as u8
    }

    #[inline]
    fn suffix_mask(level: u8) -> u64 {
        (1u64 << Self::child_shift(level)) - 1
    }
}

impl SpatialKey for MortonKey {
    const NAME: &'static str = "octree";

    fn root() -> Self {
        Self::ROOT
    }

    #[inline]
    fn level(&self) -> u8 {
        self.level
    }

    fn parent(&self) -> Option<Self> {
        if self.level == 0 {
            return None;
        }
        let cleared = self.code & !(0b111u64 << Self::child_shift(self.level));
        Some(Self {
            code: cleared,
            level: self.level - 1,
        })
    }

    fn child(&self, i: u8) -> Option<Self> {
        if self.level >= MAX_LEVEL || i >= 8 {
            return None;
        }
        let level = self.level + 1;
        Some(Self {
            code: self.code | ((i as u64) << Self::child_shift(level)),
            level,
        })
    }

    fn encode(point: Vec3, level: u8) -> Result<Self, KeyError> {
        let anchor = quantize(point, level)?;
        Ok(Self::from_anchor(anchor, level))
    }

    #[inline]
    fn anchor(&self) -> [u32; 3] {
        deinterleave3(self.code)
    }

    fn cell_keys(anchor: [u32; 3], level: u8) -> Vec<Self> {
        if level > MAX_LEVEL
            || anchor
                .iter()
                .any(|&c| c >= MAX_COORD || c % cell_extent(level) != 0)
        {
            return Vec::new();
        }
        vec![Self::from_anchor(anchor, level)]
    }

    fn cell_bounds(&self) -> Aabb {
        let a = self.anchor();
        let origin = Vec3::new(a[0] as f32, a[1] as f32, a[2] as f32);
        Aabb::cube(origin, cell_extent(self.level) as f32)
    }

    fn contains(&self, point: Vec3) -> bool {
        let a = self.anchor();
        let e = cell_extent(self.level) as f32;
        (0..3).all(|axis| {
            let lo = a[axis] as f32;
            point[axis] >= lo && point[axis] < lo + e
        })
    }

    fn sfc_range(&self) -> (Self, Self) {
        let end = Self {
            code: self.code | Self::suffix_mask(self.level),
            level: MAX_LEVEL,
        };
        (*self, end)
    }

    fn validate(&self) -> Result<(), KeyError> {
        check_level(self.level)?;
        if self.code & Self::suffix_mask(self.level) != 0 {
            // code carries bits below this key's resolution
            return Err(KeyError::InvalidLevel { level: self.level });
        }
        Ok(())
    }

    fn region_cover(region: &Aabb) -> RegionCover<Self> {
        let level = cover_level(region);
        let Some((lo, hi)) = grid_range(region, level) else {
            return RegionCover::default();
        };
        let shift = Self::child_shift(level);
        let mut intervals = Vec::new();
        let mut starts = Vec::new();
        for (run_lo, run_hi) in zorder_runs(lo, hi, level) {
            let first = Self {
                code: run_lo << shift,
                level,
            };
            let last = Self {
                code: run_hi << shift,
                level,
            };
            intervals.push((first, last.sfc_range().1));
            starts.push(first);
        }
        RegionCover {
            intervals,
            probes: ancestor_probes(starts),
        }
    }

    fn face_count(&self) -> u8 {
        6
    }

    fn face_neighbor(&self, face: u8) -> Option<Self> {
        let axis = (face / 2) as usize;
        let positive = face % 2 == 1;
        let e = cell_extent(self.level);
        let mut a = self.anchor();
        if positive {
            if a[axis] + e >= MAX_COORD {
                return None;
            }
            a[axis] += e;
        } else {
            if a[axis] < e {
                return None;
            }
            a[axis] -= e;
        }
        Some(Self::from_anchor(a, self.level))
    }

    fn cell_vertices(&self) -> Vec<[u32; 3]> {
        let a = self.anchor();
        let e = cell_extent(self.level);
        let mut verts = Vec::with_capacity(8);
        for dz in [0, e] {
            for dy in [0, e] {
                for dx in [0, e] {
                    verts.push([a[0] + dx, a[1] + dy, a[2] + dz]);
                }
            }
        }
        verts
    }

    fn adjacent_candidates(&self) -> Vec<Self> {
        let e = cell_extent(self.level) as i64;
        let a = self.anchor();
        let mut out = Vec::with_capacity(26);
        for dz in -1i64..=1 {
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    let nx = a[0] as i64 + dx * e;
                    let ny = a[1] as i64 + dy * e;
                    let nz = a[2] as i64 + dz * e;
                    let max = MAX_COORD as i64;
                    if nx < 0 || ny < 0 || nz < 0 || nx >= max || ny >= max || nz >= max {
                        continue;
                    }
                    out.push(Self::from_anchor([nx as u32, ny as u32, nz as u32], self.level));
                }
            }
        }
        out
    }
}
