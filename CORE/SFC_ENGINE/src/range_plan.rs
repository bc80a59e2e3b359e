// ═══════════════════════════════════════════════════════════════════════════════
// FILE: range_plan.rs | CORE/SFC_ENGINE/src/range_plan.rs
// PURPOSE: Z-order bit math and LITMAX/BIGMIN interval planning for range queries
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// A range query over an axis-aligned box is answered by covering the box with
// runs of consecutive curve positions at a chosen enumeration level. Gaps in
// the curve are skipped with BIGMIN (Tropf/Herzog): the smallest curve
// position greater than the current one that still lies inside the box.
// LITMAX is the mirror primitive for descending iteration.

use crate::domain::{cell_extent, MAX_COORD, MAX_EXTENT, MAX_LEVEL};
use crate::geometry::Aabb;
use crate::key::SpatialKey;

/// Result of covering a query region with key intervals.
///
/// `intervals` are closed key ranges to scan in curve order. `probes` are
/// individual coarse keys (ancestors of interval starts) that can hold
/// entities for the region but sort outside every interval.
#[derive(Clone, Debug)]
pub struct RegionCover<K> {
    pub intervals: Vec<(K, K)>,
    pub probes: Vec<K>,
}

impl<K> Default for RegionCover<K> {
    fn default() -> Self {
        Self {
            intervals: Vec::new(),
            probes: Vec::new(),
        }
    }
}

/// Spread the low 21 bits of `x` so consecutive input bits land three apart.
#[inline]
pub const fn spread3(x: u32) -> u64 {
    let mut x = (x as u64) & 0x1F_FFFF;
    x = (x | (x << 32)) & 0x1F_0000_0000_FFFF;
    x = (x | (x << 16)) & 0x1F_0000_FF00_00FF;
    x = (x | (x << 8)) & 0x100F_00F0_0F00_F00F;
    x = (x | (x << 4)) & 0x10C3_0C30_C30C_30C3;
    x = (x | (x << 2)) & 0x1249_2492_4924_9249;
    x
}

/// Inverse of `spread3`.
#[inline]
pub const fn compact3(x: u64) -> u32 {
    let mut x = x & 0x1249_2492_4924_9249;
    x = (x | (x >> 2)) & 0x10C3_0C30_C30C_30C3;
    x = (x | (x >> 4)) & 0x100F_00F0_0F00_F00F;
    x = (x | (x >> 8)) & 0x1F_0000_FF00_00FF;
    x = (x | (x >> 16)) & 0x1F_0000_0000_FFFF;
    x = (x | (x >> 32)) & 0x1F_FFFF;
    x as u32
}

/// Interleave three 21-bit coordinates into a 63-bit Z-order code.
/// Bit `i` of x lands at position `3i`, y at `3i + 1`, z at `3i + 2`.
#[inline]
pub const fn interleave3(c: [u32; 3]) -> u64 {
    spread3(c[0]) | (spread3(c[1]) << 1) | (spread3(c[2]) << 2)
}

/// Inverse of `interleave3`.
#[inline]
pub const fn deinterleave3(code: u64) -> [u32; 3] {
    [compact3(code), compact3(code >> 1), compact3(code >> 2)]
}

#[inline]
fn in_box(code: u64, min_cell: [u32; 3], max_cell: [u32; 3]) -> bool {
    let c = deinterleave3(code);
    c[0] >= min_cell[0]
        && c[0] <= max_cell[0]
        && c[1] >= min_cell[1]
        && c[1] <= max_cell[1]
        && c[2] >= min_cell[2]
        && c[2] <= max_cell[2]
}

/// Bits below position `i` that belong to the same interleaved dimension.
#[inline]
fn dim_mask_below(i: u32) -> u64 {
    let mut mask = 0u64;
    let mut j = i as i64 - 3;
    while j >= 0 {
        mask |= 1 << j;
        j -= 3;
    }
    mask
}

// LOAD operations from the Tropf/Herzog construction: force the bit at `i`
// while saturating the lower bits of the same dimension.
#[inline]
fn load_min(v: u64, i: u32) -> u64 {
    (v & !dim_mask_below(i)) | (1 << i)
}

#[inline]
fn load_max(v: u64, i: u32) -> u64 {
    (v & !(1 << i)) | dim_mask_below(i)
}

/// Smallest Z-order code strictly greater than `cur` whose cell lies inside
/// the box spanned by `minz`/`maxz` (codes of the box corners). `None` when
/// no such code exists. `bits` is the per-dimension bit width.
pub fn bigmin(cur: u64, minz: u64, maxz: u64, bits: u32) -> Option<u64> {
    let mut minz = minz;
    let mut maxz = maxz;
    let mut candidate = None;
    let mut i = bits * 3;
    while i > 0 {
        i -= 1;
        let bit = 1u64 << i;
        match ((cur & bit) != 0, (minz & bit) != 0, (maxz & bit) != 0) {
            (false, false, false) => {}
            (false, false, true) => {
                candidate = Some(load_min(minz, i));
                maxz = load_max(maxz, i);
            }
            (false, true, true) => return Some(minz),
            (true, false, false) => return candidate,
            (true, false, true) => {
                minz = load_min(minz, i);
            }
            (true, true, true) => {}
            // min above max in this dimension: the box is malformed
            (_, true, false) => return None,
        }
    }
    candidate
}

/// Largest Z-order code strictly smaller than `cur` whose cell lies inside
/// the box. Mirror of `bigmin`.
pub fn litmax(cur: u64, minz: u64, maxz: u64, bits: u32) -> Option<u64> {
    let mut minz = minz;
    let mut maxz = maxz;
    let mut candidate = None;
    let mut i = bits * 3;
    while i > 0 {
        i -= 1;
        let bit = 1u64 << i;
        match ((cur & bit) != 0, (minz & bit) != 0, (maxz & bit) != 0) {
            (true, true, true) => {}
            (true, false, true) => {
                candidate = Some(load_max(maxz, i));
                minz = load_min(minz, i);
            }
            (true, false, false) => return Some(maxz),
            (false, true, true) => return candidate,
            (false, false, true) => {
                maxz = load_max(maxz, i);
            }
            (false, false, false) => {}
            (_, true, false) => return None,
        }
    }
    candidate
}

/// Maximal runs of consecutive Z-order codes covering the cell box
/// `[min_cell, max_cell]` (inclusive, in cell units at the enumeration
/// level). Runs are emitted in ascending curve order; gaps are skipped with
/// BIGMIN.
pub fn zorder_runs(min_cell: [u32; 3], max_cell: [u32; 3], level: u8) -> Vec<(u64, u64)> {
    let bits = level as u32;
    let minz = interleave3(min_cell);
    let maxz = interleave3(max_cell);
    let mut runs = Vec::new();
    if level == 0 {
        runs.push((0, 0));
        return runs;
    }
    let mut cur = minz; // the minimum corner is always inside the box
    loop {
        let mut end = cur;
        while end < maxz && in_box(end + 1, min_cell, max_cell) {
            end += 1;
        }
        runs.push((cur, end));
        match bigmin(end, minz, maxz, bits) {
            Some(next) => cur = next,
            None => break,
        }
    }
    runs
}

/// Enumeration level for covering `region`: the coarsest level whose cells
/// are no larger than half the region's longest edge, so the cover stays at
/// a handful of cells per axis.
pub fn cover_level(region: &Aabb) -> u8 {
    let longest = region.extent().max_element().max(1.0);
    let target = (longest * 0.5).max(1.0).min(MAX_EXTENT) as u64;
    let extent = target.next_power_of_two().min(MAX_COORD as u64) as u32;
    MAX_LEVEL - extent.trailing_zeros() as u8
}

/// Clip `region` to the domain and express it as an inclusive cell range at
/// `level`. `None` when the region misses the domain entirely.
pub fn grid_range(region: &Aabb, level: u8) -> Option<([u32; 3], [u32; 3])> {
    let e = cell_extent(level);
    let mut lo = [0u32; 3];
    let mut hi = [0u32; 3];
    for axis in 0..3 {
        let min_v = region.min[axis];
        let max_v = region.max[axis];
        if max_v < 0.0 || min_v >= MAX_EXTENT || max_v < min_v {
            return None;
        }
        let min_c = min_v.max(0.0) as u32;
        let max_c = (max_v.min(MAX_EXTENT - 1.0)) as u32;
        lo[axis] = min_c / e;
        hi[axis] = max_c / e;
    }
    Some((lo, hi))
}

/// Coalesce overlapping or adjacent key intervals. Simplex variants emit one
/// interval per (cell, type) pair; runs of curve-adjacent pairs collapse
/// here before the node map is scanned.
pub fn merge_intervals<K: Ord + Copy>(mut intervals: Vec<(K, K)>) -> Vec<(K, K)> {
    if intervals.len() <= 1 {
        return intervals;
    }
    intervals.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    let mut merged: Vec<(K, K)> = Vec::with_capacity(intervals.len());
    for (lo, hi) in intervals {
        match merged.last_mut() {
            Some(last) if lo <= last.1 => {
                if hi > last.1 {
                    last.1 = hi;
                }
            }
            _ => merged.push((lo, hi)),
        }
    }
    merged
}

/// Deduplicated ancestor closure of a set of keys: every strict ancestor of
/// every input key, each reported once. These are the coarse cells a range
/// scan cannot see because they sort before their subtree interval.
pub fn ancestor_probes<K: SpatialKey>(starts: impl IntoIterator<Item = K>) -> Vec<K> {
    let mut seen = std::collections::HashSet::new();
    for key in starts {
        let mut cur = key;
        while let Some(p) = cur.parent() {
            if !seen.insert(p) {
                break; // the rest of this chain is already recorded
            }
            cur = p;
        }
    }
    let mut probes: Vec<K> = seen.into_iter().collect();
    probes.sort_unstable();
    probes
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_spread_compact_roundtrip() {
        for v in [0u32, 1, 7, 1234, 0x1F_FFFF] {
            assert_eq!(compact3(spread3(v)), v);
        }
    }

    #[test]
    fn test_interleave_order_matches_lexicographic_cells() {
        // Z-order of the 8 cells of a 2x2x2 grid is exactly the cell index
        // with x least significant
        for x in 0..2u32 {
            for y in 0..2u32 {
                for z in 0..2u32 {
                    assert_eq!(interleave3([x, y, z]), (x + 2 * y + 4 * z) as u64);
                }
            }
        }
    }

    fn brute_bigmin(cur: u64, lo: [u32; 3], hi: [u32; 3], bits: u32) -> Option<u64> {
        let end = 1u64 << (3 * bits);
        ((cur + 1)..end).find(|&c| in_box(c, lo, hi))
    }

    fn brute_litmax(cur: u64, lo: [u32; 3], hi: [u32; 3]) -> Option<u64> {
        (0..cur).rev().find(|&c| in_box(c, lo, hi))
    }

    #[test]
    fn test_bigmin_against_brute_force() {
        let lo = [1, 0, 2];
        let hi = [5, 3, 6];
        let minz = interleave3(lo);
        let maxz = interleave3(hi);
        for cur in 0..512u64 {
            assert_eq!(
                bigmin(cur, minz, maxz, 3),
                brute_bigmin(cur, lo, hi, 3),
                "cur = {cur}"
            );
        }
    }

    #[test]
    fn test_litmax_against_brute_force() {
        let lo = [1, 0, 2];
        let hi = [5, 3, 6];
        let minz = interleave3(lo);
        let maxz = interleave3(hi);
        for cur in 0..512u64 {
            assert_eq!(
                litmax(cur, minz, maxz, 3),
                brute_litmax(cur, lo, hi),
                "cur = {cur}"
            );
        }
    }

    #[test]
    fn test_zorder_runs_cover_box_exactly() {
        let lo = [1, 2, 0];
        let hi = [4, 5, 3];
        let runs = zorder_runs(lo, hi, 3);
        // Runs must be disjoint, ascending, and cover exactly the box cells
        let mut covered = Vec::new();
        let mut prev_end: Option<u64> = None;
        for (start, end) in &runs {
            assert!(*start <= *end);
            if let Some(p) = prev_end {
                assert!(*start > p + 1, "runs must be maximal and disjoint");
            }
            for code in *start..=*end {
                assert!(in_box(code, lo, hi));
                covered.push(code);
            }
            prev_end = Some(*end);
        }
        let expected: usize = ((hi[0] - lo[0] + 1) * (hi[1] - lo[1] + 1) * (hi[2] - lo[2] + 1))
            as usize;
        assert_eq!(covered.len(), expected);
    }

    #[test]
    fn test_cover_level_scales_with_region() {
        let small = Aabb::new(Vec3::ZERO, Vec3::splat(4.0));
        let large = Aabb::new(Vec3::ZERO, Vec3::splat(1_000_000.0));
        assert!(cover_level(&small) > cover_level(&large));
        assert!(cover_level(&large) <= MAX_LEVEL);
    }

    #[test]
    fn test_grid_range_clips_to_domain() {
        let region = Aabb::new(Vec3::splat(-100.0), Vec3::splat(100.0));
        let (lo, hi) = grid_range(&region, MAX_LEVEL).unwrap();
        assert_eq!(lo, [0, 0, 0]);
        assert_eq!(hi, [100, 100, 100]);

        let outside = Aabb::new(Vec3::splat(-100.0), Vec3::splat(-50.0));
        assert!(grid_range(&outside, 5).is_none());
    }
}
