// ═══════════════════════════════════════════════════════════════════════════════
// FILE: domain.rs | CORE/SFC_ENGINE/src/domain.rs
// PURPOSE: Domain constants and coordinate quantization for the indexable cube
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════

use glam::Vec3;

use crate::key::KeyError;

/// Deepest refinement level. Level 0 is the root; each level halves each axis.
pub const MAX_LEVEL: u8 = 21;

/// One past the largest representable integer coordinate: the domain is the
/// half-open cube [0, 2^21)³.
pub const MAX_COORD: u32 = 1 << MAX_LEVEL;

/// Domain extent as a float, for geometric tests.
pub const MAX_EXTENT: f32 = MAX_COORD as f32;

/// Edge length of a cell at `level`, in deepest-level grid units.
#[inline]
pub const fn cell_extent(level: u8) -> u32 {
    1 << (MAX_LEVEL - level)
}

/// Validate a level against the global maximum.
#[inline]
pub fn check_level(level: u8) -> Result<(), KeyError> {
    if level > MAX_LEVEL {
        return Err(KeyError::InvalidLevel { level });
    }
    Ok(())
}

/// Quantize a position to the anchor of its enclosing cell at `level`.
///
/// The anchor is expressed in deepest-level grid units (so it is always a
/// multiple of `cell_extent(level)`). Positions outside [0, 2^21)³ are
/// rejected; quantization is floor.
pub fn quantize(point: Vec3, level: u8) -> Result<[u32; 3], KeyError> {
    check_level(level)?;
    let mut anchor = [0u32; 3];
    for (axis, value) in [point.x, point.y, point.z].into_iter().enumerate() {
        if !value.is_finite() || value < 0.0 || value >= MAX_EXTENT {
            return Err(KeyError::OutOfDomain { point });
        }
        let grid = value as u32; // floor for non-negative floats
        anchor[axis] = grid & !(cell_extent(level) - 1);
    }
    Ok(anchor)
}

/// True if a point lies inside the indexable domain.
#[inline]
pub fn in_domain(point: Vec3) -> bool {
    point.x >= 0.0
        && point.y >= 0.0
        && point.z >= 0.0
        && point.x < MAX_EXTENT
        && point.y < MAX_EXTENT
        && point.z < MAX_EXTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_extent() {
        assert_eq!(cell_extent(0), MAX_COORD);
        assert_eq!(cell_extent(MAX_LEVEL), 1);
        assert_eq!(cell_extent(1), MAX_COORD / 2);
    }

    #[test]
    fn test_quantize_floor() {
        let anchor = quantize(Vec3::new(100.7, 200.2, 300.9), MAX_LEVEL).unwrap();
        assert_eq!(anchor, [100, 200, 300]);
    }

    #[test]
    fn test_quantize_aligns_to_level() {
        let anchor = quantize(Vec3::new(100.0, 100.0, 100.0), 10).unwrap();
        let e = cell_extent(10);
        assert_eq!(anchor[0] % e, 0);
        assert_eq!(anchor[1] % e, 0);
        assert_eq!(anchor[2] % e, 0);
    }

    #[test]
    fn test_quantize_rejects_out_of_domain() {
        assert!(quantize(Vec3::new(-1.0, 0.0, 0.0), 5).is_err());
        assert!(quantize(Vec3::new(0.0, MAX_EXTENT, 0.0), 5).is_err());
        assert!(quantize(Vec3::new(0.0, 0.0, f32::NAN), 5).is_err());
    }

    #[test]
    fn test_quantize_rejects_bad_level() {
        assert!(quantize(Vec3::ZERO, MAX_LEVEL + 1).is_err());
    }
}
