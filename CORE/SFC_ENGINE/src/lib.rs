// ═══════════════════════════════════════════════════════════════════════════════
// FILE: lib.rs | CORE/SFC_ENGINE/src/lib.rs
// PURPOSE: Foundation layer - spatial keys, space-filling-curve math, 3D geometry
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// SFC_ENGINE provides the key algebra shared by all index variants:
// - Domain constants and coordinate quantization for the [0, 2^21)³ cube
// - Geometry primitives (AABB, ray, plane, frustum, tetrahedron) on glam vectors
// - The SpatialKey abstraction with three implementations:
//     MortonKey  - cubic cells, Z-order curve, O(1) key derivation
//     TetKey     - S0-S5 tetrahedral subdivision, type-chain keyed
//     PrismKey   - triangle × line composite, anisotropic cells
// - LITMAX/BIGMIN interval planning for range queries
// - Bounded, thread-safe key caches
//
// DEPENDS ON:
//   • glam  → vector math
//
// USED BY:
//   • CORE/SPATIAL_ENGINE → the generic index engine

pub mod domain;
pub mod geometry;
pub mod key;
pub mod range_plan;

pub use domain::{cell_extent, quantize, MAX_COORD, MAX_EXTENT, MAX_LEVEL};
pub use geometry::{Aabb, Containment, Frustum, HalfspaceSide, Plane, Ray, Tetrahedron};
pub use key::cache::KeyCache;
pub use key::morton::MortonKey;
pub use key::prism::PrismKey;
pub use key::tetree::TetKey;
pub use key::{KeyError, LevelRelation, SpatialKey, TopologyKind};
pub use range_plan::{cover_level, grid_range, RegionCover};
