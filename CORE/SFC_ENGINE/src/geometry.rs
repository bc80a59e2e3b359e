// ═══════════════════════════════════════════════════════════════════════════════
// FILE: geometry.rs | CORE/SFC_ENGINE/src/geometry.rs
// PURPOSE: 3D geometry primitives and intersection tests for spatial queries
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box spanning a cubic cell from its origin corner
    #[inline]
    pub fn cube(origin: Vec3, extent: f32) -> Self {
        Self {
            min: origin,
            max: origin + Vec3::splat(extent),
        }
    }

    #[inline]
    pub fn from_center_half(center: Vec3, half: Vec3) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut bbox = Self::EMPTY;
        for p in points {
            bbox.extend_point(*p);
        }
        bbox
    }

    #[inline]
    pub fn extend_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn extend_aabb(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// True if `other` lies entirely inside this box
    #[inline]
    pub fn contains_aabb(&self, other: &Aabb) -> bool {
        self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Point of this box closest to `p` (is `p` itself when inside)
    #[inline]
    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        p.clamp(self.min, self.max)
    }

    #[inline]
    pub fn distance_squared(&self, p: Vec3) -> f32 {
        self.closest_point(p).distance_squared(p)
    }

    /// All eight corner points
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Ray with origin and (not necessarily normalized) direction
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    #[inline]
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }

    /// Slab test. Returns the parametric entry/exit interval clipped to t >= 0,
    /// or `None` when the ray misses the box.
    pub fn intersect_aabb(&self, aabb: &Aabb) -> Option<(f32, f32)> {
        let inv = self.dir.recip();
        let t0 = (aabb.min - self.origin) * inv;
        let t1 = (aabb.max - self.origin) * inv;
        let near = t0.min(t1);
        let far = t0.max(t1);
        let t_enter = near.max_element().max(0.0);
        let t_exit = far.min_element();
        // NaN lanes (zero direction on a degenerate axis) fall out of the
        // comparisons below because NaN comparisons are false.
        if t_enter <= t_exit && t_exit >= 0.0 {
            Some((t_enter, t_exit))
        } else {
            None
        }
    }

    /// Sphere intersection; returns the smallest positive t.
    pub fn intersect_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        let oc = self.origin - center;
        let a = self.dir.length_squared();
        if a == 0.0 {
            return None;
        }
        let half_b = oc.dot(self.dir);
        let c = oc.length_squared() - radius * radius;
        let disc = half_b * half_b - a * c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_d = disc.sqrt();
        let t = (-half_b - sqrt_d) / a;
        if t > 0.0 {
            return Some(t);
        }
        let t = (-half_b + sqrt_d) / a;
        if t > 0.0 {
            return Some(t);
        }
        None
    }

    /// Möller-Trumbore triangle intersection; returns t for hits with t > 0.
    pub fn intersect_triangle(&self, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
        const EPS: f32 = 1e-7;
        let ab = b - a;
        let ac = c - a;
        let pvec = self.dir.cross(ac);
        let det = ab.dot(pvec);
        if det.abs() < EPS {
            return None; // parallel to the triangle plane
        }
        let inv_det = 1.0 / det;
        let tvec = self.origin - a;
        let u = tvec.dot(pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let qvec = tvec.cross(ab);
        let v = self.dir.dot(qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = ac.dot(qvec) * inv_det;
        if t > 0.0 {
            Some(t)
        } else {
            None
        }
    }
}

/// Which side of a plane a volume lies on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HalfspaceSide {
    Front,
    Back,
    Straddling,
}

/// Plane in normal-distance form: dot(normal, p) + d = 0
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    #[inline]
    pub fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let n = normal.normalize();
        Self {
            normal: n,
            d: -n.dot(point),
        }
    }

    #[inline]
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.d
    }

    /// Classify a box against the plane using the projected half-extent.
    pub fn classify_aabb(&self, aabb: &Aabb) -> HalfspaceSide {
        let center = aabb.center();
        let half = aabb.extent() * 0.5;
        let radius = half.dot(self.normal.abs());
        let dist = self.signed_distance(center);
        if dist > radius {
            HalfspaceSide::Front
        } else if dist < -radius {
            HalfspaceSide::Back
        } else {
            HalfspaceSide::Straddling
        }
    }
}

/// Result of a frustum/volume containment test
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Containment {
    Inside,
    Intersecting,
    Outside,
}

/// View frustum as six inward-facing planes
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Axis-aligned orthographic frustum, mostly useful in tests
    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self {
            planes: [
                Plane::from_point_normal(aabb.min, Vec3::X),
                Plane::from_point_normal(aabb.max, -Vec3::X),
                Plane::from_point_normal(aabb.min, Vec3::Y),
                Plane::from_point_normal(aabb.max, -Vec3::Y),
                Plane::from_point_normal(aabb.min, Vec3::Z),
                Plane::from_point_normal(aabb.max, -Vec3::Z),
            ],
        }
    }

    pub fn classify_aabb(&self, aabb: &Aabb) -> Containment {
        let mut inside_all = true;
        for plane in &self.planes {
            match plane.classify_aabb(aabb) {
                HalfspaceSide::Back => return Containment::Outside,
                HalfspaceSide::Straddling => inside_all = false,
                HalfspaceSide::Front => {}
            }
        }
        if inside_all {
            Containment::Inside
        } else {
            Containment::Intersecting
        }
    }

    #[inline]
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.planes.iter().all(|pl| pl.signed_distance(p) >= 0.0)
    }
}

/// Tetrahedron with explicit vertices
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tetrahedron {
    pub verts: [Vec3; 4],
}

impl Tetrahedron {
    pub fn new(verts: [Vec3; 4]) -> Self {
        Self { verts }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_points(&self.verts)
    }

    pub fn volume(&self) -> f32 {
        let [a, b, c, d] = self.verts;
        ((b - a).cross(c - a)).dot(d - a).abs() / 6.0
    }

    /// Same-side containment test against the four faces.
    pub fn contains(&self, p: Vec3) -> bool {
        const FACES: [[usize; 4]; 4] = [[1, 2, 3, 0], [0, 3, 2, 1], [0, 1, 3, 2], [0, 2, 1, 3]];
        for [i, j, k, opposite] in FACES {
            let (a, b, c) = (self.verts[i], self.verts[j], self.verts[k]);
            let normal = (b - a).cross(c - a);
            let side_ref = normal.dot(self.verts[opposite] - a);
            let side_p = normal.dot(p - a);
            // Boundary counts as inside; only reject when the point is
            // strictly on the far side from the opposite vertex.
            if side_ref * side_p < 0.0 && side_p.abs() > 1e-6 * normal.length() {
                return false;
            }
        }
        true
    }

    /// Ray intersection via the four triangular faces; smallest positive t.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        const FACES: [[usize; 3]; 4] = [[1, 2, 3], [0, 3, 2], [0, 1, 3], [0, 2, 1]];
        let mut best: Option<f32> = None;
        for [i, j, k] in FACES {
            if let Some(t) = ray.intersect_triangle(self.verts[i], self.verts[j], self.verts[k]) {
                best = Some(best.map_or(t, |b: f32| b.min(t)));
            }
        }
        best
    }
}
