//! Axis-aligned regions and containment classification.
//!
//! [`Aabb`] is the region type used throughout the engine: octree node
//! regions, the configured play area, and the conservative bounds of every
//! collision volume. All tests here are boundary-inclusive — a box that
//! exactly reaches a region's face still counts as contained, matching the
//! placement rules of the spatial index. Exact-touch filtering for contact
//! generation happens in the narrow phase, not here.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How one region relates to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Containment {
    /// The first region fully encloses the second.
    Contains,
    /// The regions overlap without full enclosure.
    Intersects,
    /// The regions share no space.
    Disjoint,
}

/// An axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Minimum corner of the box.
    pub min: Point3<f64>,
    /// Maximum corner of the box.
    pub max: Point3<f64>,
}

impl Aabb {
    /// Create a new AABB from minimum and maximum corners.
    #[must_use]
    pub const fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with the given half-extents.
    #[must_use]
    pub fn from_center(center: Point3<f64>, half_extents: Vector3<f64>) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Center point of the box.
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        self.min + (self.max - self.min) * 0.5
    }

    /// Full edge lengths.
    #[must_use]
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Half of the edge lengths.
    #[must_use]
    pub fn half_extents(&self) -> Vector3<f64> {
        (self.max - self.min) * 0.5
    }

    /// Enclosed volume.
    #[must_use]
    pub fn volume(&self) -> f64 {
        let s = self.size();
        s.x * s.y * s.z
    }

    /// True if any extent is zero, negative, or not finite.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        let s = self.size();
        !(s.x > 0.0 && s.y > 0.0 && s.z > 0.0)
            || !(s.x.is_finite() && s.y.is_finite() && s.z.is_finite())
    }

    /// Check whether this box overlaps another (boundary-inclusive).
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Check whether a point lies in the box (boundary-inclusive).
    #[must_use]
    pub fn contains_point(&self, p: &Point3<f64>) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Classify how this box relates to `other`.
    #[must_use]
    pub fn contains(&self, other: &Self) -> Containment {
        if self.min.x <= other.min.x
            && other.max.x <= self.max.x
            && self.min.y <= other.min.y
            && other.max.y <= self.max.y
            && self.min.z <= other.min.z
            && other.max.z <= self.max.z
        {
            Containment::Contains
        } else if self.overlaps(other) {
            Containment::Intersects
        } else {
            Containment::Disjoint
        }
    }

    /// Closest point on or inside the box to `p` (per-axis clamp).
    #[must_use]
    pub fn closest_point(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
            p.z.clamp(self.min.z, self.max.z),
        )
    }

    /// Closest point to `p` on the boundary surface of the box.
    ///
    /// Unlike [`closest_point`](Self::closest_point) this never returns an
    /// interior point: for `p` inside the box, the nearest face wins. The
    /// Minkowski-difference contact path depends on this to turn an
    /// origin-inside-difference test into a penetration vector.
    #[must_use]
    pub fn closest_boundary_point(&self, p: &Point3<f64>) -> Point3<f64> {
        if !self.contains_point(p) {
            return self.closest_point(p);
        }

        let faces = [
            (p.x - self.min.x, 0, self.min.x),
            (self.max.x - p.x, 0, self.max.x),
            (p.y - self.min.y, 1, self.min.y),
            (self.max.y - p.y, 1, self.max.y),
            (p.z - self.min.z, 2, self.min.z),
            (self.max.z - p.z, 2, self.max.z),
        ];
        let mut best = faces[0];
        for face in &faces[1..] {
            if face.0 < best.0 {
                best = *face;
            }
        }

        let mut out = *p;
        out[best.1] = best.2;
        out
    }

    /// Minkowski difference `self ⊖ other`.
    ///
    /// The result contains the origin exactly when the inputs overlap, and
    /// the origin's closest boundary point on the result is the smallest
    /// translation of `self` that separates the pair.
    #[must_use]
    pub fn minkowski_difference(&self, other: &Self) -> Self {
        let min = Point3::new(
            self.min.x - other.max.x,
            self.min.y - other.max.y,
            self.min.z - other.max.z,
        );
        Self {
            min,
            max: min + (self.size() + other.size()),
        }
    }

    /// Intersection of two overlapping boxes.
    ///
    /// Meaningful only when [`overlaps`](Self::overlaps) holds; otherwise
    /// the result is degenerate.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            min: Point3::new(
                self.min.x.max(other.min.x),
                self.min.y.max(other.min.y),
                self.min.z.max(other.min.z),
            ),
            max: Point3::new(
                self.max.x.min(other.max.x),
                self.max.y.min(other.max.y),
                self.max.z.min(other.max.z),
            ),
        }
    }

    /// One of the eight child octants of the box.
    ///
    /// The index's bit pattern selects the half along each axis: bit 0 set
    /// means the upper x half, bit 1 the upper y half, bit 2 the upper z
    /// half. The eight octants partition the box exactly.
    #[must_use]
    pub fn octant(&self, index: usize) -> Self {
        let quarter = self.half_extents() * 0.5;
        let offset = Vector3::new(
            if index & 1 == 0 { -quarter.x } else { quarter.x },
            if index & 2 == 0 { -quarter.y } else { quarter.y },
            if index & 4 == 0 { -quarter.z } else { quarter.z },
        );
        Self::from_center(self.center() + offset, quarter)
    }

    /// Smallest cube with power-of-two edge length (at least 1) that
    /// contains this box, keeping the same center.
    ///
    /// The spatial index normalizes its root region this way so that
    /// halving subdivision bottoms out exactly at the configured minimum
    /// node size.
    #[must_use]
    pub fn enclosing_cube(&self) -> Self {
        let s = self.size();
        let longest = s.x.max(s.y).max(s.z).max(1.0);
        let mut edge = 1.0_f64;
        while edge < longest {
            edge *= 2.0;
        }
        Self::from_center(self.center(), Vector3::repeat(edge * 0.5))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use approx::assert_relative_eq;

    fn cube_at(center: [f64; 3], half: f64) -> Aabb {
        Aabb::from_center(Point3::new(center[0], center[1], center[2]), Vector3::repeat(half))
    }

    #[test]
    fn overlap_is_symmetric() {
        let a = cube_at([0.0, 0.0, 0.0], 2.0);
        let b = cube_at([3.0, 0.0, 0.0], 2.0);
        let c = cube_at([10.0, 0.0, 0.0], 1.0);

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn touching_faces_still_overlap() {
        let a = cube_at([0.0, 0.0, 0.0], 1.0);
        let b = cube_at([2.0, 0.0, 0.0], 1.0);
        assert!(a.overlaps(&b));
    }

    #[test]
    fn containment_trichotomy() {
        let outer = cube_at([0.0, 0.0, 0.0], 4.0);
        let inner = cube_at([1.0, 1.0, 1.0], 1.0);
        let poking = cube_at([3.5, 0.0, 0.0], 1.0);
        let far = cube_at([20.0, 0.0, 0.0], 1.0);

        assert_eq!(outer.contains(&inner), Containment::Contains);
        assert_eq!(outer.contains(&poking), Containment::Intersects);
        assert_eq!(outer.contains(&far), Containment::Disjoint);

        // Inclusive: a box reaching the outer face exactly is contained.
        let flush = cube_at([3.0, 0.0, 0.0], 1.0);
        assert_eq!(outer.contains(&flush), Containment::Contains);
    }

    #[test]
    fn octants_partition_the_box() {
        let region = cube_at([0.0, 0.0, 0.0], 4.0);
        let mut total = 0.0;
        for i in 0..8 {
            let octant = region.octant(i);
            assert_eq!(region.contains(&octant), Containment::Contains);
            total += octant.volume();
        }
        assert_relative_eq!(total, region.volume());

        // Octant 0 is the all-low corner, octant 7 the all-high corner.
        assert_relative_eq!(region.octant(0).min.x, region.min.x);
        assert_relative_eq!(region.octant(7).max.z, region.max.z);
    }

    #[test]
    fn minkowski_difference_detects_overlap() {
        let a = cube_at([0.0, 0.0, 0.0], 1.0);
        let b = cube_at([1.5, 0.0, 0.0], 1.0);
        let c = cube_at([5.0, 0.0, 0.0], 1.0);

        assert!(a
            .minkowski_difference(&b)
            .contains_point(&Point3::origin()));
        assert!(!a
            .minkowski_difference(&c)
            .contains_point(&Point3::origin()));
    }

    #[test]
    fn boundary_point_for_interior_query_picks_nearest_face() {
        let region = cube_at([0.0, 0.0, 0.0], 2.0);
        let p = Point3::new(1.5, 0.0, 0.0);
        let q = region.closest_boundary_point(&p);
        assert_relative_eq!(q.x, 2.0);
        assert_relative_eq!(q.y, 0.0);
        assert_relative_eq!(q.z, 0.0);

        // Exterior queries clamp onto the surface as usual.
        let outside = Point3::new(5.0, 1.0, 0.0);
        let q = region.closest_boundary_point(&outside);
        assert_relative_eq!(q.x, 2.0);
        assert_relative_eq!(q.y, 1.0);
    }

    #[test]
    fn enclosing_cube_rounds_up_to_power_of_two() {
        let exact = cube_at([0.0, 0.0, 0.0], 8.0); // edge 16
        assert_relative_eq!(exact.enclosing_cube().size().x, 16.0);

        let odd = Aabb::from_center(Point3::new(1.0, 2.0, 3.0), Vector3::new(5.0, 2.0, 1.0));
        let cube = odd.enclosing_cube();
        assert_relative_eq!(cube.size().x, 16.0);
        assert_relative_eq!(cube.size().y, 16.0);
        assert_relative_eq!(cube.size().z, 16.0);
        assert_relative_eq!(cube.center().x, 1.0);
        assert_relative_eq!(cube.center().y, 2.0);

        let tiny = cube_at([0.0, 0.0, 0.0], 0.1);
        assert_relative_eq!(tiny.enclosing_cube().size().x, 1.0);
    }

    #[test]
    fn degenerate_boxes_are_flagged() {
        let flat = Aabb::new(Point3::origin(), Point3::new(1.0, 0.0, 1.0));
        assert!(flat.is_degenerate());
        assert!(!cube_at([0.0, 0.0, 0.0], 1.0).is_degenerate());
    }
}
