//! Collision volumes: the shapes a body can carry.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use riposte_types::Aabb;

/// A collision volume, positioned by the body (or primitive) that owns it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Volume {
    /// A sphere of the given radius.
    Sphere {
        /// Radius, must be positive.
        radius: f64,
    },
    /// An axis-aligned cube (box) with the given half extents.
    Cube {
        /// Half extent along each axis, all components positive.
        half_extents: Vector3<f64>,
    },
}

impl Volume {
    /// Scalar measure of the volume, in cubic world units.
    #[must_use]
    pub fn size(&self) -> f64 {
        match self {
            Volume::Sphere { radius } => 4.0 / 3.0 * std::f64::consts::PI * radius.powi(3),
            Volume::Cube { half_extents } => 8.0 * half_extents.x * half_extents.y * half_extents.z,
        }
    }

    /// How much bigger `other` is than this volume. Insertion heuristics
    /// prefer the branch with the smallest growth.
    #[must_use]
    pub fn growth(&self, other: &Volume) -> f64 {
        other.size() - self.size()
    }

    /// Axis-aligned bounds of the volume placed at `center`.
    #[must_use]
    pub fn aabb(&self, center: &Point3<f64>) -> Aabb {
        match self {
            Volume::Sphere { radius } => {
                Aabb::from_center(*center, Vector3::new(*radius, *radius, *radius))
            }
            Volume::Cube { half_extents } => Aabb::from_center(*center, *half_extents),
        }
    }

    /// True if two placed volumes overlap.
    ///
    /// Exact touching does not count: a pair at exactly touching distance
    /// produces no overlap and therefore no contact.
    #[must_use]
    pub fn overlaps(
        &self,
        center: &Point3<f64>,
        other: &Volume,
        other_center: &Point3<f64>,
    ) -> bool {
        match (self, other) {
            (Volume::Sphere { radius: r0 }, Volume::Sphere { radius: r1 }) => {
                let reach = r0 + r1;
                (other_center - center).norm_squared() < reach * reach
            }
            (Volume::Sphere { radius }, Volume::Cube { .. }) => {
                let closest = other.aabb(other_center).closest_point(center);
                (center - closest).norm_squared() < radius * radius
            }
            (Volume::Cube { .. }, Volume::Sphere { .. }) => {
                other.overlaps(other_center, self, center)
            }
            (Volume::Cube { .. }, Volume::Cube { .. }) => {
                let a = self.aabb(center);
                let b = other.aabb(other_center);
                (0..3).all(|i| a.min[i] < b.max[i] && b.min[i] < a.max[i])
            }
        }
    }
}
