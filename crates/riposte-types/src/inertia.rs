//! Inertia tensors for the supported solid shapes.
//!
//! Registration computes a body-space tensor from the collision shape and
//! hands it to [`RigidBody::set_inertia_tensor`](crate::RigidBody::set_inertia_tensor),
//! which inverts it once and keeps the world-space inverse refreshed as the
//! body rotates.

use nalgebra::{Matrix3, Vector3};

/// Inertia tensor of a solid sphere of the given mass and radius.
///
/// Every diagonal entry is `(2/5) · m · r²`.
#[must_use]
pub fn solid_sphere(mass: f64, radius: f64) -> Matrix3<f64> {
    let moment = 0.4 * mass * radius * radius;
    Matrix3::from_diagonal(&Vector3::new(moment, moment, moment))
}

/// Inertia tensor of a solid cuboid with the given half extents.
///
/// Each axis carries `m/12 · (dy² + dz²)` for the two full extents
/// perpendicular to it.
#[must_use]
pub fn solid_cuboid(mass: f64, half_extents: Vector3<f64>) -> Matrix3<f64> {
    let full = half_extents * 2.0;
    let sq = full.component_mul(&full);
    let factor = mass / 12.0;
    Matrix3::from_diagonal(&Vector3::new(
        factor * (sq.y + sq.z),
        factor * (sq.x + sq.z),
        factor * (sq.x + sq.y),
    ))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sphere_moments_are_isotropic() {
        let tensor = solid_sphere(5.0, 2.0);
        assert_relative_eq!(tensor[(0, 0)], 8.0);
        assert_relative_eq!(tensor[(1, 1)], 8.0);
        assert_relative_eq!(tensor[(2, 2)], 8.0);
        assert_relative_eq!(tensor[(0, 1)], 0.0);
    }

    #[test]
    fn cube_moments_match_the_slab_formula() {
        // Unit cube (half extent 0.5), mass 12: each moment is
        // 12/12 · (1² + 1²) = 2.
        let tensor = solid_cuboid(12.0, Vector3::new(0.5, 0.5, 0.5));
        assert_relative_eq!(tensor[(0, 0)], 2.0);
        assert_relative_eq!(tensor[(1, 1)], 2.0);
        assert_relative_eq!(tensor[(2, 2)], 2.0);
    }

    #[test]
    fn elongated_cuboid_resists_tumbling_more() {
        // Long along x: spinning around x is easiest.
        let tensor = solid_cuboid(1.0, Vector3::new(4.0, 0.5, 0.5));
        assert!(tensor[(0, 0)] < tensor[(1, 1)]);
        assert_relative_eq!(tensor[(1, 1)], tensor[(2, 2)]);
    }
}
