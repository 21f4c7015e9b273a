//! Narrow-phase contact generation between primitive pairs.
//!
//! Every shape combination is dispatched exhaustively, so there is no
//! "unsupported pair" at runtime; each pair function produces zero or more
//! contacts with the convention that the normal separates the *first*
//! body. Pairs where neither side moved last tick and pairs of fixed
//! geometry are skipped outright.

use nalgebra::{Point3, Vector3};

use riposte_contact::{Contact, ContactParams};
use riposte_types::{Aabb, BodyId, BodySet, PhysicsError, RigidBody};

use crate::prim::{PrimId, Primitive, PrimitiveSet, Shape};
use crate::volume::Volume;

/// Cube-cube depths below this are treated as no overlap: the Minkowski
/// boundary direction is numerically meaningless at near-zero depth.
const MIN_CUBE_DEPTH: f64 = 1e-6;

/// Generate the contacts between two primitives, appending to `out`.
///
/// Returns how many contacts were added.
///
/// # Errors
///
/// [`PhysicsError::InvalidPrimitive`] for a dead primitive id or a volume
/// primitive with no backing body, [`PhysicsError::InvalidBody`] if a
/// backing body has been removed.
pub fn contacts_between(
    prims: &PrimitiveSet,
    bodies: &BodySet,
    a: PrimId,
    b: PrimId,
    params: ContactParams,
    out: &mut Vec<Contact>,
) -> Result<usize, PhysicsError> {
    let prim_a = prims
        .get(a)
        .ok_or(PhysicsError::InvalidPrimitive { index: a.raw() })?;
    let prim_b = prims
        .get(b)
        .ok_or(PhysicsError::InvalidPrimitive { index: b.raw() })?;

    if prim_a.is_stationary() && prim_b.is_stationary() {
        return Ok(0);
    }
    if prim_a.body.is_none() && prim_b.body.is_none() {
        return Ok(0);
    }

    match (&prim_a.shape, &prim_b.shape) {
        (Shape::Volume(va), Shape::Volume(vb)) => {
            let (id_a, body_a) = volume_body(a, prim_a, bodies)?;
            let (id_b, body_b) = volume_body(b, prim_b, bodies)?;
            let ca = body_a.position();
            let cb = body_b.position();
            match (va, vb) {
                (Volume::Sphere { radius: r0 }, Volume::Sphere { radius: r1 }) => {
                    Ok(sphere_sphere(id_a, ca, *r0, id_b, cb, *r1, params, out))
                }
                (Volume::Sphere { radius }, Volume::Cube { half_extents }) => Ok(sphere_cube(
                    id_a,
                    ca,
                    *radius,
                    id_b,
                    cb,
                    *half_extents,
                    params,
                    out,
                )),
                (Volume::Cube { half_extents }, Volume::Sphere { radius }) => Ok(sphere_cube(
                    id_b,
                    cb,
                    *radius,
                    id_a,
                    ca,
                    *half_extents,
                    params,
                    out,
                )),
                (Volume::Cube { half_extents: ha }, Volume::Cube { half_extents: hb }) => {
                    let bounds_a = Aabb::from_center(ca, *ha);
                    let bounds_b = Aabb::from_center(cb, *hb);
                    Ok(cube_cube(id_a, &bounds_a, id_b, &bounds_b, params, out))
                }
            }
        }
        (Shape::Volume(volume), Shape::Plane { normal, offset }) => {
            let (id, body) = volume_body(a, prim_a, bodies)?;
            Ok(volume_plane(id, body, volume, normal, *offset, params, out))
        }
        (Shape::Plane { normal, offset }, Shape::Volume(volume)) => {
            let (id, body) = volume_body(b, prim_b, bodies)?;
            Ok(volume_plane(id, body, volume, normal, *offset, params, out))
        }
        // Two fixed half-spaces are both bodyless, filtered above.
        (Shape::Plane { .. }, Shape::Plane { .. }) => Ok(0),
    }
}

fn volume_body<'a>(
    id: PrimId,
    prim: &Primitive,
    bodies: &'a BodySet,
) -> Result<(BodyId, &'a RigidBody), PhysicsError> {
    let body_id = prim
        .body
        .ok_or(PhysicsError::InvalidPrimitive { index: id.raw() })?;
    let body = bodies
        .get(body_id)
        .ok_or(PhysicsError::InvalidBody { id: body_id })?;
    Ok((body_id, body))
}

/// Sphere against sphere: the contact sits midway between the centers on
/// the midline, with the normal pointing toward the first sphere.
#[allow(clippy::too_many_arguments)]
fn sphere_sphere(
    first: BodyId,
    c0: Point3<f64>,
    r0: f64,
    second: BodyId,
    c1: Point3<f64>,
    r1: f64,
    params: ContactParams,
    out: &mut Vec<Contact>,
) -> usize {
    let midline = c0 - c1;
    let reach = r0 + r1;
    if midline.norm_squared() >= reach * reach {
        return 0;
    }
    let distance = midline.norm();
    if distance <= 0.0 {
        // Concentric spheres have no usable normal direction.
        return 0;
    }

    let normal = midline / distance;
    let position = c1 + midline * 0.5;
    out.push(Contact::new(
        first,
        Some(second),
        position,
        normal,
        reach - distance,
        params,
    ));
    1
}

/// Sphere against axis-aligned cube; the sphere is always the first body.
///
/// The closest point on the cube to the sphere center carries the
/// contact. A center inside the cube has no meaningful closest-point
/// direction, so the normal falls back to the nearest face and the depth
/// spans from the sphere's far side to that face.
#[allow(clippy::too_many_arguments)]
fn sphere_cube(
    sphere: BodyId,
    center: Point3<f64>,
    radius: f64,
    cube: BodyId,
    cube_center: Point3<f64>,
    half_extents: Vector3<f64>,
    params: ContactParams,
    out: &mut Vec<Contact>,
) -> usize {
    let bounds = Aabb::from_center(cube_center, half_extents);
    let closest = bounds.closest_point(&center);
    let to_center = center - closest;
    let dist_sq = to_center.norm_squared();
    if dist_sq >= radius * radius {
        return 0;
    }

    let (normal, penetration) = if dist_sq > 0.0 {
        let distance = dist_sq.sqrt();
        (to_center / distance, radius - distance)
    } else {
        // Center inside the cube: push out through the nearest face.
        let rel = center - cube_center;
        let mut axis = 0;
        let mut least = half_extents.x - rel.x.abs();
        for i in 1..3 {
            let depth = half_extents[i] - rel[i].abs();
            if depth < least {
                least = depth;
                axis = i;
            }
        }
        let mut normal = Vector3::zeros();
        normal[axis] = if rel[axis] >= 0.0 { 1.0 } else { -1.0 };
        (normal, radius + least)
    };

    out.push(Contact::new(
        sphere,
        Some(cube),
        closest,
        normal,
        penetration,
        params,
    ));
    1
}

/// Cube against cube via the Minkowski difference.
///
/// The difference is built second-minus-first so that the closest point
/// on its boundary to the origin is the minimal translation that frees
/// the *first* cube; its direction is the contact normal and its length
/// the depth. The contact sits at the center of the overlap region.
fn cube_cube(
    first: BodyId,
    bounds_a: &Aabb,
    second: BodyId,
    bounds_b: &Aabb,
    params: ContactParams,
    out: &mut Vec<Contact>,
) -> usize {
    let difference = bounds_b.minkowski_difference(bounds_a);
    let origin = Point3::origin();
    if !difference.contains_point(&origin) {
        return 0;
    }

    let pen_vector = difference.closest_boundary_point(&origin).coords;
    let depth = pen_vector.norm();
    if depth < MIN_CUBE_DEPTH {
        return 0;
    }

    out.push(Contact::new(
        first,
        Some(second),
        bounds_a.intersection(bounds_b).center(),
        pen_vector / depth,
        depth,
        params,
    ));
    1
}

fn volume_plane(
    id: BodyId,
    body: &RigidBody,
    volume: &Volume,
    normal: &Vector3<f64>,
    offset: f64,
    params: ContactParams,
    out: &mut Vec<Contact>,
) -> usize {
    match volume {
        Volume::Sphere { radius } => {
            sphere_plane(id, body.position(), *radius, normal, offset, params, out)
        }
        Volume::Cube { half_extents } => cube_plane(
            id,
            body.position(),
            *half_extents,
            normal,
            offset,
            params,
            out,
        ),
    }
}

/// Sphere against a fixed half-space: one contact at the sphere's
/// projection onto the plane.
fn sphere_plane(
    sphere: BodyId,
    center: Point3<f64>,
    radius: f64,
    normal: &Vector3<f64>,
    offset: f64,
    params: ContactParams,
    out: &mut Vec<Contact>,
) -> usize {
    let distance = normal.dot(&center.coords) - radius - offset;
    if distance >= 0.0 {
        return 0;
    }

    let position = center - normal * (distance + radius);
    out.push(Contact::new(
        sphere,
        None,
        position,
        *normal,
        -distance,
        params,
    ));
    1
}

/// Cube against a fixed half-space: one contact per vertex that crossed
/// the plane, each carrying its own depth so the resolver can right a
/// tilted stack.
fn cube_plane(
    cube: BodyId,
    center: Point3<f64>,
    half_extents: Vector3<f64>,
    normal: &Vector3<f64>,
    offset: f64,
    params: ContactParams,
    out: &mut Vec<Contact>,
) -> usize {
    let mut added = 0;
    for corner in 0..8_u8 {
        let vertex = Point3::new(
            center.x + if corner & 1 == 0 { -half_extents.x } else { half_extents.x },
            center.y + if corner & 2 == 0 { -half_extents.y } else { half_extents.y },
            center.z + if corner & 4 == 0 { -half_extents.z } else { half_extents.z },
        );
        let vertex_distance = normal.dot(&vertex.coords);
        if vertex_distance < offset {
            let position = vertex + normal * (vertex_distance - offset);
            out.push(Contact::new(
                cube,
                None,
                position,
                *normal,
                offset - vertex_distance,
                params,
            ));
            added += 1;
        }
    }
    added
}
