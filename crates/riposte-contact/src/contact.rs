//! A single contact and the machinery to resolve it.
//!
//! The model is the classic sequential-impulse formulation (Millington,
//! *Game Physics Engine Development*): each contact carries an orthonormal
//! basis whose first axis is the contact normal, velocities are examined in
//! that basis, and corrections are applied as a positional move split
//! between translation and rotation plus an impulse that drives the closing
//! velocity to its restitution target.
//!
//! Conventions used throughout:
//!
//! - the normal is unit length and points in the direction that separates
//!   the *first* body;
//! - the second body is optional — contacts against half-space geometry
//!   (floors, walls) have no second body;
//! - per-body signs follow the slot: corrections apply positively to slot 0
//!   and negatively to slot 1.

use nalgebra::{Matrix3, Point3, Vector3};

use riposte_types::{BodyId, BodySet, PhysicsError, RigidBody};

use crate::params::ContactParams;

/// Per-body deltas produced by applying one contact correction.
///
/// The resolver feeds these back into the cached state of every other
/// contact that shares a body, so a correction applied here is visible to
/// its neighbours without re-running collision detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairChange {
    /// Linear delta per body slot: a translation for positional
    /// corrections, a velocity change for impulses.
    pub linear: [Vector3<f64>; 2],
    /// Angular delta per body slot: a scaled-axis rotation for positional
    /// corrections, an angular-velocity change for impulses.
    pub angular: [Vector3<f64>; 2],
}

/// A point of contact between a body and either another body or a fixed
/// half-space.
#[derive(Debug, Clone)]
pub struct Contact {
    /// The body the normal separates.
    pub first: BodyId,
    /// The other body, if the contact is not against fixed geometry.
    pub second: Option<BodyId>,
    /// World-space contact point.
    pub position: Point3<f64>,
    /// Unit normal pointing in the direction that separates `first`.
    pub normal: Vector3<f64>,
    /// Interpenetration depth along the normal; positive means overlapping.
    pub penetration: f64,
    /// Material response for this contact.
    pub params: ContactParams,

    contact_to_world: Matrix3<f64>,
    relative_position: [Vector3<f64>; 2],
    contact_velocity: Vector3<f64>,
    desired_delta_velocity: f64,
}

impl Contact {
    /// Create a contact; derived state is filled in by
    /// [`calculate_internals`](Self::calculate_internals).
    #[must_use]
    pub fn new(
        first: BodyId,
        second: Option<BodyId>,
        position: Point3<f64>,
        normal: Vector3<f64>,
        penetration: f64,
        params: ContactParams,
    ) -> Self {
        Self {
            first,
            second,
            position,
            normal,
            penetration,
            params,
            contact_to_world: Matrix3::identity(),
            relative_position: [Vector3::zeros(); 2],
            contact_velocity: Vector3::zeros(),
            desired_delta_velocity: 0.0,
        }
    }

    /// The occupied body slots as `(slot, id)` pairs.
    pub fn body_ids(&self) -> impl Iterator<Item = (usize, BodyId)> {
        [(0, Some(self.first)), (1, self.second)]
            .into_iter()
            .filter_map(|(slot, id)| id.map(|id| (slot, id)))
    }

    /// True if the contact touches the given body.
    #[must_use]
    pub fn involves(&self, id: BodyId) -> bool {
        self.first == id || self.second == Some(id)
    }

    /// Contact-space to world-space rotation; the normal is its first
    /// column. Valid after [`calculate_internals`](Self::calculate_internals).
    #[must_use]
    pub fn contact_to_world(&self) -> Matrix3<f64> {
        self.contact_to_world
    }

    /// Closing velocity in contact space; `x` is the speed along the
    /// normal, negative while the bodies approach.
    #[must_use]
    pub fn contact_velocity(&self) -> Vector3<f64> {
        self.contact_velocity
    }

    /// The velocity change the impulse pass must produce along the normal.
    #[must_use]
    pub fn desired_delta_velocity(&self) -> f64 {
        self.desired_delta_velocity
    }

    /// Contact point relative to a body's center of mass.
    ///
    /// # Panics
    ///
    /// `slot` must be 0 (the first body) or 1 (the second); anything else
    /// is a caller bug.
    #[must_use]
    pub fn relative_position(&self, slot: usize) -> Vector3<f64> {
        debug_assert!(slot < 2, "contact slot out of range: {slot}");
        self.relative_position[slot]
    }

    /// Refresh all derived state: the contact basis, per-body relative
    /// positions, the closing velocity, and the desired velocity change.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidBody`] if a referenced body is gone.
    pub fn calculate_internals(&mut self, bodies: &BodySet, dt: f64) -> Result<(), PhysicsError> {
        self.calculate_basis();

        let first = bodies
            .get(self.first)
            .ok_or(PhysicsError::InvalidBody { id: self.first })?;
        self.relative_position[0] = self.position - first.position();
        let mut velocity = self.local_velocity(first, 0, dt);

        if let Some(id) = self.second {
            let second = bodies.get(id).ok_or(PhysicsError::InvalidBody { id })?;
            self.relative_position[1] = self.position - second.position();
            velocity -= self.local_velocity(second, 1, dt);
        }
        self.contact_velocity = velocity;

        self.calculate_desired_delta_velocity(bodies, dt)
    }

    /// Wake the sleeping body when the other one is awake, so a moving
    /// body transfers activity into whatever it hits. Contacts against
    /// fixed geometry never wake anything.
    pub fn match_awake_state(&self, bodies: &mut BodySet) {
        let Some(second_id) = self.second else {
            return;
        };
        let (Some(first), Some(second)) = (bodies.get(self.first), bodies.get(second_id)) else {
            return;
        };
        let (first_awake, second_awake) = (first.is_awake(), second.is_awake());
        if first_awake == second_awake {
            return;
        }
        let sleeper = if first_awake { second_id } else { self.first };
        if let Some(body) = bodies.get_mut(sleeper) {
            body.set_awake(true);
        }
    }

    /// Build an orthonormal basis around the normal.
    ///
    /// The first tangent lies in the world plane that excludes the
    /// normal's dominant axis; the branch on `|n.x| > |n.y|` keeps the
    /// normalization factor away from zero.
    fn calculate_basis(&mut self) {
        let n = self.normal;
        let tangent0 = if n.x.abs() > n.y.abs() {
            let s = 1.0 / (n.z * n.z + n.x * n.x).sqrt();
            Vector3::new(n.z * s, 0.0, -n.x * s)
        } else {
            let s = 1.0 / (n.z * n.z + n.y * n.y).sqrt();
            Vector3::new(0.0, -n.z * s, n.y * s)
        };
        let tangent1 = n.cross(&tangent0);
        self.contact_to_world = Matrix3::from_columns(&[n, tangent0, tangent1]);
    }

    /// Velocity of the contact point on one body, in contact space.
    ///
    /// Includes the velocity the last tick's acceleration contributed,
    /// with its normal component removed: only planar acceleration feeds
    /// the friction solve.
    fn local_velocity(&self, body: &RigidBody, slot: usize, dt: f64) -> Vector3<f64> {
        let world_to_contact = self.contact_to_world.transpose();

        let velocity = body.velocity_at(&self.relative_position[slot]);
        let contact_velocity = world_to_contact * velocity;

        let mut acc_velocity = world_to_contact * (body.last_frame_acceleration() * dt);
        acc_velocity.x = 0.0;
        contact_velocity + acc_velocity
    }

    /// Recompute the target velocity change along the normal.
    ///
    /// Restitution applies to the closing speed minus the part that the
    /// last tick's acceleration built up (resting contacts otherwise gain
    /// energy every tick), and is suppressed entirely below
    /// `velocity_limit` so settled stacks stop micro-bouncing.
    pub(crate) fn calculate_desired_delta_velocity(
        &mut self,
        bodies: &BodySet,
        dt: f64,
    ) -> Result<(), PhysicsError> {
        let first = bodies
            .get(self.first)
            .ok_or(PhysicsError::InvalidBody { id: self.first })?;

        let mut velocity_from_acc = 0.0;
        if first.is_awake() {
            velocity_from_acc += (first.last_frame_acceleration() * dt).dot(&self.normal);
        }
        if let Some(id) = self.second {
            let second = bodies.get(id).ok_or(PhysicsError::InvalidBody { id })?;
            if second.is_awake() {
                velocity_from_acc -= (second.last_frame_acceleration() * dt).dot(&self.normal);
            }
        }

        let restitution = if self.contact_velocity.x.abs() < self.params.velocity_limit {
            0.0
        } else {
            self.params.restitution
        };

        self.desired_delta_velocity =
            -self.contact_velocity.x - restitution * (self.contact_velocity.x - velocity_from_acc);
        Ok(())
    }

    /// Resolve `penetration` units of overlap by moving and rotating the
    /// bodies, proportioned by how much each yields along the normal.
    ///
    /// The angular share is capped at `angular_limit` times the lever arm
    /// and the excess shifted back into translation, so deep contacts near
    /// the center of mass do not demand huge rotations.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidBody`] if a referenced body is gone.
    pub fn apply_position_change(
        &self,
        bodies: &mut BodySet,
        penetration: f64,
    ) -> Result<PairChange, PhysicsError> {
        let mut linear_inertia = [0.0_f64; 2];
        let mut angular_inertia = [0.0_f64; 2];
        let mut total_inertia = 0.0;

        for (slot, id) in self.body_ids() {
            let body = bodies.get(id).ok_or(PhysicsError::InvalidBody { id })?;
            let rel = self.relative_position[slot];
            let angular_inertia_world =
                (body.inverse_inertia_world() * rel.cross(&self.normal)).cross(&rel);
            angular_inertia[slot] = angular_inertia_world.dot(&self.normal);
            linear_inertia[slot] = body.inverse_mass();
            total_inertia += linear_inertia[slot] + angular_inertia[slot];
        }

        let mut change = PairChange::default();
        if total_inertia <= 0.0 {
            // Nothing yields along the normal; leave the overlap alone.
            return Ok(change);
        }

        for (slot, id) in self.body_ids() {
            let sign = if slot == 0 { 1.0 } else { -1.0 };
            let mut angular_move = sign * penetration * (angular_inertia[slot] / total_inertia);
            let mut linear_move = sign * penetration * (linear_inertia[slot] / total_inertia);

            let rel = self.relative_position[slot];
            let projection = rel - self.normal * rel.dot(&self.normal);
            let max_magnitude = self.params.angular_limit * projection.norm();
            if angular_move < -max_magnitude {
                let total_move = angular_move + linear_move;
                angular_move = -max_magnitude;
                linear_move = total_move - angular_move;
            } else if angular_move > max_magnitude {
                let total_move = angular_move + linear_move;
                angular_move = max_magnitude;
                linear_move = total_move - angular_move;
            }

            // angular_move == 0 also covers angular_inertia == 0: a lever
            // arm parallel to the normal gets no rotational share.
            if angular_move != 0.0 {
                let body = bodies.get(id).ok_or(PhysicsError::InvalidBody { id })?;
                let target_direction = rel.cross(&self.normal);
                change.angular[slot] = (body.inverse_inertia_world() * target_direction)
                    * (angular_move / angular_inertia[slot]);
            }
            change.linear[slot] = self.normal * linear_move;

            let body = bodies.get_mut(id).ok_or(PhysicsError::InvalidBody { id })?;
            body.move_by(change.linear[slot]);
            body.rotate_by(change.angular[slot]);
        }

        Ok(change)
    }

    /// Apply the impulse that drives the closing velocity to its target,
    /// splitting it into per-body velocity and spin changes.
    ///
    /// With friction the full 3×3 contact-space solve runs and the result
    /// is clamped to the Coulomb cone; a singular friction matrix falls
    /// back to the frictionless closed form, and a contact no impulse can
    /// affect is left untouched.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidBody`] if a referenced body is gone.
    pub fn apply_velocity_change(&self, bodies: &mut BodySet) -> Result<PairChange, PhysicsError> {
        let mut inverse_inertia = [Matrix3::zeros(); 2];
        let mut total_inverse_mass = 0.0;
        for (slot, id) in self.body_ids() {
            let body = bodies.get(id).ok_or(PhysicsError::InvalidBody { id })?;
            inverse_inertia[slot] = body.inverse_inertia_world();
            total_inverse_mass += body.inverse_mass();
        }

        let impulse_contact = if self.params.friction == 0.0 {
            self.frictionless_impulse(&inverse_inertia, total_inverse_mass)
        } else {
            self.friction_impulse(&inverse_inertia, total_inverse_mass)
                .or_else(|| {
                    tracing::debug!(
                        contact_position = ?self.position,
                        "singular friction matrix, falling back to frictionless impulse"
                    );
                    self.frictionless_impulse(&inverse_inertia, total_inverse_mass)
                })
        };
        let Some(impulse_contact) = impulse_contact else {
            return Ok(PairChange::default());
        };

        let impulse = self.contact_to_world * impulse_contact;

        let mut change = PairChange::default();
        for (slot, id) in self.body_ids() {
            let sign = if slot == 0 { 1.0 } else { -1.0 };
            let body = bodies.get_mut(id).ok_or(PhysicsError::InvalidBody { id })?;
            change.linear[slot] = impulse * (body.inverse_mass() * sign);
            change.angular[slot] =
                (body.inverse_inertia_world() * self.relative_position[slot].cross(&impulse))
                    * sign;
            body.add_velocity(change.linear[slot]);
            body.add_angular_velocity(change.angular[slot]);
        }

        Ok(change)
    }

    /// Impulse along the normal only: target velocity change divided by
    /// the velocity change a unit impulse produces. `None` when nothing
    /// yields.
    fn frictionless_impulse(
        &self,
        inverse_inertia: &[Matrix3<f64>; 2],
        total_inverse_mass: f64,
    ) -> Option<Vector3<f64>> {
        let mut delta_velocity = total_inverse_mass;
        for (slot, _) in self.body_ids() {
            let rel = self.relative_position[slot];
            let delta_vel_world = (inverse_inertia[slot] * rel.cross(&self.normal)).cross(&rel);
            delta_velocity += delta_vel_world.dot(&self.normal);
        }

        if delta_velocity <= 0.0 {
            return None;
        }
        Some(Vector3::new(
            self.desired_delta_velocity / delta_velocity,
            0.0,
            0.0,
        ))
    }

    /// Full three-axis impulse with Coulomb friction.
    ///
    /// Builds the matrix mapping a contact-space impulse to the velocity
    /// change it produces,
    ///
    /// ```text
    /// Δv = basisᵀ · ( Σ −skew(rᵢ) · I⁻¹ᵢ · skew(rᵢ) ) · basis + (Σ 1/mᵢ) · E
    /// ```
    ///
    /// inverts it against the velocity to kill (the desired change along
    /// the normal, the full planar velocity across it), then clamps the
    /// planar part to `friction ·` the normal impulse, recomputing the
    /// normal component against the clamped direction. `None` when the
    /// matrix is singular.
    fn friction_impulse(
        &self,
        inverse_inertia: &[Matrix3<f64>; 2],
        total_inverse_mass: f64,
    ) -> Option<Vector3<f64>> {
        let friction = self.params.friction;

        let mut delta_vel_world = Matrix3::zeros();
        for (slot, _) in self.body_ids() {
            let skew = self.relative_position[slot].cross_matrix();
            delta_vel_world += -(skew * inverse_inertia[slot] * skew);
        }

        let mut delta_velocity =
            self.contact_to_world.transpose() * delta_vel_world * self.contact_to_world;
        delta_velocity[(0, 0)] += total_inverse_mass;
        delta_velocity[(1, 1)] += total_inverse_mass;
        delta_velocity[(2, 2)] += total_inverse_mass;

        let impulse_matrix = delta_velocity.try_inverse()?;

        let vel_kill = Vector3::new(
            self.desired_delta_velocity,
            -self.contact_velocity.y,
            -self.contact_velocity.z,
        );
        let mut impulse = impulse_matrix * vel_kill;

        let planar = (impulse.y * impulse.y + impulse.z * impulse.z).sqrt();
        if planar > impulse.x * friction && planar > 0.0 {
            impulse.y /= planar;
            impulse.z /= planar;
            impulse.x = delta_velocity[(0, 0)]
                + delta_velocity[(0, 1)] * friction * impulse.y
                + delta_velocity[(0, 2)] * friction * impulse.z;
            impulse.x = self.desired_delta_velocity / impulse.x;
            impulse.y *= friction * impulse.x;
            impulse.z *= friction * impulse.x;
        }
        Some(impulse)
    }

    /// Fold another contact's positional correction into this one's
    /// penetration. `linear`/`angular` are the applied deltas for the body
    /// this contact holds in `slot`.
    pub(crate) fn propagate_position(
        &mut self,
        slot: usize,
        linear: &Vector3<f64>,
        angular: &Vector3<f64>,
    ) {
        let delta = linear + angular.cross(&self.relative_position[slot]);
        let sign = if slot == 1 { 1.0 } else { -1.0 };
        self.penetration += delta.dot(&self.normal) * sign;
    }

    /// Fold another contact's impulse into this one's closing velocity.
    pub(crate) fn propagate_velocity(
        &mut self,
        slot: usize,
        linear: &Vector3<f64>,
        angular: &Vector3<f64>,
    ) {
        let delta = linear + angular.cross(&self.relative_position[slot]);
        let sign = if slot == 1 { -1.0 } else { 1.0 };
        self.contact_velocity += (self.contact_to_world.transpose() * delta) * sign;
    }
}
