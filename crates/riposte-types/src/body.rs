//! Rigid-body state, integration, and id-addressed storage.
//!
//! A [`RigidBody`] carries the full dynamic state advanced each tick:
//! position and orientation, linear and angular velocity, a constant
//! acceleration slot (world gravity lands there at registration), force and
//! torque accumulators, and the inverse inertia tensor in both body and
//! world space. Integration is semi-implicit Euler with per-second damping
//! powers, so damping behaves identically across timestep sizes.
//!
//! Bodies live in a [`BodySet`]: slots are tombstoned on removal and never
//! reused, which makes a stale [`BodyId`] detectable instead of silently
//! aliasing a newer body.

use std::fmt;

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;

/// Identifier of a rigid body within a [`BodySet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId(u32);

impl BodyId {
    /// Create a body id from a raw slot index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The raw slot index.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for BodyId {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Initial conditions for a rigid body.
///
/// ```
/// use riposte_types::BodyDesc;
/// use nalgebra::{Point3, Vector3};
///
/// let desc = BodyDesc::new(2.0)
///     .with_position(Point3::new(0.0, 5.0, 0.0))
///     .with_velocity(Vector3::new(1.0, 0.0, 0.0));
/// assert_eq!(desc.mass, 2.0);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyDesc {
    /// Mass in kilograms; zero, negative, or non-finite means immovable.
    pub mass: f64,
    /// Starting position.
    pub position: Point3<f64>,
    /// Starting orientation.
    pub orientation: UnitQuaternion<f64>,
    /// Starting linear velocity.
    pub velocity: Vector3<f64>,
    /// Starting angular velocity.
    pub angular_velocity: Vector3<f64>,
    /// Per-second retention factor for linear velocity, in `[0, 1]`.
    pub linear_damping: f64,
    /// Per-second retention factor for angular velocity, in `[0, 1]`.
    pub angular_damping: f64,
    /// Whether world gravity applies to this body.
    pub affected_by_gravity: bool,
    /// Whether the body may fall asleep when its motion stays low.
    pub can_sleep: bool,
}

impl Default for BodyDesc {
    fn default() -> Self {
        Self {
            mass: 1.0,
            position: Point3::origin(),
            orientation: UnitQuaternion::identity(),
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            linear_damping: 0.99,
            angular_damping: 0.99,
            affected_by_gravity: true,
            can_sleep: false,
        }
    }
}

impl BodyDesc {
    /// Start a description with the given mass and defaults elsewhere.
    #[must_use]
    pub fn new(mass: f64) -> Self {
        Self {
            mass,
            ..Self::default()
        }
    }

    /// Set the starting position.
    #[must_use]
    pub fn with_position(mut self, position: Point3<f64>) -> Self {
        self.position = position;
        self
    }

    /// Set the starting orientation.
    #[must_use]
    pub fn with_orientation(mut self, orientation: UnitQuaternion<f64>) -> Self {
        self.orientation = orientation;
        self
    }

    /// Set the starting linear velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the starting angular velocity.
    #[must_use]
    pub fn with_angular_velocity(mut self, angular_velocity: Vector3<f64>) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    /// Set both damping factors.
    #[must_use]
    pub fn with_damping(mut self, linear: f64, angular: f64) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Enable or disable world gravity for this body.
    #[must_use]
    pub fn with_gravity(mut self, affected: bool) -> Self {
        self.affected_by_gravity = affected;
        self
    }

    /// Allow the body to fall asleep when its motion stays low.
    #[must_use]
    pub fn with_sleeping(mut self, can_sleep: bool) -> Self {
        self.can_sleep = can_sleep;
        self
    }
}

/// Motion threshold below which a sleep-enabled body is put to sleep.
pub const SLEEP_EPSILON: f64 = 0.3;

/// Weight of the previous motion average when folding in a new sample.
const MOTION_BIAS: f64 = 0.5;

/// A rigid body: the full dynamic state advanced by integration.
#[derive(Debug, Clone)]
pub struct RigidBody {
    position: Point3<f64>,
    orientation: UnitQuaternion<f64>,
    velocity: Vector3<f64>,
    angular_velocity: Vector3<f64>,
    acceleration: Vector3<f64>,
    last_frame_acceleration: Vector3<f64>,
    force_accum: Vector3<f64>,
    torque_accum: Vector3<f64>,
    inverse_mass: f64,
    inverse_inertia_body: Matrix3<f64>,
    inverse_inertia_world: Matrix3<f64>,
    linear_damping: f64,
    angular_damping: f64,
    awake: bool,
    can_sleep: bool,
    motion: f64,
}

impl RigidBody {
    /// Build a body from its initial conditions.
    ///
    /// Non-positive or non-finite mass yields an immovable body:
    /// `inverse_mass == 0` and a zero inverse inertia tensor, which every
    /// downstream computation treats as infinite resistance.
    #[must_use]
    pub fn new(desc: BodyDesc) -> Self {
        let inverse_mass = if desc.mass > 0.0 && desc.mass.is_finite() {
            1.0 / desc.mass
        } else {
            0.0
        };
        let mut body = Self {
            position: desc.position,
            orientation: desc.orientation,
            velocity: desc.velocity,
            angular_velocity: desc.angular_velocity,
            acceleration: Vector3::zeros(),
            last_frame_acceleration: Vector3::zeros(),
            force_accum: Vector3::zeros(),
            torque_accum: Vector3::zeros(),
            inverse_mass,
            inverse_inertia_body: Matrix3::zeros(),
            inverse_inertia_world: Matrix3::zeros(),
            linear_damping: desc.linear_damping.clamp(0.0, 1.0),
            angular_damping: desc.angular_damping.clamp(0.0, 1.0),
            awake: true,
            can_sleep: desc.can_sleep,
            motion: SLEEP_EPSILON * 2.0,
        };
        body.calculate_derived_data();
        body
    }

    /// Current position of the center of mass.
    #[must_use]
    pub fn position(&self) -> Point3<f64> {
        self.position
    }

    /// Current orientation.
    #[must_use]
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.orientation
    }

    /// Current linear velocity.
    #[must_use]
    pub fn velocity(&self) -> Vector3<f64> {
        self.velocity
    }

    /// Current angular velocity.
    #[must_use]
    pub fn angular_velocity(&self) -> Vector3<f64> {
        self.angular_velocity
    }

    /// Constant acceleration applied every tick (gravity).
    #[must_use]
    pub fn acceleration(&self) -> Vector3<f64> {
        self.acceleration
    }

    /// Total acceleration the body experienced during its last
    /// integration, including accumulated forces.
    #[must_use]
    pub fn last_frame_acceleration(&self) -> Vector3<f64> {
        self.last_frame_acceleration
    }

    /// Inverse mass; zero for immovable bodies.
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        self.inverse_mass
    }

    /// True if the body can be moved by forces and impulses.
    #[must_use]
    pub fn has_finite_mass(&self) -> bool {
        self.inverse_mass > 0.0
    }

    /// Inverse inertia tensor in world space.
    #[must_use]
    pub fn inverse_inertia_world(&self) -> Matrix3<f64> {
        self.inverse_inertia_world
    }

    /// True while the body participates in integration.
    #[must_use]
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Set the constant acceleration (used at registration for gravity).
    pub fn set_acceleration(&mut self, acceleration: Vector3<f64>) {
        self.acceleration = acceleration;
    }

    /// Move the body to an absolute position.
    pub fn set_position(&mut self, position: Point3<f64>) {
        self.position = position;
    }

    /// Replace the linear velocity.
    pub fn set_velocity(&mut self, velocity: Vector3<f64>) {
        self.velocity = velocity;
    }

    /// Replace the angular velocity.
    pub fn set_angular_velocity(&mut self, angular_velocity: Vector3<f64>) {
        self.angular_velocity = angular_velocity;
    }

    /// Set the body-space inertia tensor, storing its inverse.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::DegenerateInertia`] if the tensor is singular.
    pub fn set_inertia_tensor(&mut self, tensor: Matrix3<f64>) -> Result<(), PhysicsError> {
        let inverse = tensor
            .try_inverse()
            .ok_or(PhysicsError::DegenerateInertia)?;
        self.inverse_inertia_body = inverse;
        self.calculate_derived_data();
        Ok(())
    }

    /// Wake or sleep the body.
    ///
    /// Sleeping zeroes the velocities so a later wake-up does not replay
    /// stale motion; waking seeds the motion average above the sleep
    /// threshold so the body is not immediately re-slept.
    pub fn set_awake(&mut self, awake: bool) {
        self.awake = awake;
        if awake {
            self.motion = SLEEP_EPSILON * 2.0;
        } else {
            self.velocity = Vector3::zeros();
            self.angular_velocity = Vector3::zeros();
        }
    }

    /// Accumulate a force through the center of mass.
    pub fn add_force(&mut self, force: Vector3<f64>) {
        self.force_accum += force;
        self.awake = true;
    }

    /// Accumulate a force applied at a world-space point.
    ///
    /// Off-center application also accumulates torque about the center of
    /// mass.
    pub fn add_force_at_point(&mut self, force: Vector3<f64>, point: Point3<f64>) {
        let rel = point - self.position;
        self.force_accum += force;
        self.torque_accum += rel.cross(&force);
        self.awake = true;
    }

    /// Accumulate a force applied at a body-space point.
    pub fn add_force_at_body_point(&mut self, force: Vector3<f64>, point: Point3<f64>) {
        let world = self.position + self.orientation * point.coords;
        self.add_force_at_point(force, world);
    }

    /// Velocity of a point rigidly attached to the body, given the
    /// point's world-space offset from the center of mass.
    #[must_use]
    pub fn velocity_at(&self, rel: &Vector3<f64>) -> Vector3<f64> {
        self.velocity + self.angular_velocity.cross(rel)
    }

    /// Translate the body without touching its velocity (positional
    /// contact resolution).
    pub fn move_by(&mut self, delta: Vector3<f64>) {
        self.position += delta;
    }

    /// Rotate the body by a scaled-axis rotation, refreshing derived
    /// data.
    pub fn rotate_by(&mut self, scaled_axis: Vector3<f64>) {
        self.orientation = UnitQuaternion::from_scaled_axis(scaled_axis) * self.orientation;
        self.calculate_derived_data();
    }

    /// Add to the linear velocity.
    pub fn add_velocity(&mut self, delta: Vector3<f64>) {
        self.velocity += delta;
    }

    /// Add to the angular velocity.
    pub fn add_angular_velocity(&mut self, delta: Vector3<f64>) {
        self.angular_velocity += delta;
    }

    /// Advance the body by `dt` seconds using semi-implicit Euler.
    ///
    /// Returns `true` if the position changed; the spatial index re-homes
    /// bodies that report movement. Sleeping bodies and non-positive
    /// timesteps are no-ops.
    pub fn integrate(&mut self, dt: f64) -> bool {
        if !self.awake || dt <= 0.0 {
            return false;
        }

        let start = self.position;

        self.last_frame_acceleration = self.acceleration + self.force_accum * self.inverse_mass;
        let angular_acceleration = self.inverse_inertia_world * self.torque_accum;

        self.velocity += self.last_frame_acceleration * dt;
        self.angular_velocity += angular_acceleration * dt;

        self.velocity *= self.linear_damping.powf(dt);
        self.angular_velocity *= self.angular_damping.powf(dt);

        self.position += self.velocity * dt;
        self.orientation =
            UnitQuaternion::from_scaled_axis(self.angular_velocity * dt) * self.orientation;

        self.calculate_derived_data();
        self.clear_accumulators();

        if self.can_sleep {
            let current = self.velocity.norm_squared() + self.angular_velocity.norm_squared();
            self.motion = (MOTION_BIAS * self.motion + (1.0 - MOTION_BIAS) * current)
                .clamp(0.0, SLEEP_EPSILON * 10.0);
            if self.motion < SLEEP_EPSILON {
                self.set_awake(false);
            }
        }

        self.position != start
    }

    /// Drop any accumulated force and torque.
    pub fn clear_accumulators(&mut self) {
        self.force_accum = Vector3::zeros();
        self.torque_accum = Vector3::zeros();
    }

    /// Refresh state derived from the orientation: renormalizes the
    /// quaternion and rebuilds the world-space inverse inertia tensor
    /// `R · I⁻¹ · Rᵀ`.
    pub fn calculate_derived_data(&mut self) {
        self.orientation.renormalize_fast();
        let r = self.orientation.to_rotation_matrix().into_inner();
        self.inverse_inertia_world = r * self.inverse_inertia_body * r.transpose();
    }
}

/// Id-addressed storage for rigid bodies.
///
/// Insertion hands out monotonically increasing [`BodyId`]s; removal
/// tombstones the slot. Lookups on dead or out-of-range ids return `None`
/// so callers can surface [`PhysicsError::InvalidBody`].
#[derive(Debug, Default)]
pub struct BodySet {
    slots: Vec<Option<RigidBody>>,
    live: usize,
}

impl BodySet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// True if no live bodies remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Insert a body, returning its id.
    pub fn insert(&mut self, body: RigidBody) -> BodyId {
        let id = BodyId::new(self.slots.len() as u32);
        self.slots.push(Some(body));
        self.live += 1;
        id
    }

    /// Borrow a body.
    #[must_use]
    pub fn get(&self, id: BodyId) -> Option<&RigidBody> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Mutably borrow a body.
    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Remove a body, tombstoning its slot.
    pub fn remove(&mut self, id: BodyId) -> Option<RigidBody> {
        let slot = self.slots.get_mut(id.index())?;
        let body = slot.take()?;
        self.live -= 1;
        Some(body)
    }

    /// Iterate over live bodies.
    pub fn iter(&self) -> impl Iterator<Item = (BodyId, &RigidBody)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|body| (BodyId::new(i as u32), body)))
    }

    /// Iterate mutably over live bodies.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BodyId, &mut RigidBody)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|body| (BodyId::new(i as u32), body)))
    }
}
