//! Point masses and their storage.

use nalgebra::{Point3, Vector3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Opaque handle to a particle stored in a [`ParticleSet`].
///
/// Ids are never reused, so a handle kept across a removal comes back as
/// "unknown" instead of silently pointing at a different particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParticleId(u32);

impl ParticleId {
    /// Build an id from its raw slot index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The raw slot index.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for ParticleId {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for ParticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Initial conditions for a particle.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParticleDesc {
    /// Mass in kilograms; zero, negative, or non-finite means immovable.
    pub mass: f64,
    /// Starting position.
    pub position: Point3<f64>,
    /// Starting velocity.
    pub velocity: Vector3<f64>,
    /// Per-second velocity retention factor, in `[0, 1]`.
    pub damping: f64,
    /// Whether world gravity applies to this particle.
    pub affected_by_gravity: bool,
}

impl Default for ParticleDesc {
    fn default() -> Self {
        Self {
            mass: 1.0,
            position: Point3::origin(),
            velocity: Vector3::zeros(),
            damping: 0.995,
            affected_by_gravity: true,
        }
    }
}

impl ParticleDesc {
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

    /// Set the starting velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the velocity retention factor.
    #[must_use]
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Enable or disable world gravity for this particle.
    #[must_use]
    pub fn with_gravity(mut self, affected: bool) -> Self {
        self.affected_by_gravity = affected;
        self
    }
}

/// A point mass.
#[derive(Debug, Clone)]
pub struct Particle {
    position: Point3<f64>,
    velocity: Vector3<f64>,
    acceleration: Vector3<f64>,
    force_accum: Vector3<f64>,
    inverse_mass: f64,
    damping: f64,
}

impl Particle {
    /// Build a particle from its initial conditions.
    #[must_use]
    pub fn new(desc: ParticleDesc) -> Self {
        let inverse_mass = if desc.mass > 0.0 && desc.mass.is_finite() {
            1.0 / desc.mass
        } else {
            0.0
        };
        Self {
            position: desc.position,
            velocity: desc.velocity,
            acceleration: Vector3::zeros(),
            force_accum: Vector3::zeros(),
            inverse_mass,
            damping: desc.damping.clamp(0.0, 1.0),
        }
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> Point3<f64> {
        self.position
    }

    /// Current velocity.
    #[must_use]
    pub fn velocity(&self) -> Vector3<f64> {
        self.velocity
    }

    /// Constant acceleration applied every tick (gravity).
    #[must_use]
    pub fn acceleration(&self) -> Vector3<f64> {
        self.acceleration
    }

    /// Inverse mass; zero for immovable particles.
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        self.inverse_mass
    }

    /// True if the particle can be moved by forces and impulses.
    #[must_use]
    pub fn has_finite_mass(&self) -> bool {
        self.inverse_mass > 0.0
    }

    /// Move the particle to an absolute position.
    pub fn set_position(&mut self, position: Point3<f64>) {
        self.position = position;
    }

    /// Replace the velocity.
    pub fn set_velocity(&mut self, velocity: Vector3<f64>) {
        self.velocity = velocity;
    }

    /// Set the constant acceleration.
    pub fn set_acceleration(&mut self, acceleration: Vector3<f64>) {
        self.acceleration = acceleration;
    }

    /// Accumulate a force for the next integration.
    pub fn add_force(&mut self, force: Vector3<f64>) {
        self.force_accum += force;
    }

    /// Component of the velocity along a direction.
    #[must_use]
    pub fn velocity_along(&self, direction: &Vector3<f64>) -> f64 {
        self.velocity.dot(direction)
    }

    /// Advance the particle by `dt` seconds.
    ///
    /// The position moves by the *incoming* velocity first; forces and
    /// gravity then update the velocity for the next tick. Immovable
    /// particles and non-positive timesteps are no-ops.
    pub fn integrate(&mut self, dt: f64) {
        if !self.has_finite_mass() || dt <= 0.0 {
            return;
        }

        self.position += self.velocity * dt;

        let resulting = self.acceleration + self.force_accum * self.inverse_mass;
        self.velocity += resulting * dt;
        self.velocity *= self.damping.powf(dt);

        self.clear_accumulator();
    }

    /// Drop any accumulated force.
    pub fn clear_accumulator(&mut self) {
        self.force_accum = Vector3::zeros();
    }
}

/// Arena of particles. Slots are tombstoned on removal and ids are never
/// reused.
#[derive(Debug, Default)]
pub struct ParticleSet {
    slots: Vec<Option<Particle>>,
    live: usize,
}

impl ParticleSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live particles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// True if no particles are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Store a particle, returning its id.
    pub fn insert(&mut self, particle: Particle) -> ParticleId {
        let id = ParticleId::new(self.slots.len() as u32);
        self.slots.push(Some(particle));
        self.live += 1;
        id
    }

    /// Look up a particle.
    #[must_use]
    pub fn get(&self, id: ParticleId) -> Option<&Particle> {
        self.slots.get(id.index())?.as_ref()
    }

    /// Look up a particle mutably.
    pub fn get_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.slots.get_mut(id.index())?.as_mut()
    }

    /// Remove a particle, tombstoning its slot.
    pub fn remove(&mut self, id: ParticleId) -> Option<Particle> {
        let particle = self.slots.get_mut(id.index())?.take();
        if particle.is_some() {
            self.live -= 1;
        }
        particle
    }

    /// Iterate live particles with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (ParticleId, &Particle)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| Some((ParticleId::new(i as u32), slot.as_ref()?)))
    }

    /// Iterate live particles mutably with their ids.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ParticleId, &mut Particle)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| Some((ParticleId::new(i as u32), slot.as_mut()?)))
    }
}
