//! Force generators and the registry binding them to particles.
//!
//! A generator computes one force for one target particle each tick.
//! Bindings live in a [`ParticleForceRegistry`]; the world asks the
//! registry to [`update_forces`](ParticleForceRegistry::update_forces)
//! before integrating, so the forces land in the accumulators the same
//! tick they are computed.

use std::fmt;

use nalgebra::{Point3, Vector3};
use riposte_types::PhysicsError;

use crate::contact::{lookup, lookup_mut};
use crate::particle::{ParticleId, ParticleSet};

/// Computes a force for a target particle once per tick.
pub trait ParticleForceGenerator: fmt::Debug {
    /// Accumulate this generator's force on `target`.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidParticle`] if `target` or any particle the
    /// generator references is stale.
    fn update_force(
        &self,
        target: ParticleId,
        particles: &mut ParticleSet,
        dt: f64,
    ) -> Result<(), PhysicsError>;
}

/// Constant acceleration scaled by the target's mass.
///
/// Useful for gravity fields that differ from the world default;
/// immovable targets are left alone.
#[derive(Debug, Clone, Copy)]
pub struct UniformGravity {
    /// Acceleration to apply.
    pub gravity: Vector3<f64>,
}

impl UniformGravity {
    /// A field with the given acceleration.
    #[must_use]
    pub fn new(gravity: Vector3<f64>) -> Self {
        Self { gravity }
    }
}

impl ParticleForceGenerator for UniformGravity {
    fn update_force(
        &self,
        target: ParticleId,
        particles: &mut ParticleSet,
        _dt: f64,
    ) -> Result<(), PhysicsError> {
        let particle = lookup_mut(particles, target)?;
        if !particle.has_finite_mass() {
            return Ok(());
        }
        let mass = 1.0 / particle.inverse_mass();
        particle.add_force(self.gravity * mass);
        Ok(())
    }
}

/// Mutual inverse-square attraction toward every other particle.
///
/// Each tick the target is pulled toward every finite-mass particle in
/// the set with magnitude `constant · m_target · m_other / dist²`.
/// Register one binding per particle that should feel the pull; a pair
/// bound both ways attracts symmetrically. Coincident neighbours give no
/// direction to pull along and contribute nothing.
#[derive(Debug, Clone, Copy)]
pub struct NBodyGravity {
    /// Gravitational constant; the physical value is ~6.67e-11, larger
    /// ones suit hand-sized scenes.
    pub constant: f64,
}

impl NBodyGravity {
    /// An attractor field with the given gravitational constant.
    #[must_use]
    pub fn new(constant: f64) -> Self {
        Self { constant }
    }
}

impl ParticleForceGenerator for NBodyGravity {
    fn update_force(
        &self,
        target: ParticleId,
        particles: &mut ParticleSet,
        _dt: f64,
    ) -> Result<(), PhysicsError> {
        let subject = lookup(particles, target)?;
        if !subject.has_finite_mass() {
            return Ok(());
        }
        let position = subject.position();
        let mass = 1.0 / subject.inverse_mass();

        let mut pull = Vector3::zeros();
        for (id, other) in particles.iter() {
            if id == target || !other.has_finite_mass() {
                continue;
            }
            let span = other.position() - position;
            let distance_squared = span.norm_squared();
            if distance_squared <= 0.0 {
                continue;
            }
            let other_mass = 1.0 / other.inverse_mass();
            pull += span / distance_squared.sqrt()
                * (self.constant * mass * other_mass / distance_squared);
        }

        lookup_mut(particles, target)?.add_force(pull);
        Ok(())
    }
}

/// Hooke's-law spring between the target and another particle.
#[derive(Debug, Clone, Copy)]
pub struct Spring {
    /// Particle the far end is attached to.
    pub other: ParticleId,
    /// Stiffness.
    pub spring_constant: f64,
    /// Length at which the spring exerts no force.
    pub rest_length: f64,
}

impl Spring {
    /// A spring to `other` with the given stiffness and rest length.
    #[must_use]
    pub fn new(other: ParticleId, spring_constant: f64, rest_length: f64) -> Self {
        Self {
            other,
            spring_constant,
            rest_length,
        }
    }
}

impl ParticleForceGenerator for Spring {
    fn update_force(
        &self,
        target: ParticleId,
        particles: &mut ParticleSet,
        _dt: f64,
    ) -> Result<(), PhysicsError> {
        let far_end = lookup(particles, self.other)?.position();
        let particle = lookup_mut(particles, target)?;
        let span = particle.position() - far_end;
        let length = span.norm();
        if length <= 0.0 {
            return Ok(());
        }
        let magnitude = (length - self.rest_length) * self.spring_constant;
        particle.add_force(span / length * -magnitude);
        Ok(())
    }
}

/// Hooke's-law spring between the target and a fixed point.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredSpring {
    /// Fixed point the far end is attached to.
    pub anchor: Point3<f64>,
    /// Stiffness.
    pub spring_constant: f64,
    /// Length at which the spring exerts no force.
    pub rest_length: f64,
}

impl AnchoredSpring {
    /// A spring to a fixed anchor.
    #[must_use]
    pub fn new(anchor: Point3<f64>, spring_constant: f64, rest_length: f64) -> Self {
        Self {
            anchor,
            spring_constant,
            rest_length,
        }
    }
}

impl ParticleForceGenerator for AnchoredSpring {
    fn update_force(
        &self,
        target: ParticleId,
        particles: &mut ParticleSet,
        _dt: f64,
    ) -> Result<(), PhysicsError> {
        let particle = lookup_mut(particles, target)?;
        let span = particle.position() - self.anchor;
        let length = span.norm();
        if length <= 0.0 {
            return Ok(());
        }
        let magnitude = (length - self.rest_length) * self.spring_constant;
        particle.add_force(span / length * -magnitude);
        Ok(())
    }
}

/// A spring that only acts while stretched, like an elastic cord.
#[derive(Debug, Clone, Copy)]
pub struct Bungee {
    /// Particle the far end is attached to.
    pub other: ParticleId,
    /// Stiffness while extended.
    pub spring_constant: f64,
    /// Length beyond which the cord engages.
    pub rest_length: f64,
}

impl Bungee {
    /// An elastic cord to `other`.
    #[must_use]
    pub fn new(other: ParticleId, spring_constant: f64, rest_length: f64) -> Self {
        Self {
            other,
            spring_constant,
            rest_length,
        }
    }
}

impl ParticleForceGenerator for Bungee {
    fn update_force(
        &self,
        target: ParticleId,
        particles: &mut ParticleSet,
        _dt: f64,
    ) -> Result<(), PhysicsError> {
        let far_end = lookup(particles, self.other)?.position();
        let particle = lookup_mut(particles, target)?;
        let span = particle.position() - far_end;
        let length = span.norm();
        if length <= self.rest_length {
            return Ok(());
        }
        let magnitude = (length - self.rest_length) * self.spring_constant;
        particle.add_force(span / length * -magnitude);
        Ok(())
    }
}

/// Bindings between force generators and the particles they act on.
#[derive(Debug, Default)]
pub struct ParticleForceRegistry {
    entries: Vec<Registration>,
}

#[derive(Debug)]
struct Registration {
    target: ParticleId,
    generator: Box<dyn ParticleForceGenerator>,
}

impl ParticleForceRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no bindings exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bind a generator to a target particle.
    pub fn add<G>(&mut self, target: ParticleId, generator: G)
    where
        G: ParticleForceGenerator + 'static,
    {
        self.entries.push(Registration {
            target,
            generator: Box::new(generator),
        });
    }

    /// Drop every binding whose target is the given particle.
    pub fn clear_particle(&mut self, target: ParticleId) {
        self.entries.retain(|entry| entry.target != target);
    }

    /// Drop all bindings.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Run every binding, accumulating forces for this tick.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidParticle`] if any binding references a stale
    /// particle.
    pub fn update_forces(
        &self,
        particles: &mut ParticleSet,
        dt: f64,
    ) -> Result<(), PhysicsError> {
        for entry in &self.entries {
            entry.generator.update_force(entry.target, particles, dt)?;
        }
        Ok(())
    }
}
