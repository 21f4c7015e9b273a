//! The particle world: storage plus the per-tick pipeline.
//!
//! A step runs forces, integration, contact gathering, and resolution in
//! that order. Contacts come only from registered link generators; there
//! is no broad phase here because links name their endpoints directly.

use nalgebra::Vector3;
use riposte_types::PhysicsError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::contact::{ParticleContact, ParticleContactResolver};
use crate::force::ParticleForceRegistry;
use crate::links::ParticleContactGenerator;
use crate::particle::{Particle, ParticleDesc, ParticleId, ParticleSet};

/// Tuning for a [`ParticleWorld`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParticleWorldConfig {
    /// Acceleration applied to mass-bearing particles at creation.
    pub gravity: Vector3<f64>,
    /// Resolver iteration budget when `auto_iterations` is off.
    pub iterations: u32,
    /// Budget two resolver iterations per gathered contact each tick.
    pub auto_iterations: bool,
}

impl Default for ParticleWorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vector3::new(0.0, -9.81, 0.0),
            iterations: 8,
            auto_iterations: true,
        }
    }
}

impl ParticleWorldConfig {
    /// Check the configuration for unusable values.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidConfig`] when gravity is not finite or a
    /// fixed iteration budget is zero.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !self.gravity.iter().all(|c| c.is_finite()) {
            return Err(PhysicsError::invalid_config("gravity must be finite"));
        }
        if !self.auto_iterations && self.iterations == 0 {
            return Err(PhysicsError::invalid_config(
                "fixed resolver budget must allow at least one iteration",
            ));
        }
        Ok(())
    }
}

/// What one [`ParticleWorld::step`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticleStepReport {
    /// Contacts gathered from link generators this tick.
    pub contacts: usize,
    /// Resolver iterations actually spent.
    pub iterations_used: u32,
}

/// A self-contained point-mass simulation.
///
/// Owns the particles, the force registry, and the link generators, and
/// advances them together one fixed timestep at a time.
#[derive(Debug)]
pub struct ParticleWorld {
    config: ParticleWorldConfig,
    particles: ParticleSet,
    registry: ParticleForceRegistry,
    links: Vec<Option<Box<dyn ParticleContactGenerator>>>,
    contacts: Vec<ParticleContact>,
}

impl ParticleWorld {
    /// Build a world from a validated configuration.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidConfig`] when the configuration fails
    /// [`ParticleWorldConfig::validate`].
    pub fn new(config: ParticleWorldConfig) -> Result<Self, PhysicsError> {
        config.validate()?;
        Ok(Self {
            config,
            particles: ParticleSet::new(),
            registry: ParticleForceRegistry::new(),
            links: Vec::new(),
            contacts: Vec::new(),
        })
    }

    /// The configuration this world was built with.
    #[must_use]
    pub fn config(&self) -> &ParticleWorldConfig {
        &self.config
    }

    /// Number of live particles.
    #[must_use]
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Look up a particle.
    #[must_use]
    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.get(id)
    }

    /// Look up a particle mutably.
    pub fn particle_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.particles.get_mut(id)
    }

    /// The force registry, for binding generators to particles.
    pub fn forces(&mut self) -> &mut ParticleForceRegistry {
        &mut self.registry
    }

    /// Create a particle.
    ///
    /// Mass-bearing particles start under world gravity unless the
    /// description opts out.
    pub fn add_particle(&mut self, desc: ParticleDesc) -> ParticleId {
        let gravity = self.config.gravity;
        let wants_gravity = desc.affected_by_gravity;
        let mut particle = Particle::new(desc);
        if particle.has_finite_mass() && wants_gravity {
            particle.set_acceleration(gravity);
        }
        self.particles.insert(particle)
    }

    /// Remove a particle along with its force bindings.
    ///
    /// Link generators that still reference the particle are left in
    /// place and will surface a structural error on the next step.
    pub fn remove_particle(&mut self, id: ParticleId) -> bool {
        if self.particles.remove(id).is_none() {
            return false;
        }
        self.registry.clear_particle(id);
        true
    }

    /// Register a link generator, returning a handle for removal.
    pub fn add_link<G>(&mut self, generator: G) -> usize
    where
        G: ParticleContactGenerator + 'static,
    {
        let boxed: Box<dyn ParticleContactGenerator> = Box::new(generator);
        for (index, slot) in self.links.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(boxed);
                return index;
            }
        }
        self.links.push(Some(boxed));
        self.links.len() - 1
    }

    /// Remove a link generator by handle.
    pub fn remove_link(&mut self, handle: usize) -> bool {
        match self.links.get_mut(handle) {
            Some(slot) => slot.take().is_some(),
            None => false,
        }
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidConfig`] for a non-positive or non-finite
    /// timestep, and structural errors when a binding or link references
    /// a removed particle.
    pub fn step(&mut self, dt: f64) -> Result<ParticleStepReport, PhysicsError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(PhysicsError::invalid_config(
                "timestep must be positive and finite",
            ));
        }

        self.registry.update_forces(&mut self.particles, dt)?;
        for (_, particle) in self.particles.iter_mut() {
            particle.integrate(dt);
            particle.clear_accumulator();
        }

        self.contacts.clear();
        for link in self.links.iter().flatten() {
            link.add_contacts(&self.particles, &mut self.contacts)?;
        }

        let budget = if self.config.auto_iterations {
            u32::try_from(self.contacts.len()).unwrap_or(u32::MAX).saturating_mul(2)
        } else {
            self.config.iterations
        };
        let resolver = ParticleContactResolver::new(budget);
        let iterations_used =
            resolver.resolve_contacts(&mut self.particles, &mut self.contacts, dt)?;

        Ok(ParticleStepReport {
            contacts: self.contacts.len(),
            iterations_used,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::force::Spring;
    use crate::links::{Cable, Rod};
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    const DT: f64 = 1.0 / 60.0;

    #[test]
    fn bad_configs_are_rejected() {
        let nan_gravity = ParticleWorldConfig {
            gravity: Vector3::new(0.0, f64::NAN, 0.0),
            ..ParticleWorldConfig::default()
        };
        assert!(ParticleWorld::new(nan_gravity).is_err());

        let zero_budget = ParticleWorldConfig {
            iterations: 0,
            auto_iterations: false,
            ..ParticleWorldConfig::default()
        };
        assert!(ParticleWorld::new(zero_budget).is_err());

        let mut world = ParticleWorld::new(ParticleWorldConfig::default()).unwrap();
        assert!(world.step(0.0).is_err());
        assert!(world.step(f64::NAN).is_err());
    }

    #[test]
    fn gravity_is_applied_at_creation() {
        let mut world = ParticleWorld::new(ParticleWorldConfig::default()).unwrap();
        let falling = world.add_particle(ParticleDesc::new(1.0).with_damping(1.0));
        let exempt = world.add_particle(
            ParticleDesc::new(1.0).with_damping(1.0).with_gravity(false),
        );

        world.step(1.0).unwrap();

        // Position moves before the velocity update, so the first tick
        // leaves it at the origin while the velocity picks up gravity.
        let body = world.particle(falling).unwrap();
        assert_relative_eq!(body.position(), Point3::origin());
        assert_relative_eq!(body.velocity(), Vector3::new(0.0, -9.81, 0.0));
        assert_relative_eq!(world.particle(exempt).unwrap().velocity(), Vector3::zeros());
    }

    #[test]
    fn cable_pendulum_never_exceeds_its_length() {
        let mut world = ParticleWorld::new(ParticleWorldConfig::default()).unwrap();
        let bob = world.add_particle(
            ParticleDesc::new(1.0).with_position(Point3::new(0.0, -1.0, 0.0)),
        );
        let anchor = world.add_particle(
            ParticleDesc::new(0.0).with_position(Point3::new(0.0, 0.0, 0.0)),
        );
        world.add_link(Cable::new(bob, anchor, 2.0, 0.0));

        for _ in 0..240 {
            world.step(DT).unwrap();
        }

        let span = world.particle(anchor).unwrap().position()
            - world.particle(bob).unwrap().position();
        assert!(
            span.norm() <= 2.0 + 1e-6,
            "cable stretched to {}",
            span.norm()
        );
    }

    #[test]
    fn rod_holds_its_endpoints_at_fixed_distance() {
        let config = ParticleWorldConfig {
            gravity: Vector3::zeros(),
            ..ParticleWorldConfig::default()
        };
        let mut world = ParticleWorld::new(config).unwrap();
        let left = world.add_particle(
            ParticleDesc::new(1.0)
                .with_position(Point3::new(-0.4, 0.0, 0.0))
                .with_damping(1.0),
        );
        let right = world.add_particle(
            ParticleDesc::new(1.0)
                .with_position(Point3::new(0.4, 0.0, 0.0))
                .with_damping(1.0),
        );
        world.add_link(Rod::new(left, right, 1.0));

        let report = world.step(DT).unwrap();
        assert_eq!(report.contacts, 1);

        let span = world.particle(right).unwrap().position()
            - world.particle(left).unwrap().position();
        assert_relative_eq!(span.norm(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn auto_iterations_budget_tracks_contact_count() {
        let mut world = ParticleWorld::new(ParticleWorldConfig::default()).unwrap();
        let bob = world.add_particle(
            ParticleDesc::new(1.0).with_position(Point3::new(0.0, -3.0, 0.0)),
        );
        let anchor = world.add_particle(ParticleDesc::new(0.0));
        world.add_link(Cable::new(bob, anchor, 2.0, 0.0));

        let report = world.step(DT).unwrap();
        assert_eq!(report.contacts, 1);
        assert!(report.iterations_used <= 2);
    }

    #[test]
    fn springs_run_through_the_force_registry() {
        let config = ParticleWorldConfig {
            gravity: Vector3::zeros(),
            ..ParticleWorldConfig::default()
        };
        let mut world = ParticleWorld::new(config).unwrap();
        let anchor = world.add_particle(ParticleDesc::new(0.0));
        let bob = world.add_particle(
            ParticleDesc::new(1.0)
                .with_position(Point3::new(4.0, 0.0, 0.0))
                .with_damping(1.0),
        );
        world.forces().add(bob, Spring::new(anchor, 6.0, 1.0));

        world.step(DT).unwrap();

        // Stretched by 3 at stiffness 6: one tick of an 18 N pull.
        let velocity = world.particle(bob).unwrap().velocity();
        assert_relative_eq!(velocity.x, -18.0 * DT, epsilon = 1e-12);
    }

    #[test]
    fn removing_a_particle_clears_its_force_bindings() {
        let mut world = ParticleWorld::new(ParticleWorldConfig::default()).unwrap();
        let anchor = world.add_particle(ParticleDesc::new(0.0));
        let bob = world.add_particle(ParticleDesc::new(1.0));
        world.forces().add(bob, Spring::new(anchor, 5.0, 1.0));

        assert!(world.remove_particle(bob));
        assert!(!world.remove_particle(bob));
        assert!(world.step(DT).is_ok());
    }

    #[test]
    fn dangling_links_fail_loudly() {
        let mut world = ParticleWorld::new(ParticleWorldConfig::default()).unwrap();
        let a = world.add_particle(ParticleDesc::new(1.0));
        let b = world.add_particle(ParticleDesc::new(1.0));
        let link = world.add_link(Rod::new(a, b, 1.0));
        world.remove_particle(b);

        let err = world.step(DT).unwrap_err();
        assert!(err.is_structural());

        assert!(world.remove_link(link));
        assert!(!world.remove_link(link));
        assert!(world.step(DT).is_ok());
    }

    #[test]
    fn link_handles_are_reused_after_removal() {
        let mut world = ParticleWorld::new(ParticleWorldConfig::default()).unwrap();
        let a = world.add_particle(ParticleDesc::new(1.0));
        let b = world.add_particle(ParticleDesc::new(1.0));

        let first = world.add_link(Rod::new(a, b, 1.0));
        let second = world.add_link(Rod::new(a, b, 2.0));
        assert_ne!(first, second);

        world.remove_link(first);
        let third = world.add_link(Rod::new(a, b, 3.0));
        assert_eq!(first, third);
    }
}
