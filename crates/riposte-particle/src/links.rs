//! Cables and rods: length constraints expressed as generated contacts.
//!
//! A link watches the distance between two particles and, when the
//! constraint is violated, emits a [`ParticleContact`] that the resolver
//! corrects like any collision. A cable only resists stretching; a rod
//! resists both stretching and compression, always without bounce.

use std::fmt;

use riposte_types::PhysicsError;

use crate::contact::{lookup, ParticleContact};
use crate::particle::{ParticleId, ParticleSet};

/// Source of constraint contacts, polled once per tick.
pub trait ParticleContactGenerator: fmt::Debug {
    /// Append the contacts needed to enforce this generator's constraint.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidParticle`] if an endpoint id is stale.
    fn add_contacts(
        &self,
        particles: &ParticleSet,
        out: &mut Vec<ParticleContact>,
    ) -> Result<(), PhysicsError>;
}

/// An inextensible tether: free until taut, then it yanks the endpoints
/// back together.
#[derive(Debug, Clone)]
pub struct Cable {
    /// One endpoint.
    pub first: ParticleId,
    /// The other endpoint.
    pub second: ParticleId,
    /// Length beyond which the cable goes taut.
    pub max_length: f64,
    /// Bounce factor applied when the cable snaps taut.
    pub restitution: f64,
}

impl Cable {
    /// Tether two particles together.
    #[must_use]
    pub fn new(first: ParticleId, second: ParticleId, max_length: f64, restitution: f64) -> Self {
        Self {
            first,
            second,
            max_length,
            restitution,
        }
    }
}

impl ParticleContactGenerator for Cable {
    fn add_contacts(
        &self,
        particles: &ParticleSet,
        out: &mut Vec<ParticleContact>,
    ) -> Result<(), PhysicsError> {
        let first = lookup(particles, self.first)?.position();
        let second = lookup(particles, self.second)?.position();
        let span = second - first;
        let length = span.norm();
        if length < self.max_length || length <= 0.0 {
            return Ok(());
        }

        // The normal points along the cable so the impulse pulls the
        // endpoints together.
        out.push(ParticleContact {
            first: self.first,
            second: Some(self.second),
            normal: span / length,
            restitution: self.restitution,
            penetration: length - self.max_length,
        });
        Ok(())
    }
}

/// A fixed-length strut: resists both stretching and compression, with no
/// bounce in either direction.
#[derive(Debug, Clone)]
pub struct Rod {
    /// One endpoint.
    pub first: ParticleId,
    /// The other endpoint.
    pub second: ParticleId,
    /// Distance the rod maintains.
    pub length: f64,
}

impl Rod {
    /// Pin two particles at a fixed separation.
    #[must_use]
    pub fn new(first: ParticleId, second: ParticleId, length: f64) -> Self {
        Self {
            first,
            second,
            length,
        }
    }
}

impl ParticleContactGenerator for Rod {
    fn add_contacts(
        &self,
        particles: &ParticleSet,
        out: &mut Vec<ParticleContact>,
    ) -> Result<(), PhysicsError> {
        let first = lookup(particles, self.first)?.position();
        let second = lookup(particles, self.second)?.position();
        let span = second - first;
        let current = span.norm();
        if current <= 0.0 {
            return Ok(());
        }
        let delta = current - self.length;
        let direction = span / current;

        let contact = if delta > 0.0 {
            ParticleContact {
                first: self.first,
                second: Some(self.second),
                normal: direction,
                restitution: 0.0,
                penetration: delta,
            }
        } else if delta < 0.0 {
            ParticleContact {
                first: self.first,
                second: Some(self.second),
                normal: -direction,
                restitution: 0.0,
                penetration: -delta,
            }
        } else {
            return Ok(());
        };
        out.push(contact);
        Ok(())
    }
}
