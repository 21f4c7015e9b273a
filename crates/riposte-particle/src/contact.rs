//! Particle contacts and their worst-first resolver.
//!
//! A contact couples one particle to another, or to fixed scenery when
//! [`second`](ParticleContact::second) is `None`. Resolution is
//! impulse-based: first the closing velocity is replaced by the bounced
//! one, then any interpenetration is shared out in proportion to inverse
//! mass. Resting contacts get a correction that removes the velocity
//! gravity built up during the tick, so stacked particles do not buzz.

use nalgebra::Vector3;
use riposte_types::PhysicsError;

use crate::particle::{Particle, ParticleId, ParticleSet};

/// Gain on the acceleration-built closing velocity cancelled at resting
/// contacts.
const RESTING_CONTACT_DAMPING: f64 = 4.0;

/// A contact between `first` and either `second` or fixed scenery.
#[derive(Debug, Clone)]
pub struct ParticleContact {
    /// Particle the normal pushes.
    pub first: ParticleId,
    /// The other participant; `None` for contacts with fixed scenery.
    pub second: Option<ParticleId>,
    /// Unit direction the impulse pushes `first`.
    pub normal: Vector3<f64>,
    /// Bounce factor in `[0, 1]`.
    pub restitution: f64,
    /// Overlap depth along the normal; non-positive means touching at
    /// most.
    pub penetration: f64,
}

impl ParticleContact {
    /// Speed at which the participants separate; negative while closing.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidParticle`] for a stale participant.
    pub fn separating_velocity(&self, particles: &ParticleSet) -> Result<f64, PhysicsError> {
        let mut relative = lookup(particles, self.first)?.velocity();
        if let Some(second) = self.second {
            relative -= lookup(particles, second)?.velocity();
        }
        Ok(relative.dot(&self.normal))
    }

    /// Resolve the contact: velocity impulse, then interpenetration.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidParticle`] for a stale participant.
    pub fn resolve(&mut self, particles: &mut ParticleSet, dt: f64) -> Result<(), PhysicsError> {
        self.resolve_velocity(particles, dt)?;
        self.resolve_interpenetration(particles)
    }

    fn resolve_velocity(&self, particles: &mut ParticleSet, dt: f64) -> Result<(), PhysicsError> {
        let separating = self.separating_velocity(particles)?;
        if separating > 0.0 {
            return Ok(());
        }

        let mut bounced = -separating * self.restitution;

        // Velocity built up by this tick's acceleration alone. If it is
        // driving the participants together, take it back out so a resting
        // contact settles instead of micro-bouncing.
        let mut acceleration = lookup(particles, self.first)?.acceleration();
        if let Some(second) = self.second {
            acceleration -= lookup(particles, second)?.acceleration();
        }
        let built = acceleration.dot(&self.normal) * dt * RESTING_CONTACT_DAMPING;
        if built < 0.0 {
            bounced += self.restitution * built;
            if bounced < 0.0 {
                bounced = 0.0;
            }
        }

        let total_inverse_mass = self.total_inverse_mass(particles)?;
        if total_inverse_mass <= 0.0 {
            return Ok(());
        }

        let impulse = (bounced - separating) / total_inverse_mass;
        let impulse_per_imass = self.normal * impulse;

        let first = lookup_mut(particles, self.first)?;
        let delta = impulse_per_imass * first.inverse_mass();
        first.set_velocity(first.velocity() + delta);
        if let Some(second) = self.second {
            let second = lookup_mut(particles, second)?;
            let delta = impulse_per_imass * second.inverse_mass();
            second.set_velocity(second.velocity() - delta);
        }
        Ok(())
    }

    fn resolve_interpenetration(&mut self, particles: &mut ParticleSet) -> Result<(), PhysicsError> {
        if self.penetration <= 0.0 {
            return Ok(());
        }
        let total_inverse_mass = self.total_inverse_mass(particles)?;
        if total_inverse_mass <= 0.0 {
            return Ok(());
        }

        let move_per_imass = self.normal * (self.penetration / total_inverse_mass);

        let first = lookup_mut(particles, self.first)?;
        let delta = move_per_imass * first.inverse_mass();
        first.set_position(first.position() + delta);
        if let Some(second) = self.second {
            let second = lookup_mut(particles, second)?;
            let delta = move_per_imass * second.inverse_mass();
            second.set_position(second.position() - delta);
        }

        // The movement consumed the overlap; a later iteration must not
        // apply it again.
        self.penetration = 0.0;
        Ok(())
    }

    fn total_inverse_mass(&self, particles: &ParticleSet) -> Result<f64, PhysicsError> {
        let mut total = lookup(particles, self.first)?.inverse_mass();
        if let Some(second) = self.second {
            total += lookup(particles, second)?.inverse_mass();
        }
        Ok(total)
    }
}

pub(crate) fn lookup(
    particles: &ParticleSet,
    id: ParticleId,
) -> Result<&Particle, PhysicsError> {
    particles
        .get(id)
        .ok_or(PhysicsError::InvalidParticle { index: id.raw() })
}

pub(crate) fn lookup_mut(
    particles: &mut ParticleSet,
    id: ParticleId,
) -> Result<&mut Particle, PhysicsError> {
    particles
        .get_mut(id)
        .ok_or(PhysicsError::InvalidParticle { index: id.raw() })
}

/// Worst-first contact resolver for particles.
///
/// Each iteration re-scans for the contact with the most negative
/// separating velocity (or leftover penetration) and resolves it, so one
/// resolution can be revisited if it worsened a neighbour.
#[derive(Debug, Clone, Copy)]
pub struct ParticleContactResolver {
    iterations: u32,
}

impl ParticleContactResolver {
    /// A resolver with a fixed iteration budget.
    #[must_use]
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// The iteration budget.
    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Work the contact list, returning the iterations spent.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidParticle`] for a stale participant.
    pub fn resolve_contacts(
        &self,
        particles: &mut ParticleSet,
        contacts: &mut [ParticleContact],
        dt: f64,
    ) -> Result<u32, PhysicsError> {
        let mut used = 0;
        while used < self.iterations {
            let mut worst = f64::MAX;
            let mut selected = None;
            for (index, contact) in contacts.iter().enumerate() {
                let separating = contact.separating_velocity(particles)?;
                if separating < worst && (separating < 0.0 || contact.penetration > 0.0) {
                    worst = separating;
                    selected = Some(index);
                }
            }
            let Some(index) = selected else {
                break;
            };
            contacts[index].resolve(particles, dt)?;
            used += 1;
        }
        Ok(used)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::particle::{Particle, ParticleDesc};
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn set_with(descs: Vec<ParticleDesc>) -> (ParticleSet, Vec<ParticleId>) {
        let mut set = ParticleSet::new();
        let ids = descs
            .into_iter()
            .map(|desc| set.insert(Particle::new(desc)))
            .collect();
        (set, ids)
    }

    #[test]
    fn equal_masses_swap_velocities_at_full_restitution() {
        let (mut particles, ids) = set_with(vec![
            ParticleDesc::new(1.0).with_velocity(Vector3::new(2.0, 0.0, 0.0)),
            ParticleDesc::new(1.0).with_position(Point3::new(1.0, 0.0, 0.0)),
        ]);
        let mut contact = ParticleContact {
            first: ids[0],
            second: Some(ids[1]),
            normal: Vector3::new(-1.0, 0.0, 0.0),
            restitution: 1.0,
            penetration: 0.0,
        };

        contact.resolve(&mut particles, 0.02).unwrap();
        assert_relative_eq!(particles.get(ids[0]).unwrap().velocity(), Vector3::zeros());
        assert_relative_eq!(
            particles.get(ids[1]).unwrap().velocity(),
            Vector3::new(2.0, 0.0, 0.0)
        );
    }

    #[test]
    fn resting_contact_cancels_acceleration_built_bounce() {
        let (mut particles, ids) = set_with(vec![
            ParticleDesc::new(1.0).with_velocity(Vector3::new(0.0, -1.0, 0.0)),
        ]);
        particles
            .get_mut(ids[0])
            .unwrap()
            .set_acceleration(Vector3::new(0.0, -10.0, 0.0));
        let mut contact = ParticleContact {
            first: ids[0],
            second: None,
            normal: Vector3::new(0.0, 1.0, 0.0),
            restitution: 1.0,
            penetration: 0.0,
        };

        // Acceleration built the whole closing velocity; instead of a full
        // bounce the particle is brought to rest.
        contact.resolve(&mut particles, 0.1).unwrap();
        assert_relative_eq!(particles.get(ids[0]).unwrap().velocity().y, 0.0);
    }

    #[test]
    fn interpenetration_moves_particles_by_inverse_mass() {
        let (mut particles, ids) = set_with(vec![
            ParticleDesc::new(1.0),
            ParticleDesc::new(2.0).with_position(Point3::new(1.5, 0.0, 0.0)),
        ]);
        let mut contact = ParticleContact {
            first: ids[0],
            second: Some(ids[1]),
            normal: Vector3::new(-1.0, 0.0, 0.0),
            restitution: 0.0,
            penetration: 0.5,
        };

        contact.resolve(&mut particles, 0.02).unwrap();
        // The light particle takes two thirds of the correction.
        assert_relative_eq!(
            particles.get(ids[0]).unwrap().position().x,
            -1.0 / 3.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            particles.get(ids[1]).unwrap().position().x,
            1.5 + 1.0 / 6.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(contact.penetration, 0.0);
    }

    #[test]
    fn scenery_contacts_move_only_the_particle() {
        let (mut particles, ids) = set_with(vec![ParticleDesc::new(1.0)]);
        let mut contact = ParticleContact {
            first: ids[0],
            second: None,
            normal: Vector3::new(0.0, 1.0, 0.0),
            restitution: 0.0,
            penetration: 0.2,
        };

        contact.resolve(&mut particles, 0.02).unwrap();
        assert_relative_eq!(particles.get(ids[0]).unwrap().position().y, 0.2);
    }

    #[test]
    fn resolver_takes_the_fastest_closing_contact_first() {
        let (mut particles, ids) = set_with(vec![
            ParticleDesc::new(1.0).with_velocity(Vector3::new(1.0, 0.0, 0.0)),
            ParticleDesc::new(1.0).with_position(Point3::new(1.0, 0.0, 0.0)),
            ParticleDesc::new(1.0)
                .with_position(Point3::new(0.0, 5.0, 0.0))
                .with_velocity(Vector3::new(3.0, 0.0, 0.0)),
            ParticleDesc::new(1.0).with_position(Point3::new(1.0, 5.0, 0.0)),
        ]);
        let mut contacts = vec![
            ParticleContact {
                first: ids[0],
                second: Some(ids[1]),
                normal: Vector3::new(-1.0, 0.0, 0.0),
                restitution: 1.0,
                penetration: 0.0,
            },
            ParticleContact {
                first: ids[2],
                second: Some(ids[3]),
                normal: Vector3::new(-1.0, 0.0, 0.0),
                restitution: 1.0,
                penetration: 0.0,
            },
        ];

        let resolver = ParticleContactResolver::new(1);
        let used = resolver
            .resolve_contacts(&mut particles, &mut contacts, 0.02)
            .unwrap();

        assert_eq!(used, 1);
        // Only the faster pair got the single iteration.
        assert_relative_eq!(
            particles.get(ids[0]).unwrap().velocity().x,
            1.0
        );
        assert_relative_eq!(particles.get(ids[2]).unwrap().velocity().x, 0.0);
    }

    #[test]
    fn resolver_stops_when_nothing_is_closing_or_overlapping() {
        let (mut particles, ids) = set_with(vec![
            ParticleDesc::new(1.0).with_velocity(Vector3::new(-1.0, 0.0, 0.0)),
            ParticleDesc::new(1.0).with_position(Point3::new(1.0, 0.0, 0.0)),
        ]);
        let mut contacts = vec![ParticleContact {
            first: ids[0],
            second: Some(ids[1]),
            normal: Vector3::new(-1.0, 0.0, 0.0),
            restitution: 1.0,
            penetration: 0.0,
        }];

        // Already separating: nothing to do.
        let used = ParticleContactResolver::new(8)
            .resolve_contacts(&mut particles, &mut contacts, 0.02)
            .unwrap();
        assert_eq!(used, 0);
    }

    #[test]
    fn stale_participants_are_structural_errors() {
        let (mut particles, ids) = set_with(vec![ParticleDesc::new(1.0)]);
        particles.remove(ids[0]);
        let mut contacts = vec![ParticleContact {
            first: ids[0],
            second: None,
            normal: Vector3::new(0.0, 1.0, 0.0),
            restitution: 0.0,
            penetration: 0.1,
        }];

        let err = ParticleContactResolver::new(4)
            .resolve_contacts(&mut particles, &mut contacts, 0.02)
            .unwrap_err();
        assert!(err.is_structural());
    }
}
