//! Worst-first sequential resolution of a contact batch.

use riposte_types::{BodyId, BodySet, PhysicsError};

use crate::contact::Contact;
use crate::params::ResolverConfig;

/// Iterations actually spent resolving one batch.
///
/// A count at the configured cap means the loop ran out of budget with
/// work left; well below it means the batch converged early.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Positional corrections applied.
    pub position_iterations: u32,
    /// Velocity corrections applied.
    pub velocity_iterations: u32,
}

/// Resolves contact batches by repeatedly fixing the worst offender.
///
/// Each pass scans the whole batch, picks the contact with the largest
/// remaining error (deepest penetration, then largest desired velocity
/// change), applies its correction, and folds the resulting per-body
/// deltas into every other contact that shares a body. Earlier contacts
/// win ties, so resolution order is deterministic for a given batch order.
#[derive(Debug, Clone)]
pub struct ContactResolver {
    config: ResolverConfig,
}

impl Default for ContactResolver {
    fn default() -> Self {
        Self {
            config: ResolverConfig::default(),
        }
    }
}

impl ContactResolver {
    /// Build a resolver with a validated configuration.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidConfig`] if the configuration is rejected by
    /// [`ResolverConfig::validate`].
    pub fn new(config: ResolverConfig) -> Result<Self, PhysicsError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in force.
    #[must_use]
    pub fn config(&self) -> ResolverConfig {
        self.config
    }

    /// Resolve a batch of contacts against the bodies they reference.
    ///
    /// Runs three phases: derive each contact's internal state, correct
    /// interpenetration worst-first, then apply impulses worst-first until
    /// every desired velocity change is met or the iteration budget runs
    /// out.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidBody`] if a contact references a removed
    /// body, [`PhysicsError::InvalidConfig`] for a non-positive or
    /// non-finite timestep.
    pub fn resolve(
        &self,
        bodies: &mut BodySet,
        contacts: &mut [Contact],
        dt: f64,
    ) -> Result<ResolveStats, PhysicsError> {
        if contacts.is_empty() {
            return Ok(ResolveStats::default());
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(PhysicsError::invalid_config(format!(
                "timestep must be finite and positive, got {dt}"
            )));
        }

        for contact in contacts.iter_mut() {
            contact.calculate_internals(bodies, dt)?;
        }

        let position_iterations = self.adjust_positions(bodies, contacts)?;
        let velocity_iterations = self.adjust_velocities(bodies, contacts, dt)?;

        Ok(ResolveStats {
            position_iterations,
            velocity_iterations,
        })
    }

    /// Worst-first interpenetration pass.
    fn adjust_positions(
        &self,
        bodies: &mut BodySet,
        contacts: &mut [Contact],
    ) -> Result<u32, PhysicsError> {
        let mut iterations = 0;
        while iterations < self.config.position_iterations {
            let mut worst = self.config.penetration_epsilon;
            let mut selected = None;
            for (index, contact) in contacts.iter().enumerate() {
                if contact.penetration > worst {
                    worst = contact.penetration;
                    selected = Some(index);
                }
            }
            let Some(index) = selected else {
                break;
            };

            contacts[index].match_awake_state(bodies);
            let change = contacts[index].apply_position_change(bodies, worst)?;
            let members = slot_members(&contacts[index]);

            // Fold the applied move into every contact sharing a body,
            // the selected contact included: its own penetration drops to
            // roughly zero here.
            for contact in contacts.iter_mut() {
                let slots = slot_members(contact);
                for (slot, slot_id) in slots.iter().enumerate() {
                    let Some(slot_id) = slot_id else {
                        continue;
                    };
                    for (member, member_id) in members.iter().enumerate() {
                        if *member_id == Some(*slot_id) {
                            contact.propagate_position(
                                slot,
                                &change.linear[member],
                                &change.angular[member],
                            );
                        }
                    }
                }
            }
            iterations += 1;
        }
        Ok(iterations)
    }

    /// Worst-first velocity pass.
    fn adjust_velocities(
        &self,
        bodies: &mut BodySet,
        contacts: &mut [Contact],
        dt: f64,
    ) -> Result<u32, PhysicsError> {
        let mut iterations = 0;
        while iterations < self.config.velocity_iterations {
            let mut worst = f64::EPSILON;
            let mut selected = None;
            for (index, contact) in contacts.iter().enumerate() {
                if contact.desired_delta_velocity() > worst {
                    worst = contact.desired_delta_velocity();
                    selected = Some(index);
                }
            }
            let Some(index) = selected else {
                break;
            };

            contacts[index].match_awake_state(bodies);
            let change = contacts[index].apply_velocity_change(bodies)?;
            let members = slot_members(&contacts[index]);

            for contact in contacts.iter_mut() {
                let slots = slot_members(contact);
                let mut touched = false;
                for (slot, slot_id) in slots.iter().enumerate() {
                    let Some(slot_id) = slot_id else {
                        continue;
                    };
                    for (member, member_id) in members.iter().enumerate() {
                        if *member_id == Some(*slot_id) {
                            contact.propagate_velocity(
                                slot,
                                &change.linear[member],
                                &change.angular[member],
                            );
                            touched = true;
                        }
                    }
                }
                if touched {
                    contact.calculate_desired_delta_velocity(bodies, dt)?;
                }
            }
            iterations += 1;
        }
        Ok(iterations)
    }
}

fn slot_members(contact: &Contact) -> [Option<BodyId>; 2] {
    [Some(contact.first), contact.second]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::{Point3, Vector3};
    use riposte_types::{inertia, BodyDesc, RigidBody};

    use crate::params::ContactParams;

    fn sphere_body(desc: BodyDesc) -> RigidBody {
        let mass = desc.mass;
        let mut body = RigidBody::new(desc);
        body.set_inertia_tensor(inertia::solid_sphere(mass, 1.0))
            .unwrap();
        body
    }

    /// Floor contact directly beneath a body centered at `x`; the lever
    /// arm stays parallel to the normal, so corrections are translations.
    fn floor_contact(first: BodyId, x: f64, depth: f64, params: ContactParams) -> Contact {
        Contact::new(
            first,
            None,
            Point3::new(x, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            depth,
            params,
        )
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let resolver = ContactResolver::default();
        let mut bodies = BodySet::new();
        let stats = resolver.resolve(&mut bodies, &mut [], 0.02).unwrap();
        assert_eq!(stats, ResolveStats::default());
    }

    #[test]
    fn bad_timestep_is_rejected() {
        let resolver = ContactResolver::default();
        let mut bodies = BodySet::new();
        let a = bodies.insert(sphere_body(BodyDesc::new(1.0)));
        let mut contacts = [floor_contact(a, 0.0, 0.1, ContactParams::default())];
        let err = resolver.resolve(&mut bodies, &mut contacts, 0.0).unwrap_err();
        assert!(err.is_invalid_config());
    }

    #[test]
    fn deepest_contact_is_resolved_first() {
        let resolver = ContactResolver::new(ResolverConfig {
            position_iterations: 1,
            ..ResolverConfig::default()
        })
        .unwrap();

        let mut bodies = BodySet::new();
        let shallow = bodies.insert(sphere_body(
            BodyDesc::new(1.0).with_position(Point3::new(5.0, 0.9, 0.0)),
        ));
        let deep = bodies.insert(sphere_body(
            BodyDesc::new(1.0).with_position(Point3::new(-5.0, 0.5, 0.0)),
        ));

        let params = ContactParams::default();
        let mut contacts = [
            floor_contact(shallow, 5.0, 0.1, params),
            floor_contact(deep, -5.0, 0.5, params),
        ];
        let stats = resolver.resolve(&mut bodies, &mut contacts, 0.02).unwrap();

        // One iteration only: it must have gone to the deeper contact.
        assert_eq!(stats.position_iterations, 1);
        assert_relative_eq!(bodies.get(deep).unwrap().position().y, 1.0);
        assert_relative_eq!(bodies.get(shallow).unwrap().position().y, 0.9);
    }

    #[test]
    fn resolved_penetration_stops_the_position_loop() {
        let resolver = ContactResolver::default();
        let mut bodies = BodySet::new();
        let a = bodies.insert(sphere_body(
            BodyDesc::new(1.0).with_position(Point3::new(0.0, 1.0, 0.0)),
        ));

        // Already within the slop: no position work to do.
        let mut contacts = [floor_contact(a, 0.0, 0.005, ContactParams::default())];
        let stats = resolver.resolve(&mut bodies, &mut contacts, 0.02).unwrap();
        assert_eq!(stats.position_iterations, 0);
        assert_relative_eq!(bodies.get(a).unwrap().position().y, 1.0);
    }

    #[test]
    fn shared_body_contacts_see_each_others_corrections() {
        // One sphere wedged into two opposing walls: resolving the deeper
        // contact pushes the body along +x, which deepens the opposite
        // contact. Propagation must reflect that without re-detection.
        let resolver = ContactResolver::new(ResolverConfig {
            position_iterations: 1,
            ..ResolverConfig::default()
        })
        .unwrap();

        let mut bodies = BodySet::new();
        let a = bodies.insert(sphere_body(BodyDesc::new(1.0)));

        let params = ContactParams::default();
        let left_wall = Contact::new(
            a,
            None,
            Point3::new(-1.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            0.4,
            params,
        );
        let right_wall = Contact::new(
            a,
            None,
            Point3::new(1.0, 0.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
            0.1,
            params,
        );
        let mut contacts = [left_wall, right_wall];
        resolver.resolve(&mut bodies, &mut contacts, 0.02).unwrap();

        // The left contact was resolved (0.4 deep, slot-0 sign): the body
        // moved +0.4 x, so the right contact is now 0.4 deeper.
        assert_relative_eq!(bodies.get(a).unwrap().position().x, 0.4);
        assert_relative_eq!(contacts[1].penetration, 0.5);
        assert_abs_diff_eq!(contacts[0].penetration, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn velocity_pass_settles_a_falling_sphere() {
        let resolver = ContactResolver::default();
        let mut bodies = BodySet::new();
        let a = bodies.insert(sphere_body(
            BodyDesc::new(1.0)
                .with_position(Point3::new(0.0, 1.0, 0.0))
                .with_velocity(Vector3::new(0.0, -2.0, 0.0)),
        ));

        let params = ContactParams {
            restitution: 0.0,
            ..ContactParams::default()
        };
        let mut contacts = [floor_contact(a, 0.0, 0.0, params)];
        let stats = resolver.resolve(&mut bodies, &mut contacts, 0.02).unwrap();

        assert!(stats.velocity_iterations >= 1);
        assert_abs_diff_eq!(bodies.get(a).unwrap().velocity().y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn batch_order_breaks_ties_deterministically() {
        let run = |depths: [f64; 2]| {
            let resolver = ContactResolver::new(ResolverConfig {
                position_iterations: 1,
                ..ResolverConfig::default()
            })
            .unwrap();
            let mut bodies = BodySet::new();
            let a = bodies.insert(sphere_body(
                BodyDesc::new(1.0).with_position(Point3::new(-3.0, 1.0, 0.0)),
            ));
            let b = bodies.insert(sphere_body(
                BodyDesc::new(1.0).with_position(Point3::new(3.0, 1.0, 0.0)),
            ));
            let params = ContactParams::default();
            let mut contacts = [
                floor_contact(a, -3.0, depths[0], params),
                floor_contact(b, 3.0, depths[1], params),
            ];
            resolver.resolve(&mut bodies, &mut contacts, 0.02).unwrap();
            (
                bodies.get(a).unwrap().position().y,
                bodies.get(b).unwrap().position().y,
            )
        };

        // Equal depths: the first contact in batch order wins the single
        // iteration, every run.
        for _ in 0..3 {
            let (a_y, b_y) = run([0.25, 0.25]);
            assert_relative_eq!(a_y, 1.25);
            assert_relative_eq!(b_y, 1.0);
        }
    }

    #[test]
    fn stack_propagation_reaches_the_upper_contact() {
        // Lower sphere resting on the floor, upper sphere resting on the
        // lower one, both overlapping. Fixing the floor contact moves the
        // lower body up, deepening the inter-sphere contact; the resolver
        // must see the new depth and fix that too. Convergence alternates
        // between the two contacts, so this wants the larger budget.
        let resolver = ContactResolver::new(ResolverConfig::high_fidelity()).unwrap();
        let mut bodies = BodySet::new();
        let lower = bodies.insert(sphere_body(
            BodyDesc::new(1.0).with_position(Point3::new(0.0, 0.8, 0.0)),
        ));
        let upper = bodies.insert(sphere_body(
            BodyDesc::new(1.0).with_position(Point3::new(0.0, 2.6, 0.0)),
        ));

        let params = ContactParams::default();
        let floor = floor_contact(lower, 0.0, 0.2, params);
        let between = Contact::new(
            upper,
            Some(lower),
            Point3::new(0.0, 1.7, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            0.2,
            params,
        );
        let mut contacts = [floor, between];
        resolver.resolve(&mut bodies, &mut contacts, 0.02).unwrap();

        let lower_y = bodies.get(lower).unwrap().position().y;
        let upper_y = bodies.get(upper).unwrap().position().y;
        assert_relative_eq!(lower_y, 1.0, epsilon = 1e-2);
        // The upper body ends clear of the lower one.
        assert!(upper_y - lower_y >= 2.0 - 1e-9);
    }

    #[test]
    fn iteration_budget_caps_the_work() {
        let resolver = ContactResolver::new(ResolverConfig {
            position_iterations: 2,
            velocity_iterations: 2,
            penetration_epsilon: 0.01,
        })
        .unwrap();

        let mut bodies = BodySet::new();
        let params = ContactParams::default();
        let mut contacts = Vec::new();
        for i in 0..8 {
            let id = bodies.insert(sphere_body(
                BodyDesc::new(1.0).with_position(Point3::new(i as f64 * 3.0, 0.5, 0.0)),
            ));
            contacts.push(floor_contact(id, i as f64 * 3.0, 0.5, params));
        }
        let stats = resolver.resolve(&mut bodies, &mut contacts, 0.02).unwrap();
        assert_eq!(stats.position_iterations, 2);
    }
}
