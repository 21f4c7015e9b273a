//! The simulation world: owns the bodies, their collision primitives,
//! the octree, and the resolver, and advances them together.
//!
//! A [`World`] tick is three stages. [`Octree::update`] integrates every
//! body and re-homes the primitives that moved;
//! [`Octree::collect_contacts`] walks the tree and runs the narrow phase
//! on every candidate pair; the resolver then works the contact list
//! worst-first until the iteration budget runs out. The contact buffer is
//! owned by the world and reused across ticks.

use nalgebra::{Point3, Vector3};
use riposte_contact::{Contact, ContactParams, ContactResolver, ResolveStats, ResolverConfig};
use riposte_types::{inertia, Aabb, BodyDesc, BodyId, BodySet, PhysicsError, RigidBody};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::octree::Octree;
use crate::prim::{PrimId, Primitive, PrimitiveSet, Shape};
use crate::volume::Volume;

/// Construction-time settings for a [`World`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldConfig {
    /// Region the octree is sized for; bodies that leave it are pinned to
    /// the root node.
    pub play_area: Aabb,
    /// Acceleration applied to every gravity-affected body.
    pub gravity: Vector3<f64>,
    /// Edge length below which octree nodes stop subdividing.
    pub min_node_size: f64,
    /// Surface properties shared by every generated contact.
    pub contacts: ContactParams,
    /// Iteration budgets for the contact resolver.
    pub resolver: ResolverConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            play_area: Aabb::from_center(Point3::origin(), Vector3::new(64.0, 64.0, 64.0)),
            gravity: Vector3::new(0.0, -9.81, 0.0),
            min_node_size: 1.0,
            contacts: ContactParams::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Check the configuration without building a world.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::DegenerateRegion`] for an empty play area,
    /// [`PhysicsError::InvalidConfig`] for anything else out of range.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if self.play_area.is_degenerate() {
            let size = self.play_area.size();
            return Err(PhysicsError::DegenerateRegion {
                size: [size.x, size.y, size.z],
            });
        }
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(PhysicsError::invalid_config("gravity must be finite"));
        }
        if !self.min_node_size.is_finite() || self.min_node_size <= 0.0 {
            return Err(PhysicsError::invalid_config(format!(
                "minimum node size must be finite and positive, got {}",
                self.min_node_size
            )));
        }
        self.contacts.validate()?;
        self.resolver.validate()
    }
}

/// What one [`World::step`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Contacts generated by the narrow phase this tick.
    pub contacts: usize,
    /// Iterations the resolver actually spent.
    pub resolve: ResolveStats,
}

/// A rigid-body simulation: bodies, collision geometry, and the machinery
/// to advance them.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    bodies: BodySet,
    prims: PrimitiveSet,
    tree: Octree,
    resolver: ContactResolver,
    contacts: Vec<Contact>,
}

impl World {
    /// Build a world from a validated configuration.
    ///
    /// # Errors
    ///
    /// Anything [`WorldConfig::validate`] rejects.
    pub fn new(config: WorldConfig) -> Result<Self, PhysicsError> {
        config.validate()?;
        let tree = Octree::new(config.play_area, config.min_node_size)?;
        let resolver = ContactResolver::new(config.resolver)?;
        Ok(Self {
            config,
            bodies: BodySet::new(),
            prims: PrimitiveSet::new(),
            tree,
            resolver,
            contacts: Vec::new(),
        })
    }

    /// The configuration the world was built with.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Read access to the octree, for diagnostics.
    #[must_use]
    pub fn octree(&self) -> &Octree {
        &self.tree
    }

    /// Number of live bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Look up a body.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(id)
    }

    /// Mutable access to a body, for applying forces or adjusting state
    /// between ticks.
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id)
    }

    /// The collision primitive carrying a body, if the body is live.
    #[must_use]
    pub fn primitive_of(&self, body: BodyId) -> Option<PrimId> {
        self.prims
            .iter()
            .find_map(|(id, prim)| (prim.body == Some(body)).then_some(id))
    }

    /// Apply a force at a world-space point, waking the body.
    ///
    /// Off-center points accumulate torque as well.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidBody`] for a stale id.
    pub fn apply_force_at(
        &mut self,
        id: BodyId,
        force: Vector3<f64>,
        point: Point3<f64>,
    ) -> Result<(), PhysicsError> {
        let body = self
            .bodies
            .get_mut(id)
            .ok_or(PhysicsError::InvalidBody { id })?;
        body.add_force_at_point(force, point);
        Ok(())
    }

    /// Add a solid sphere. Finite-mass spheres get a solid-sphere inertia
    /// tensor and, unless the description opts out, world gravity.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidConfig`] for a non-positive or non-finite
    /// radius.
    pub fn add_sphere(&mut self, radius: f64, desc: BodyDesc) -> Result<BodyId, PhysicsError> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(PhysicsError::invalid_config(format!(
                "sphere radius must be finite and positive, got {radius}"
            )));
        }
        let volume = Volume::Sphere { radius };
        let tensor = inertia::solid_sphere(desc.mass, radius);
        self.add_volume(volume, tensor, desc)
    }

    /// Add a solid axis-aligned cube. Finite-mass cubes get a solid-cuboid
    /// inertia tensor and, unless the description opts out, world gravity.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidConfig`] if any half-extent is non-positive
    /// or non-finite.
    pub fn add_cube(
        &mut self,
        half_extents: Vector3<f64>,
        desc: BodyDesc,
    ) -> Result<BodyId, PhysicsError> {
        if !half_extents.iter().all(|h| h.is_finite() && *h > 0.0) {
            return Err(PhysicsError::invalid_config(format!(
                "cube half-extents must be finite and positive, got {half_extents:?}"
            )));
        }
        let volume = Volume::Cube { half_extents };
        let tensor = inertia::solid_cuboid(desc.mass, half_extents);
        self.add_volume(volume, tensor, desc)
    }

    fn add_volume(
        &mut self,
        volume: Volume,
        tensor: nalgebra::Matrix3<f64>,
        desc: BodyDesc,
    ) -> Result<BodyId, PhysicsError> {
        let affected = desc.affected_by_gravity;
        let mut body = RigidBody::new(desc);
        if body.has_finite_mass() {
            body.set_inertia_tensor(tensor)?;
            if affected {
                body.set_acceleration(self.config.gravity);
            }
        }
        let id = self.bodies.insert(body);
        let prim = self
            .prims
            .insert(Primitive::with_body(id, Shape::Volume(volume)));
        self.tree.enqueue(prim);
        Ok(id)
    }

    /// Add a fixed half-space boundary. Points `p` with
    /// `normal . p < offset` are inside the solid.
    ///
    /// The normal is normalized on the way in.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidConfig`] for a zero or non-finite normal, or
    /// a non-finite offset.
    pub fn add_plane(
        &mut self,
        normal: Vector3<f64>,
        offset: f64,
    ) -> Result<PrimId, PhysicsError> {
        if !offset.is_finite() || !normal.iter().all(|c| c.is_finite()) {
            return Err(PhysicsError::invalid_config(
                "plane normal and offset must be finite",
            ));
        }
        let length = normal.norm();
        if length <= f64::EPSILON {
            return Err(PhysicsError::invalid_config("plane normal must be non-zero"));
        }
        let prim = self.prims.insert(Primitive::fixed(Shape::Plane {
            normal: normal / length,
            offset,
        }));
        self.tree.enqueue(prim);
        Ok(prim)
    }

    /// Remove a body along with its collision primitive.
    ///
    /// Returns `false` if the id was stale.
    pub fn remove_body(&mut self, id: BodyId) -> bool {
        if let Some(prim) = self.primitive_of(id) {
            self.tree.remove(prim);
            self.prims.remove(prim);
        }
        self.bodies.remove(id).is_some()
    }

    /// Remove a fixed plane. Refuses ids that belong to bodied primitives.
    pub fn remove_plane(&mut self, id: PrimId) -> bool {
        match self.prims.get(id) {
            Some(prim) if matches!(prim.shape, Shape::Plane { .. }) => {
                self.tree.remove(id);
                self.prims.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidConfig`] for a non-positive or non-finite
    /// timestep; otherwise whatever the octree update, narrow phase, or
    /// resolver surfaces.
    pub fn step(&mut self, dt: f64) -> Result<StepReport, PhysicsError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(PhysicsError::invalid_config(format!(
                "timestep must be finite and positive, got {dt}"
            )));
        }

        self.tree.update(&mut self.prims, &mut self.bodies, dt)?;

        self.contacts.clear();
        let contacts = self.tree.collect_contacts(
            &self.prims,
            &self.bodies,
            self.config.contacts,
            &mut self.contacts,
        )?;
        let resolve = self
            .resolver
            .resolve(&mut self.bodies, &mut self.contacts, dt)?;

        Ok(StepReport { contacts, resolve })
    }
}
