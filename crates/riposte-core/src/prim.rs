//! Collision primitives: what the broad phase indexes and the narrow
//! phase tests.
//!
//! A primitive pairs a [`Shape`] with an optional backing body. Bodied
//! primitives follow their body's position; bodyless ones (fixed planes)
//! never move and are kept at the octree root so everything is tested
//! against them.

use std::fmt;

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use riposte_types::{Aabb, BodyId, BodySet};

use crate::volume::Volume;

/// Identifier of a primitive within a [`PrimitiveSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrimId(u32);

impl PrimId {
    /// Create a primitive id from a raw slot index.
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

impl From<u32> for PrimId {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

impl fmt::Display for PrimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The geometry a primitive carries.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    /// A solid volume centered on the backing body.
    Volume(Volume),
    /// A fixed half-space: all points `p` with `normal · p < offset` are
    /// inside it. The normal is unit length.
    Plane {
        /// Unit normal pointing out of the half-space.
        normal: Vector3<f64>,
        /// Distance of the plane from the origin along the normal.
        offset: f64,
    },
}

/// A collision primitive.
#[derive(Debug, Clone)]
pub struct Primitive {
    /// Backing body; `None` for fixed geometry.
    pub body: Option<BodyId>,
    /// The geometry.
    pub shape: Shape,
    stationary: bool,
}

impl Primitive {
    /// A primitive that follows a body.
    #[must_use]
    pub fn with_body(body: BodyId, shape: Shape) -> Self {
        Self {
            body: Some(body),
            shape,
            stationary: false,
        }
    }

    /// A fixed primitive with no backing body.
    #[must_use]
    pub fn fixed(shape: Shape) -> Self {
        Self {
            body: None,
            shape,
            stationary: true,
        }
    }

    /// True if the primitive did not move during the last tick. Pairs in
    /// which both primitives are stationary are skipped by the narrow
    /// phase.
    #[must_use]
    pub fn is_stationary(&self) -> bool {
        self.stationary
    }

    pub(crate) fn set_stationary(&mut self, stationary: bool) {
        self.stationary = stationary;
    }

    /// World-space bounds, if the primitive has finite extent and a live
    /// body to position it. Planes and orphaned primitives return `None`
    /// and stay at the octree root.
    #[must_use]
    pub fn aabb(&self, bodies: &BodySet) -> Option<Aabb> {
        match (&self.shape, self.body) {
            (Shape::Volume(volume), Some(id)) => {
                let body = bodies.get(id)?;
                Some(volume.aabb(&body.position()))
            }
            _ => None,
        }
    }
}

/// Id-addressed storage for primitives, mirroring
/// [`BodySet`](riposte_types::BodySet): slots are tombstoned on removal
/// and ids are never reused.
#[derive(Debug, Default)]
pub struct PrimitiveSet {
    slots: Vec<Option<Primitive>>,
    live: usize,
}

impl PrimitiveSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live primitives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// True if no live primitives remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Insert a primitive, returning its id.
    pub fn insert(&mut self, prim: Primitive) -> PrimId {
        let id = PrimId::new(self.slots.len() as u32);
        self.slots.push(Some(prim));
        self.live += 1;
        id
    }

    /// Borrow a primitive.
    #[must_use]
    pub fn get(&self, id: PrimId) -> Option<&Primitive> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Mutably borrow a primitive.
    pub fn get_mut(&mut self, id: PrimId) -> Option<&mut Primitive> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Remove a primitive, tombstoning its slot.
    pub fn remove(&mut self, id: PrimId) -> Option<Primitive> {
        let slot = self.slots.get_mut(id.index())?;
        let prim = slot.take()?;
        self.live -= 1;
        Some(prim)
    }

    /// Iterate over live primitives.
    pub fn iter(&self) -> impl Iterator<Item = (PrimId, &Primitive)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|prim| (PrimId::new(i as u32), prim)))
    }
}
