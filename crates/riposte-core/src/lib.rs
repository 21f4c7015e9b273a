#![doc(html_root_url = "https://docs.rs/riposte-core/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]

//! Rigid-body simulation world with a loose-octree broad phase.
//!
//! [`World`] owns the bodies, their collision primitives, and the spatial
//! index, and drives the whole pipeline from a single
//! [`step`](World::step) call:
//!
//! 1. integrate every awake body and re-home the ones that moved;
//! 2. walk the octree collecting narrow-phase contacts between primitives
//!    that share a region or an ancestor of one;
//! 3. hand the batch to the sequential-impulse resolver.
//!
//! Primitives are spheres, axis-aligned cubes, and fixed half-space
//! planes; the octree is *loose* in the sense that an item straddling a
//! child boundary stays at the parent rather than being split, so nothing
//! is ever stored twice.
//!
//! ```no_run
//! use riposte_core::{World, WorldConfig};
//! use riposte_types::BodyDesc;
//! use nalgebra::{Point3, Vector3};
//!
//! # fn main() -> Result<(), riposte_types::PhysicsError> {
//! let mut world = World::new(WorldConfig::default())?;
//! world.add_plane(Vector3::new(0.0, 1.0, 0.0), 0.0)?;
//! world.add_sphere(
//!     1.0,
//!     BodyDesc::new(5.0).with_position(Point3::new(0.0, 10.0, 0.0)),
//! )?;
//! for _ in 0..120 {
//!     world.step(1.0 / 60.0)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod narrow;
pub mod octree;
pub mod prim;
pub mod volume;
pub mod world;

pub use octree::Octree;
pub use prim::{PrimId, Primitive, PrimitiveSet, Shape};
pub use volume::Volume;
pub use world::{StepReport, World, WorldConfig};
