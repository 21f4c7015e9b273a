#![doc(html_root_url = "https://docs.rs/riposte-particle/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]

//! Point-mass simulation layered on the riposte type stack.
//!
//! Particles carry position, velocity, and an accumulated force but no
//! orientation, which makes them cheap enough for ropes, debris, and
//! effects that do not need the full rigid-body pipeline. The moving
//! parts mirror that pipeline at smaller scale: force generators play
//! the role of gravity and springs, link generators produce contacts,
//! and a worst-first resolver replaces the iterative contact solver.
//!
//! ```
//! use nalgebra::Point3;
//! use riposte_particle::{Cable, ParticleDesc, ParticleWorld, ParticleWorldConfig};
//!
//! let mut world = ParticleWorld::new(ParticleWorldConfig::default())?;
//! let bob = world
//!     .add_particle(ParticleDesc::new(1.0).with_position(Point3::new(0.0, -1.0, 0.0)));
//! let anchor = world.add_particle(ParticleDesc::new(0.0));
//! world.add_link(Cable::new(bob, anchor, 2.0, 0.3));
//!
//! for _ in 0..60 {
//!     world.step(1.0 / 60.0)?;
//! }
//! # Ok::<(), riposte_types::PhysicsError>(())
//! ```

pub mod contact;
pub mod force;
pub mod links;
pub mod particle;
pub mod world;

pub use contact::{ParticleContact, ParticleContactResolver};
pub use force::{
    AnchoredSpring, Bungee, NBodyGravity, ParticleForceGenerator, ParticleForceRegistry,
    Spring, UniformGravity,
};
pub use links::{Cable, ParticleContactGenerator, Rod};
pub use particle::{Particle, ParticleDesc, ParticleId, ParticleSet};
pub use world::{ParticleStepReport, ParticleWorld, ParticleWorldConfig};
