#![doc(html_root_url = "https://docs.rs/riposte-contact/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]

//! Contact model and sequential-impulse resolver.
//!
//! Narrow-phase collision detection produces [`Contact`]s: a world-space
//! point, a unit normal pointing away from the first body, and a
//! penetration depth. The [`ContactResolver`] then runs two worst-first
//! passes over the batch, one correcting interpenetration by moving and
//! rotating bodies, one applying impulses until closing velocities meet
//! their restitution targets. Each applied correction is propagated into
//! the cached state of every other contact that shares a body, so a chain
//! of touching bodies converges without re-running collision detection.
//!
//! Material response is governed by [`ContactParams`] (restitution and
//! friction) and the solver loop by [`ResolverConfig`] (iteration caps and
//! the penetration epsilon below which positions are left alone).

pub mod contact;
pub mod params;
pub mod resolver;

pub use contact::{Contact, PairChange};
pub use params::{ContactParams, ResolverConfig};
pub use resolver::{ContactResolver, ResolveStats};
