#![doc(html_root_url = "https://docs.rs/riposte-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]

//! Foundation types for the riposte physics engine.
//!
//! This crate holds the vocabulary shared by every layer above it:
//!
//! - [`RigidBody`] and the id-addressed [`BodySet`] arena it lives in
//! - [`Aabb`] regions with three-way [`Containment`] classification
//! - inertia tensor constructors for the built-in shapes
//! - the [`PhysicsError`] taxonomy
//!
//! # Layering
//!
//! ```text
//! riposte-core ───► riposte-contact ───► riposte-types
//!       │                                      ▲
//!       └──────────────────────────────────────┘
//! ```
//!
//! Bodies are addressed by [`BodyId`] rather than borrowed, so the spatial
//! index and the contact resolver can both refer to the same body without
//! aliasing; the arena detects stale ids instead of silently re-pointing
//! them at newer bodies.

pub mod body;
pub mod bounds;
pub mod error;
pub mod inertia;

pub use body::{BodyDesc, BodyId, BodySet, RigidBody};
pub use bounds::{Aabb, Containment};
pub use error::PhysicsError;
