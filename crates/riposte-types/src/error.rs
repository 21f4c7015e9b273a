//! Error types for simulation setup and stepping.

use crate::body::BodyId;

/// Errors that can occur while configuring or stepping a simulation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PhysicsError {
    /// A configuration value failed validation.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Why validation rejected the value.
        reason: String,
    },

    /// A spatial region with zero or negative extent was supplied.
    #[error("degenerate region: extents {size:?} must be positive on every axis")]
    DegenerateRegion {
        /// Extent of the rejected region on each axis.
        size: [f64; 3],
    },

    /// An item is too large for the spatial index's root region.
    ///
    /// Recoverable: the caller can rebuild the world with a larger play
    /// area, or reject the offending body.
    #[error("item needs a root region of edge {required}, play area edge is {available}")]
    PlayAreaExceeded {
        /// Edge length the item would need the root region to have.
        required: f64,
        /// Edge length the root region actually has.
        available: f64,
    },

    /// An operation referenced a rigid body that is not (or is no longer)
    /// registered.
    #[error("unknown body id {id}")]
    InvalidBody {
        /// The stale or foreign id.
        id: BodyId,
    },

    /// An operation referenced a primitive that is not (or is no longer)
    /// registered.
    #[error("unknown primitive id {index}")]
    InvalidPrimitive {
        /// Raw slot index of the stale or foreign id.
        index: u32,
    },

    /// An operation referenced a particle that is not (or is no longer)
    /// registered.
    #[error("unknown particle id {index}")]
    InvalidParticle {
        /// Raw slot index of the stale or foreign id.
        index: u32,
    },

    /// An inertia tensor was singular and could not be inverted.
    #[error("inertia tensor is singular and cannot be inverted")]
    DegenerateInertia,
}

impl PhysicsError {
    /// Build an [`PhysicsError::InvalidConfig`] from anything string-like.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// True if this error was raised by configuration validation.
    #[must_use]
    pub fn is_invalid_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::DegenerateRegion { .. }
        )
    }

    /// True for the recoverable "item does not fit the play area" case.
    #[must_use]
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::PlayAreaExceeded { .. })
    }

    /// True if a structural invariant was violated (stale ids); the
    /// current step cannot continue.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidBody { .. }
                | Self::InvalidPrimitive { .. }
                | Self::InvalidParticle { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn display_messages() {
        let err = PhysicsError::invalid_config("gravity must be finite");
        assert_eq!(
            err.to_string(),
            "invalid configuration: gravity must be finite"
        );

        let err = PhysicsError::PlayAreaExceeded {
            required: 64.0,
            available: 16.0,
        };
        assert_eq!(
            err.to_string(),
            "item needs a root region of edge 64, play area edge is 16"
        );

        let err = PhysicsError::InvalidBody {
            id: BodyId::new(7),
        };
        assert_eq!(err.to_string(), "unknown body id 7");
    }

    #[test]
    fn predicates_partition_the_taxonomy() {
        assert!(PhysicsError::invalid_config("x").is_invalid_config());
        assert!(PhysicsError::DegenerateRegion { size: [0.0; 3] }.is_invalid_config());
        assert!(PhysicsError::PlayAreaExceeded {
            required: 2.0,
            available: 1.0
        }
        .is_capacity());
        assert!(PhysicsError::InvalidBody { id: BodyId::new(0) }.is_structural());
        assert!(PhysicsError::InvalidPrimitive { index: 3 }.is_structural());
        assert!(PhysicsError::InvalidParticle { index: 3 }.is_structural());
        assert!(!PhysicsError::DegenerateInertia.is_structural());
    }
}
