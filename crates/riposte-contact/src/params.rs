//! Tuning knobs for contact response and the resolver loop.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use riposte_types::PhysicsError;

/// Material response shared by a batch of contacts.
///
/// ```
/// use riposte_contact::ContactParams;
///
/// let params = ContactParams::default();
/// assert!(params.validate().is_ok());
/// assert!(ContactParams { restitution: 1.5, ..params }.validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactParams {
    /// Coulomb friction coefficient; `0` disables the tangential solve.
    pub friction: f64,
    /// Fraction of the closing velocity restored by the bounce, in `[0, 1]`.
    pub restitution: f64,
    /// Cap on the angular share of a positional correction, as a fraction
    /// of the contact's lever arm. Keeps deep contacts from spinning
    /// bodies through their neighbours.
    pub angular_limit: f64,
    /// Closing speed below which restitution is suppressed, letting
    /// resting contacts settle instead of micro-bouncing.
    pub velocity_limit: f64,
}

impl Default for ContactParams {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.2,
            angular_limit: 0.2,
            velocity_limit: 0.25,
        }
    }
}

impl ContactParams {
    /// Lively response: most of the impact speed is returned.
    #[must_use]
    pub fn bouncy() -> Self {
        Self {
            friction: 0.3,
            restitution: 0.8,
            ..Self::default()
        }
    }

    /// Dead response: no bounce, heavy surface grip.
    #[must_use]
    pub fn rigid() -> Self {
        Self {
            friction: 0.9,
            restitution: 0.0,
            ..Self::default()
        }
    }

    /// Check the parameters for physical plausibility.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !self.friction.is_finite() || self.friction < 0.0 {
            return Err(PhysicsError::invalid_config(format!(
                "friction must be finite and non-negative, got {}",
                self.friction
            )));
        }
        if !self.restitution.is_finite() || !(0.0..=1.0).contains(&self.restitution) {
            return Err(PhysicsError::invalid_config(format!(
                "restitution must lie in [0, 1], got {}",
                self.restitution
            )));
        }
        if !self.angular_limit.is_finite() || self.angular_limit <= 0.0 {
            return Err(PhysicsError::invalid_config(format!(
                "angular_limit must be finite and positive, got {}",
                self.angular_limit
            )));
        }
        if !self.velocity_limit.is_finite() || self.velocity_limit <= 0.0 {
            return Err(PhysicsError::invalid_config(format!(
                "velocity_limit must be finite and positive, got {}",
                self.velocity_limit
            )));
        }
        Ok(())
    }
}

/// Iteration caps and thresholds for [`ContactResolver`].
///
/// [`ContactResolver`]: crate::ContactResolver
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResolverConfig {
    /// Maximum interpenetration corrections per batch.
    pub position_iterations: u32,
    /// Maximum velocity corrections per batch.
    pub velocity_iterations: u32,
    /// Penetration depth considered resolved; the position loop stops
    /// early once the worst remaining contact is at or below it.
    pub penetration_epsilon: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            position_iterations: 4,
            velocity_iterations: 4,
            penetration_epsilon: 0.01,
        }
    }
}

impl ResolverConfig {
    /// Budget tuned for a fixed 60 Hz tick.
    #[must_use]
    pub fn realtime() -> Self {
        Self::default()
    }

    /// Larger budget and tighter slop for offline or small-scene runs.
    #[must_use]
    pub fn high_fidelity() -> Self {
        Self {
            position_iterations: 16,
            velocity_iterations: 16,
            penetration_epsilon: 0.001,
        }
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if self.position_iterations == 0 {
            return Err(PhysicsError::invalid_config(
                "position_iterations must be at least 1",
            ));
        }
        if self.velocity_iterations == 0 {
            return Err(PhysicsError::invalid_config(
                "velocity_iterations must be at least 1",
            ));
        }
        if !self.penetration_epsilon.is_finite() || self.penetration_epsilon < 0.0 {
            return Err(PhysicsError::invalid_config(format!(
                "penetration_epsilon must be finite and non-negative, got {}",
                self.penetration_epsilon
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ContactParams::default().validate().is_ok());
        assert!(ResolverConfig::default().validate().is_ok());
        assert!(ContactParams::bouncy().validate().is_ok());
        assert!(ContactParams::rigid().validate().is_ok());
        assert!(ResolverConfig::high_fidelity().validate().is_ok());
    }

    #[test]
    fn out_of_range_params_are_rejected() {
        let bad_friction = ContactParams {
            friction: -0.1,
            ..ContactParams::default()
        };
        assert!(bad_friction.validate().unwrap_err().is_invalid_config());

        let bad_restitution = ContactParams {
            restitution: f64::NAN,
            ..ContactParams::default()
        };
        assert!(bad_restitution.validate().is_err());

        let bad_limit = ContactParams {
            velocity_limit: 0.0,
            ..ContactParams::default()
        };
        assert!(bad_limit.validate().is_err());
    }

    #[test]
    fn zero_iteration_budgets_are_rejected() {
        let config = ResolverConfig {
            position_iterations: 0,
            ..ResolverConfig::default()
        };
        assert!(config.validate().unwrap_err().is_invalid_config());
    }
}
