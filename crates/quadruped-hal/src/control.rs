//! Position/velocity controller for the spine motors.
//!
//! One [`PidController`] per spine motor turns the encoder-count error
//! toward the operator's setpoint, plus a velocity feed-forward, into a
//! normalized PWM effort for the module report.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PidGains
// ---------------------------------------------------------------------------

/// Gains for [`PidController`].
///
/// - `kp`: proportional gain on the position error (encoder counts).
/// - `ki`: integral gain; the integral is clamped to `[-1, 1]`.
/// - `kv`: overall gain applied to the velocity feed-forward plus the
///   position correction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kv: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 2e-4,
            ki: 1e-2,
            kv: 1.95,
        }
    }
}

// ---------------------------------------------------------------------------
// PidController
// ---------------------------------------------------------------------------

/// Velocity-feed-forward PI controller producing a normalized effort.
///
/// ```text
/// e        = setpoint − measured
/// integral = clamp(integral + ki·e, −1, 1)
/// effort   = kv·(velocity + kp·(e + integral))
/// ```
///
/// The integral accumulates per call, not per second: one call per control
/// tick.
#[derive(Clone, Debug, PartialEq)]
pub struct PidController {
    gains: PidGains,
    integral_limit: f64,
    integral: f64,
}

impl PidController {
    /// Create a controller with the given gains.
    pub const fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral_limit: 1.0,
            integral: 0.0,
        }
    }

    /// Set the integral windup limit.
    pub const fn with_integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = limit;
        self
    }

    /// Compute the effort for one tick.
    pub fn compute(&mut self, setpoint: f64, measured: f64, velocity: f64) -> f64 {
        let error = setpoint - measured;
        self.integral = self
            .gains
            .ki
            .mul_add(error, self.integral)
            .clamp(-self.integral_limit, self.integral_limit);
        self.gains.kv * self.gains.kp.mul_add(error + self.integral, velocity)
    }

    /// Accumulated integral term.
    pub const fn integral(&self) -> f64 {
        self.integral
    }

    /// Clear the integral.
    pub const fn reset(&mut self) {
        self.integral = 0.0;
    }
}

impl Default for PidController {
    fn default() -> Self {
        Self::new(PidGains::default())
    }
}
