//! Closed-form two-link planar leg solver.
//!
//! Works in the leg's sagittal plane: `y` forward, `z` up, hip at the origin.
//! The hip angle is measured so that zero points the upper link straight
//! down. All `acos` arguments are clamped, so targets out of reach yield the
//! fully extended (or fully folded) pose instead of NaN.

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use quadruped_core::config::require_positive;
use quadruped_core::{ConfigError, Validate};

/// Hip pitch and knee angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlanarAngles {
    /// Hip pitch.
    pub hip: f64,
    /// Knee.
    pub knee: f64,
}

impl PlanarAngles {
    /// Both angles negated, for mirrored legs.
    #[must_use]
    pub fn negated(self) -> Self {
        Self {
            hip: -self.hip,
            knee: -self.knee,
        }
    }
}

/// Two-link leg with upper and lower link lengths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanarLeg {
    /// Hip to knee.
    pub upper: f64,
    /// Knee to foot.
    pub lower: f64,
}

impl Default for PlanarLeg {
    fn default() -> Self {
        Self {
            upper: 3.5,
            lower: 3.75,
        }
    }
}

impl Validate for PlanarLeg {
    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("control.planar.upper", self.upper)?;
        require_positive("control.planar.lower", self.lower)
    }
}

impl PlanarLeg {
    /// Leg with the given link lengths.
    #[must_use]
    pub const fn new(upper: f64, lower: f64) -> Self {
        Self { upper, lower }
    }

    /// Longest reach (straight leg).
    #[must_use]
    pub fn max_reach(&self) -> f64 {
        self.upper + self.lower
    }

    /// Angles placing the foot at `(y, z)`.
    #[must_use]
    pub fn solve(&self, y: f64, z: f64) -> PlanarAngles {
        let (l1, l2) = (self.upper, self.lower);
        let d2 = y.mul_add(y, z * z);
        let d = d2.sqrt();

        let knee = clamp_unit((d2 - l1 * l1 - l2 * l2) / (2.0 * l1 * l2)).acos();
        // At the hip itself the triangle is degenerate; the interior angle is
        // taken as zero.
        let interior = if d > f64::EPSILON {
            clamp_unit((d2 + l1 * l1 - l2 * l2) / (2.0 * l1 * d)).acos()
        } else {
            0.0
        };
        let hip = (-z).atan2(y) - interior - FRAC_PI_2;
        PlanarAngles { hip, knee }
    }

    /// Foot position `(y, z)` for the given angles.
    #[must_use]
    pub fn forward(&self, angles: PlanarAngles) -> (f64, f64) {
        let phi = angles.hip + FRAC_PI_2;
        let (s1, c1) = phi.sin_cos();
        let (s2, c2) = (phi + angles.knee).sin_cos();
        let y = self.upper.mul_add(c1, self.lower * c2);
        let z = -self.upper.mul_add(s1, self.lower * s2);
        (y, z)
    }
}

fn clamp_unit(x: f64) -> f64 {
    x.clamp(-1.0, 1.0)
}
