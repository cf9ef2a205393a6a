//! Periodic foot trajectories for legged locomotion.
//!
//! A trajectory maps gait phase and leg index to a normalized foot offset
//! `(u, v)`: `u` runs along the stride (about `[-0.5, 0.5]`), `v` is the lift
//! height in `[0, 1]`. Each leg spends one phase unit in swing, moving
//! forward on a quintic ease-in/ease-out with a cosine lift, and the rest of
//! its period in stance, sliding back linearly on the ground.

use std::f64::consts::TAU;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase offset of each leg in a trot; diagonal pairs share a phase.
const TROT_OFFSETS: [f64; 4] = [0.0, 1.0, 1.0, 0.0];

/// Normalized foot offset at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct TrajectoryPoint {
    /// Along-stride displacement.
    pub u: f64,
    /// Lift height.
    pub v: f64,
}

/// Supported trajectory families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trajectory {
    /// One leg swings at a time; legs are offset by their index.
    #[default]
    Walk,
    /// Diagonal pairs alternate.
    Trot,
}

impl Trajectory {
    /// Sample the trajectory at `phase` for `leg`.
    #[must_use]
    pub fn sample(self, phase: f64, leg: usize) -> TrajectoryPoint {
        match self {
            Self::Walk => walk(phase, leg),
            Self::Trot => trot(phase, leg),
        }
    }

    /// Length of one cycle in phase units.
    #[must_use]
    pub const fn period(self) -> f64 {
        match self {
            Self::Walk => 4.0,
            Self::Trot => 2.0,
        }
    }
}

impl fmt::Display for Trajectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Walk => write!(f, "walk"),
            Self::Trot => write!(f, "trot"),
        }
    }
}

/// Walk: period 4, leg `i` lags by `i` phase units.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn walk(phase: f64, leg: usize) -> TrajectoryPoint {
    let t = (phase + leg as f64).rem_euclid(4.0);
    if t < 1.0 {
        let u = ((((-80.0 * t + 280.0) * t - 336.0) * t + 140.0) * t * t * t - 1.0) * t / 3.0 - 0.5;
        TrajectoryPoint { u, v: lift(t) }
    } else {
        TrajectoryPoint {
            u: (1.0 - t) / 3.0 + 0.5,
            v: 0.0,
        }
    }
}

/// Trot: period 2, legs 0 and 3 in phase, legs 1 and 2 half a cycle later.
/// The leg index is taken modulo 4.
#[must_use]
pub fn trot(phase: f64, leg: usize) -> TrajectoryPoint {
    let t = (phase + TROT_OFFSETS[leg % 4]).rem_euclid(2.0);
    if t < 1.0 {
        let u = ((((-40.0 * t + 140.0) * t - 168.0) * t + 70.0) * t * t * t - 1.0) * t - 0.5;
        TrajectoryPoint { u, v: lift(t) }
    } else {
        TrajectoryPoint { u: 1.5 - t, v: 0.0 }
    }
}

/// Half-cosine bump, zero at both ends of the swing.
fn lift(t: f64) -> f64 {
    0.5 + 0.5 * (TAU * (t - 0.5)).cos()
}
