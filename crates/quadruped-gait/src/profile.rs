//! Gait profiles and the operator's active-gait selection.
//!
//! A [`GaitProfile`] scales a raw [`Trajectory`] into foot motion: stride
//! and step-height amplitudes, body-height bounds, and the spin, pitch,
//! sway and stance couplings. Profiles are plain configuration and are
//! loaded from the `[[gaits]]` tables of the robot config.

use serde::{Deserialize, Serialize};
use tracing::info;

use quadruped_core::{ConfigError, Validate};

use crate::gait::{Trajectory, TrajectoryPoint};

/// One selectable gait.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaitProfile {
    /// Human-readable name shown to the operator.
    pub name: String,
    /// Trajectory family.
    pub trajectory: Trajectory,
    /// Phase units per second.
    pub step_frequency: f64,
    /// Step height with the right trigger released.
    pub min_step_height: f64,
    /// Step height with the right trigger fully pressed.
    pub max_step_height: f64,
    /// Body height reached with the left trigger fully pressed, before the
    /// step height is added.
    pub min_body_height: f64,
    /// Body height with the left trigger released.
    pub max_body_height: f64,
    /// Stride along x at full stick.
    pub x_stride: f64,
    /// Stride along y at full stick.
    pub y_stride: f64,
    /// Yaw coupling, in half turns per unit stride at full stick.
    pub spin: f64,
    /// Body pitch coupling.
    pub pitch: f64,
    /// Lateral sway amplitude.
    pub x_sway: f64,
    /// Fore-aft sway amplitude.
    pub y_sway: f64,
    /// Extra stance width, outward on both sides.
    pub x_stance: f64,
    /// Extra stance length, outward front and back.
    pub y_stance: f64,
}

impl Default for GaitProfile {
    fn default() -> Self {
        Self {
            name: "Not Specified".into(),
            trajectory: Trajectory::Walk,
            step_frequency: 4.0,
            min_step_height: 0.2,
            max_step_height: 3.0,
            min_body_height: 1.5,
            max_body_height: 7.0,
            x_stride: 3.0,
            y_stride: 3.0,
            spin: 0.1,
            pitch: 0.2,
            x_sway: 0.0,
            y_sway: 0.0,
            x_stance: 0.0,
            y_stance: 0.0,
        }
    }
}

impl GaitProfile {
    /// Default profile with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Gait phase after `elapsed` seconds of walking.
    #[must_use]
    pub fn phase(&self, elapsed: f64) -> f64 {
        elapsed * self.step_frequency
    }

    /// Step height for a right-trigger value in `[0, 1]`.
    #[must_use]
    pub fn step_height(&self, trigger: f64) -> f64 {
        (self.max_step_height - self.min_step_height).mul_add(trigger, self.min_step_height)
    }

    /// Body height for a left-trigger value in `[0, 1]`, given the current
    /// step height. Fully pressed lowers the body to `min + step_height`.
    #[must_use]
    pub fn body_height(&self, trigger: f64, step_height: f64) -> f64 {
        (self.min_body_height + step_height - self.max_body_height).mul_add(trigger, self.max_body_height)
    }

    /// Sample this profile's trajectory.
    #[must_use]
    pub fn sample(&self, phase: f64, leg: usize) -> TrajectoryPoint {
        self.trajectory.sample(phase, leg)
    }
}

impl Validate for GaitProfile {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("gaits.name", "must not be empty"));
        }
        let finite = [
            self.step_frequency,
            self.min_step_height,
            self.max_step_height,
            self.min_body_height,
            self.max_body_height,
            self.x_stride,
            self.y_stride,
            self.spin,
            self.pitch,
            self.x_sway,
            self.y_sway,
            self.x_stance,
            self.y_stance,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::invalid(
                format!("gaits.{}", self.name),
                "all values must be finite",
            ));
        }
        if self.step_frequency < 0.0 {
            return Err(ConfigError::invalid(
                format!("gaits.{}.step_frequency", self.name),
                format!("{} (must be >= 0)", self.step_frequency),
            ));
        }
        if self.min_step_height > self.max_step_height {
            return Err(ConfigError::invalid(
                format!("gaits.{}.min_step_height", self.name),
                "must not exceed max_step_height",
            ));
        }
        if self.min_body_height > self.max_body_height {
            return Err(ConfigError::invalid(
                format!("gaits.{}.min_body_height", self.name),
                "must not exceed max_body_height",
            ));
        }
        Ok(())
    }
}

/// The calibrated gait table of the physical robot.
#[must_use]
pub fn presets() -> Vec<GaitProfile> {
    vec![
        GaitProfile::named("Fast Walk"),
        GaitProfile {
            trajectory: Trajectory::Trot,
            ..GaitProfile::named("Fast Trot")
        },
        GaitProfile {
            trajectory: Trajectory::Trot,
            step_frequency: 2.0,
            ..GaitProfile::named("Slow Trot")
        },
        GaitProfile {
            max_body_height: 6.5,
            step_frequency: 0.6,
            x_sway: 1.0,
            y_sway: 2.0,
            ..GaitProfile::named("Slow Walk with Sway")
        },
        GaitProfile {
            max_body_height: 6.0,
            x_stance: 1.0,
            y_stance: 1.0,
            ..GaitProfile::named("Fast Walk with Wide Stance")
        },
    ]
}

// ---------------------------------------------------------------------------
// GaitSelector
// ---------------------------------------------------------------------------

/// Non-empty gait table with a cyclic active selection.
#[derive(Clone, Debug, PartialEq)]
pub struct GaitSelector {
    gaits: Vec<GaitProfile>,
    active: usize,
}

impl GaitSelector {
    /// Selector over `gaits`, starting at the first.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] if `gaits` is empty or any profile
    /// fails validation.
    pub fn new(gaits: Vec<GaitProfile>) -> Result<Self, ConfigError> {
        if gaits.is_empty() {
            return Err(ConfigError::invalid("gaits", "at least one gait is required"));
        }
        for gait in &gaits {
            gait.validate()?;
        }
        Ok(Self { gaits, active: 0 })
    }

    /// Selector over [`presets`].
    #[must_use]
    pub fn with_presets() -> Self {
        Self {
            gaits: presets(),
            active: 0,
        }
    }

    /// Active profile.
    #[must_use]
    pub fn active(&self) -> &GaitProfile {
        &self.gaits[self.active]
    }

    /// Index of the active profile.
    #[must_use]
    pub const fn active_index(&self) -> usize {
        self.active
    }

    /// All profiles.
    #[must_use]
    pub fn gaits(&self) -> &[GaitProfile] {
        &self.gaits
    }

    /// Advance to the next profile, wrapping after the last.
    pub fn next_gait(&mut self) -> &GaitProfile {
        self.active = (self.active + 1) % self.gaits.len();
        info!(gait = %self.gaits[self.active].name, index = self.active, "gait changed");
        self.active()
    }

    /// Select a profile by index. Returns false if out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.gaits.len() {
            self.active = index;
            true
        } else {
            false
        }
    }

    /// Back to the first profile.
    pub const fn reset(&mut self) {
        self.active = 0;
    }
}

impl Default for GaitSelector {
    fn default() -> Self {
        Self::with_presets()
    }
}
