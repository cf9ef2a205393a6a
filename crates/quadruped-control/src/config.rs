//! Robot configuration, loaded from TOML.
//!
//! Every section has serde defaults, so an empty file describes the
//! calibrated physical robot.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use quadruped_core::config::{from_file, from_toml_str, require_positive};
use quadruped_core::{ConfigError, Validate};
use quadruped_gait::{GaitProfile, presets};
use quadruped_hal::pca9685::PWM_CHANNELS;
use quadruped_hal::{ServoDriverConfig, SpineConfig};
use quadruped_ik::{DlsConfig, PlanarLeg};
use quadruped_teleop::GamepadConfig;

use crate::leg::LegKind;

/// Number of PWM channels on the servo driver.
pub const SERVO_CHANNELS: u8 = PWM_CHANNELS;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Locomotion controller settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Body height of the standing pose, in inches.
    pub stand_height: f64,
    /// Seconds the start button must have been down before walking begins.
    pub stand_hold: f64,
    /// Effort per unit of d-pad deflection on the spine motors.
    pub spine_gain: f64,
    /// Target loop period on hardware, in seconds.
    pub loop_period: f64,
    /// Link lengths of the sagittal-plane solver.
    pub planar: PlanarLeg,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            stand_height: 7.0,
            stand_hold: 1.0,
            spine_gain: 0.5,
            loop_period: 0.01,
            planar: PlanarLeg::default(),
        }
    }
}

impl Validate for ControlConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("control.stand_height", self.stand_height)?;
        require_positive("control.loop_period", self.loop_period)?;
        if !(self.stand_hold.is_finite() && self.stand_hold >= 0.0) {
            return Err(ConfigError::invalid(
                "control.stand_hold",
                format!("{} (must be >= 0)", self.stand_hold),
            ));
        }
        if !self.spine_gain.is_finite() {
            return Err(ConfigError::invalid("control.spine_gain", "must be finite"));
        }
        self.planar.validate()
    }
}

/// One servo: driver channel and calibration offset in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServoChannel {
    pub channel: u8,
    pub offset: f64,
}

impl ServoChannel {
    #[must_use]
    pub const fn new(channel: u8, offset: f64) -> Self {
        Self { channel, offset }
    }
}

/// Servo wiring of one leg.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegConfig {
    pub kind: LegKind,
    pub hip1: ServoChannel,
    pub hip2: ServoChannel,
    pub knee: ServoChannel,
}

impl LegConfig {
    /// Servos in chain order.
    #[must_use]
    pub const fn servos(&self) -> [ServoChannel; 3] {
        [self.hip1, self.hip2, self.knee]
    }
}

/// The measured wiring and calibration of the physical robot.
#[must_use]
pub fn default_legs() -> Vec<LegConfig> {
    let leg = |kind, hip1: (u8, f64), hip2: (u8, f64), knee: (u8, f64)| LegConfig {
        kind,
        hip1: ServoChannel::new(hip1.0, hip1.1),
        hip2: ServoChannel::new(hip2.0, hip2.1),
        knee: ServoChannel::new(knee.0, knee.1),
    };
    vec![
        leg(LegKind::FrontLeft, (4, 130.0), (5, 120.0), (6, 35.0)),
        leg(LegKind::FrontRight, (0, 20.0), (2, 58.0), (1, 147.0)),
        leg(LegKind::BackLeft, (8, 10.0), (10, 54.0), (9, 145.0)),
        leg(LegKind::BackRight, (15, 135.0), (14, 128.0), (13, 20.0)),
    ]
}

// ---------------------------------------------------------------------------
// RobotConfig
// ---------------------------------------------------------------------------

/// Complete robot configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub ik: DlsConfig,
    pub control: ControlConfig,
    pub legs: Vec<LegConfig>,
    pub gaits: Vec<GaitProfile>,
    pub servo: ServoDriverConfig,
    pub spine: SpineConfig,
    pub gamepad: GamepadConfig,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            ik: DlsConfig::default(),
            control: ControlConfig::default(),
            legs: default_legs(),
            gaits: presets(),
            servo: ServoDriverConfig::default(),
            spine: SpineConfig::default(),
            gamepad: GamepadConfig::default(),
        }
    }
}

impl RobotConfig {
    /// Parse and validate TOML.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] on parse or validation failure.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        from_toml_str(content)
    }

    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] on I/O, parse or validation failure.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        from_file(path)
    }

    /// Wiring of `kind`, if configured.
    #[must_use]
    pub fn leg(&self, kind: LegKind) -> Option<&LegConfig> {
        self.legs.iter().find(|leg| leg.kind == kind)
    }

    fn validate_legs(&self) -> Result<(), ConfigError> {
        let kinds: BTreeSet<LegKind> = self.legs.iter().map(|leg| leg.kind).collect();
        if kinds.len() != self.legs.len() {
            return Err(ConfigError::invalid("legs.kind", "each leg kind may appear only once"));
        }
        if let Some(missing) = LegKind::ALL.iter().find(|kind| !kinds.contains(kind)) {
            return Err(ConfigError::invalid("legs", format!("missing the {missing} leg")));
        }

        let mut channels = BTreeSet::new();
        for leg in &self.legs {
            for servo in leg.servos() {
                if servo.channel >= SERVO_CHANNELS {
                    return Err(ConfigError::invalid(
                        "legs.channel",
                        format!(
                            "{} on the {} leg (must be in [0, {}])",
                            servo.channel,
                            leg.kind,
                            SERVO_CHANNELS - 1
                        ),
                    ));
                }
                if !channels.insert(servo.channel) {
                    return Err(ConfigError::invalid(
                        "legs.channel",
                        format!("{} is used more than once", servo.channel),
                    ));
                }
                if !servo.offset.is_finite() {
                    return Err(ConfigError::invalid("legs.offset", "must be finite"));
                }
            }
        }
        Ok(())
    }
}

impl Validate for RobotConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.ik.validate()?;
        self.control.validate()?;
        self.validate_legs()?;
        if self.gaits.is_empty() {
            return Err(ConfigError::invalid("gaits", "at least one gait is required"));
        }
        for gait in &self.gaits {
            gait.validate()?;
        }
        self.servo.validate()?;
        self.spine.validate()?;
        self.gamepad.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadruped_gait::Trajectory;

    #[test]
    fn empty_file_gives_calibrated_defaults() {
        let config = RobotConfig::from_toml_str("").unwrap();
        assert_eq!(config, RobotConfig::default());
        assert_eq!(config.legs.len(), 4);
        assert_eq!(config.gaits.len(), 5);
        let fr = config.leg(LegKind::FrontRight).unwrap();
        assert_eq!(fr.knee, ServoChannel::new(1, 147.0));
        assert_eq!(config.ik.max_iterations, 100);
    }

    #[test]
    fn sections_override_defaults() {
        let config = RobotConfig::from_toml_str(
            r#"
            [control]
            stand_height = 6.0

            [[gaits]]
            name = "Only Trot"
            trajectory = "trot"
            step_frequency = 3.0

            [gamepad]
            index = 1
            "#,
        )
        .unwrap();
        assert!((config.control.stand_height - 6.0).abs() < f64::EPSILON);
        assert!((config.control.stand_hold - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.gaits.len(), 1);
        assert_eq!(config.gaits[0].trajectory, Trajectory::Trot);
        assert_eq!(config.gamepad.index, 1);
        assert_eq!(config.legs, default_legs());
    }

    #[test]
    fn rejects_duplicate_leg_kind() {
        let mut config = RobotConfig::default();
        config.legs[1].kind = LegKind::FrontLeft;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("legs.kind"));
    }

    #[test]
    fn rejects_missing_leg() {
        let mut config = RobotConfig::default();
        config.legs.pop();
        assert!(config.validate().unwrap_err().to_string().contains("Back Right"));
    }

    #[test]
    fn rejects_bad_channels() {
        let mut config = RobotConfig::default();
        config.legs[0].hip1.channel = 16;
        assert!(config.validate().unwrap_err().to_string().contains("legs.channel"));

        let mut config = RobotConfig::default();
        config.legs[0].hip1.channel = config.legs[1].hip1.channel;
        assert!(config.validate().unwrap_err().to_string().contains("more than once"));
    }

    #[test]
    fn rejects_empty_gait_table_and_bad_damping() {
        let mut config = RobotConfig::default();
        config.gaits.clear();
        assert!(config.validate().is_err());

        let err = RobotConfig::from_toml_str("[ik]\ndamping = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("ik.damping"));
    }

    #[test]
    fn servo_driver_section() {
        let config = RobotConfig::from_toml_str(
            r#"
            [servo]
            i2c_bus = "/dev/i2c-3"
            address = 0x41
            "#,
        )
        .unwrap();
        assert_eq!(config.servo.i2c_bus, std::path::PathBuf::from("/dev/i2c-3"));
        assert_eq!(config.servo.address, 0x41);
        assert!((config.servo.frequency - 333.0).abs() < f64::EPSILON);

        let err = RobotConfig::from_toml_str("[servo]
max_pulse_us = 4000.0
").unwrap_err();
        assert!(err.to_string().contains("servo.max_pulse_us"));
    }

    #[test]
    fn rejects_negative_stand_hold() {
        let mut config = RobotConfig::default();
        config.control.stand_hold = -1.0;
        assert!(config.validate().unwrap_err().to_string().contains("stand_hold"));
    }
}
