//! Actuator collaborators for the quadruped controller.
//!
//! Provides the joint servo model with calibration and clamping, the
//! PCA9685 PWM driver behind it, and the spine module with its report
//! codec, position tracking and per-motor position controller. Device
//! access is Linux `i2c-dev` for the servos and `hidraw` for the spine.
//!
//! # Joint Pipeline
//!
//! ```text
//! joint angle (°) → + offset → clamp [0°, 180°] → ServoOutput
//!                 └────────── radians ─────────→ SimulatedJoint
//! ```
//!
//! Missing hardware never stops the control loop: the null bus and a
//! detached spine controller accept every command, after one warning.

pub mod control;
#[cfg(target_os = "linux")]
pub mod hidraw;
pub mod pca9685;
pub mod servo;
pub mod spine;

pub use control::{PidController, PidGains};
#[cfg(target_os = "linux")]
pub use hidraw::HidrawTransport;
pub use pca9685::{Pca9685, Pca9685ServoBus, ServoDriverConfig, open_servo_bus};
pub use servo::{
    JointServo, MemoryServoBus, NullServoBus, SERVO_RANGE_DEG, ServoBus, ServoOutput,
    SharedJointPosition, SimulatedJoint,
};
pub use spine::{
    SpineConfig, SpineController, SpineModule, SpineMotor, SpineTransport, encode_pwm,
    track_position,
};

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::pca9685::{ServoDriverConfig, open_servo_bus};
    pub use crate::servo::{JointServo, ServoBus, ServoOutput, SimulatedJoint};
    pub use crate::spine::{SpineConfig, SpineController, SpineModule};
}
