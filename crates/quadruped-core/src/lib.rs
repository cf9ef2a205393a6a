//! Shared foundation of the quadruped controller crates.
//!
//! Error types and validated TOML configuration, plus the clocks that pace
//! the control loop.

pub mod config;
pub mod error;
pub mod time;

pub use config::Validate;
pub use error::{
    ChainError, ConfigError, DeviceError, JointAngleError, LinalgError, QuadrupedError,
    ServoError, SpineError,
};
pub use time::{LoopClock, RateEstimator, SteppedClock, WallClock};
