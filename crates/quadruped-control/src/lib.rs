//! Legs and the locomotion state machine of a four-legged walker.
//!
//! # Tick
//!
//! ```text
//! InputDevice::poll ─► LocomotionController::tick
//!                        ├─ button callbacks (X, Y, B)
//!                        ├─ state machine ─► Robot::{home, stand, run_gait}
//!                        │                     └─ Leg::{set_pose, set_pose_2d}
//!                        └─ Robot::drive_spine
//! ```
//!
//! [`run_loop`] repeats the tick until the operator presses Select or the
//! caller terminates the run, then stops the spine and homes the legs.
//! [`LegPlayback`] replays the commanded joints through a dynamics backend.

pub mod config;
pub mod controller;
pub mod leg;
pub mod playback;
pub mod robot;
pub mod runner;

pub use config::{ControlConfig, LegConfig, RobotConfig, ServoChannel, default_legs};
pub use controller::{LocomotionController, LocomotionState, TickOutcome, default_bindings};
pub use leg::{JOINT_LABELS, Leg, LegKind, METERS_PER_INCH};
pub use playback::LegPlayback;
pub use robot::{FootTarget, GAIT_ORDER, Robot, foot_target, gait_index};
pub use runner::{PacedClock, RunSummary, StopReason, run_loop};
