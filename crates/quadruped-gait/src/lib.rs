//! Gait generation for a four-legged walker.
//!
//! 1. **Trajectories** ([`gait`]) are pure functions of phase and leg index
//!    producing a normalized foot offset.
//! 2. **Profiles** ([`profile`]) scale those offsets into stride, step
//!    height and body height, and add the spin, pitch, sway and stance
//!    couplings.
//! 3. **Selection** ([`GaitSelector`]) keeps the operator's active profile
//!    and cycles through the table on request.

pub mod gait;
pub mod profile;

pub use gait::{Trajectory, TrajectoryPoint, trot, walk};
pub use profile::{GaitProfile, GaitSelector, presets};
