//! The assembled robot: four legs, the spine module and the gait table.
//!
//! Legs are held in gait order (front left, back left, front right, back
//! right); the index in that order is the leg index the trajectories see,
//! so the trot pairs are front-left/back-right and back-left/front-right.

use std::f64::consts::{PI, TAU};
use std::fmt::Write as _;
use std::sync::Arc;

use nalgebra::Vector3;

use quadruped_core::{ConfigError, JointAngleError, QuadrupedError, RateEstimator};
use quadruped_gait::{GaitProfile, GaitSelector, TrajectoryPoint};
use quadruped_hal::{JointServo, ServoBus, SimulatedJoint, SpineModule};
use quadruped_ik::default_backend;
use quadruped_teleop::{Button, GamepadState};

use crate::config::{ControlConfig, RobotConfig};
use crate::leg::{Leg, LegKind};

/// Leg order seen by the gait trajectories.
pub const GAIT_ORDER: [LegKind; 4] = [
    LegKind::FrontLeft,
    LegKind::BackLeft,
    LegKind::FrontRight,
    LegKind::BackRight,
];

/// Position of `kind` in [`GAIT_ORDER`].
#[must_use]
pub const fn gait_index(kind: LegKind) -> usize {
    match kind {
        LegKind::FrontLeft => 0,
        LegKind::BackLeft => 1,
        LegKind::FrontRight => 2,
        LegKind::BackRight => 3,
    }
}

// ---------------------------------------------------------------------------
// Foot targets
// ---------------------------------------------------------------------------

/// Where one leg's foot should go this tick, in inches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FootTarget {
    /// Full body-frame position, solved numerically.
    Spatial(Vector3<f64>),
    /// Sagittal-plane position relative to the hip, solved in closed form.
    Planar { y: f64, z: f64 },
}

/// Foot target for leg `index` (gait order) at gait `phase`.
///
/// ```text
/// (u, v)  = trajectory(phase, index)
/// x, y    = stride · stick · u, then home rotated by π·spin·u·RightX
/// x      -= xSway·cos(2π·phase),  y += ySway·sin(4π·phase)
/// x, y   += stance, outward
/// z       = stepHeight·v − bodyHeight + y·pitch·RightY
/// ```
///
/// Holding A selects the planar target with `y` taken relative to home.
#[must_use]
pub fn foot_target(
    gait: &GaitProfile,
    input: &GamepadState,
    phase: f64,
    index: usize,
    kind: LegKind,
    home: &Vector3<f64>,
) -> FootTarget {
    let TrajectoryPoint { u, v } = gait.sample(phase, index);
    let step_height = gait.step_height(input.right_trigger);
    let body_height = gait.body_height(input.left_trigger, step_height);

    let mut x = gait.x_stride * input.left_x * u;
    let mut y = gait.y_stride * input.left_y * u;

    let (rs, rc) = (PI * gait.spin * u * input.right_x).sin_cos();
    x += rc.mul_add(home.x, rs * home.y);
    y += rc.mul_add(home.y, -rs * home.x);

    x -= gait.x_sway * (TAU * phase).cos();
    y += gait.y_sway * (2.0 * TAU * phase).sin();
    x += kind.side_sign() * gait.x_stance;
    y += kind.end_sign() * gait.y_stance;

    let z = y.mul_add(gait.pitch * input.right_y, step_height.mul_add(v, -body_height));

    if input.pressed(Button::A) {
        FootTarget::Planar { y: y - home.y, z }
    } else {
        FootTarget::Spatial(Vector3::new(x, y, z))
    }
}

// ---------------------------------------------------------------------------
// Robot
// ---------------------------------------------------------------------------

/// Legs, spine and gaits, plus the latest operator input.
#[derive(Debug)]
pub struct Robot {
    legs: [Leg; 4],
    spine: SpineModule,
    gaits: GaitSelector,
    control: ControlConfig,
    rate: RateEstimator,
    input: GamepadState,
}

impl Robot {
    /// Assemble from parts. `legs` must be in [`GAIT_ORDER`].
    #[must_use]
    pub fn new(legs: [Leg; 4], spine: SpineModule, gaits: GaitSelector, control: ControlConfig) -> Self {
        Self {
            legs,
            spine,
            gaits,
            control,
            rate: RateEstimator::new(),
            input: GamepadState::default(),
        }
    }

    /// Assemble from `config`, opening servo channels on `bus`.
    ///
    /// # Errors
    ///
    /// [`QuadrupedError::Config`] for a leg table without all four legs.
    pub fn assemble(config: &RobotConfig, bus: &mut dyn ServoBus, spine: SpineModule) -> Result<Self, QuadrupedError> {
        Self::assemble_with(config, bus, spine, |_, _| None)
    }

    /// Like [`assemble`](Self::assemble), also attaching the simulated joint
    /// returned by `simulated(leg, joint_index)` to each servo.
    ///
    /// # Errors
    ///
    /// [`QuadrupedError::Config`] for a leg table without all four legs.
    pub fn assemble_with(
        config: &RobotConfig,
        bus: &mut dyn ServoBus,
        spine: SpineModule,
        mut simulated: impl FnMut(LegKind, usize) -> Option<Box<dyn SimulatedJoint>>,
    ) -> Result<Self, QuadrupedError> {
        let kinematics = default_backend(config.ik);
        let mut legs = Vec::with_capacity(GAIT_ORDER.len());
        for kind in GAIT_ORDER {
            let wiring = config
                .leg(kind)
                .ok_or_else(|| ConfigError::invalid("legs", format!("missing the {kind} leg")))?;
            let mut index = 0;
            let servos = wiring.servos().map(|servo| {
                let mut joint = JointServo::new(servo.offset).with_physical(bus.open_channel(servo.channel));
                if let Some(sim) = simulated(kind, index) {
                    joint = joint.with_simulated(sim);
                }
                index += 1;
                joint
            });
            legs.push(Leg::new(kind, servos, Arc::clone(&kinematics), config.control.planar)?);
        }
        let legs: [Leg; 4] = legs
            .try_into()
            .map_err(|_| ConfigError::invalid("legs", "exactly four legs are required"))?;
        let gaits = GaitSelector::new(config.gaits.clone())?;
        Ok(Self::new(legs, spine, gaits, config.control.clone()))
    }

    /// Legs in gait order.
    #[must_use]
    pub const fn legs(&self) -> &[Leg; 4] {
        &self.legs
    }

    /// Leg of `kind`.
    #[must_use]
    pub const fn leg(&self, kind: LegKind) -> &Leg {
        &self.legs[gait_index(kind)]
    }

    /// Mutable leg of `kind`.
    pub const fn leg_mut(&mut self, kind: LegKind) -> &mut Leg {
        &mut self.legs[gait_index(kind)]
    }

    #[must_use]
    pub const fn spine(&self) -> &SpineModule {
        &self.spine
    }

    pub const fn spine_mut(&mut self) -> &mut SpineModule {
        &mut self.spine
    }

    #[must_use]
    pub const fn gaits(&self) -> &GaitSelector {
        &self.gaits
    }

    pub const fn gaits_mut(&mut self) -> &mut GaitSelector {
        &mut self.gaits
    }

    #[must_use]
    pub const fn control(&self) -> &ControlConfig {
        &self.control
    }

    /// Loop-rate diagnostics.
    #[must_use]
    pub const fn rate(&self) -> &RateEstimator {
        &self.rate
    }

    /// Operator input of the current tick.
    #[must_use]
    pub const fn input(&self) -> &GamepadState {
        &self.input
    }

    pub(crate) fn begin_tick(&mut self, dt: f64, input: &GamepadState) {
        self.rate.observe(dt);
        self.input.clone_from(input);
    }

    /// All joints to zero.
    ///
    /// # Errors
    ///
    /// The first [`JointAngleError`]; later legs are not updated.
    pub fn home(&mut self) -> Result<(), JointAngleError> {
        for leg in &mut self.legs {
            leg.set_joint_angles([0.0; 3])?;
        }
        Ok(())
    }

    /// Every foot straight under its hip at the configured stand height.
    ///
    /// # Errors
    ///
    /// The first [`JointAngleError`]; later legs are not updated.
    pub fn stand(&mut self) -> Result<(), JointAngleError> {
        let height = self.control.stand_height;
        for leg in &mut self.legs {
            leg.set_pose_2d(0.0, -height)?;
        }
        Ok(())
    }

    /// Drive every leg along the active gait after `elapsed` seconds of
    /// walking.
    ///
    /// # Errors
    ///
    /// The first leg error; later legs are not updated.
    pub fn run_gait(&mut self, elapsed: f64) -> Result<(), QuadrupedError> {
        let gait = self.gaits.active();
        let phase = gait.phase(elapsed);
        for (index, leg) in self.legs.iter_mut().enumerate() {
            match foot_target(gait, &self.input, phase, index, leg.kind(), leg.home()) {
                FootTarget::Spatial(p) => {
                    leg.set_pose(p.x, p.y, p.z)?;
                }
                FootTarget::Planar { y, z } => leg.set_pose_2d(y, z)?,
            }
        }
        Ok(())
    }

    /// Spine efforts from the d-pad, then one transfer.
    ///
    /// # Errors
    ///
    /// Propagates spine argument errors.
    pub fn drive_spine(&mut self) -> Result<(), QuadrupedError> {
        let gain = self.control.spine_gain;
        let dx = gain * f64::from(self.input.dpad_x);
        let dy = gain * f64::from(self.input.dpad_y);
        self.spine.run_motors(&[dy + dx, dy, dy - dx])?;
        self.spine.update();
        Ok(())
    }

    /// Stop the spine and home every leg.
    ///
    /// # Errors
    ///
    /// [`JointAngleError`] from homing.
    pub fn shutdown(&mut self) -> Result<(), JointAngleError> {
        self.spine.stop();
        self.spine.update();
        self.home()
    }

    /// Multi-line state report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::from("Quadruped State:");
        let _ = write!(out, "\n  Gait: {}", self.gaits.active().name);
        let _ = write!(out, "\n  Control Loop Update Rate:\t{:.2} Hz", self.rate.rate());
        let _ = write!(out, "\n  Spine Motor Positions:\t{:?}", self.spine.motor_positions());
        for leg in &self.legs {
            let _ = write!(out, "\n  {} Leg Joint Angles:\t{}", leg.label(), leg.format_angles());
        }
        out
    }
}
