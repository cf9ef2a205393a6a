//! Per-tick locomotion state machine.
//!
//! ```text
//!            start released              start pressed
//!   Home ──────────────────► ReadyToStand ─────────────► Standing
//!                                ▲                          │ start released
//!                                │ start pressed            │ and ≥ hold
//!                                └──────── Walking ◄────────┘
//! ```
//!
//! "Pressed" means a rising edge seen by the controller; the input device
//! only has to report the held state.

use std::fmt;

use tracing::info;

use quadruped_core::QuadrupedError;
use quadruped_teleop::{Button, ButtonCallbacks, ButtonEdge, GamepadState};

use crate::robot::Robot;

/// Controller mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LocomotionState {
    /// Every joint at zero; waiting for the start button to be released.
    #[default]
    Home,
    /// Holding the last pose until start is pressed.
    ReadyToStand,
    /// Standing pose, waiting for start to be released.
    Standing,
    /// Following the active gait.
    Walking,
}

impl fmt::Display for LocomotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Home => "home",
            Self::ReadyToStand => "ready to stand",
            Self::Standing => "standing",
            Self::Walking => "walking",
        };
        f.write_str(name)
    }
}

/// Whether the loop should keep going after a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The operator pressed Select.
    Stop,
}

/// X logs the gamepad, Y logs the robot, B cycles gaits.
#[must_use]
pub fn default_bindings() -> ButtonCallbacks<Robot> {
    let mut callbacks = ButtonCallbacks::new();
    callbacks.on_pressed(Button::X, |robot: &mut Robot| info!("\n{}", robot.input()));
    callbacks.on_pressed(Button::Y, |robot: &mut Robot| info!("\n{}", robot.report()));
    callbacks.on_pressed(Button::B, |robot: &mut Robot| {
        robot.gaits_mut().next_gait();
    });
    callbacks
}

/// The robot plus its locomotion state.
#[derive(Debug)]
pub struct LocomotionController {
    robot: Robot,
    callbacks: ButtonCallbacks<Robot>,
    state: LocomotionState,
    anchor: f64,
    start_held: bool,
    last_tick: Option<f64>,
}

impl LocomotionController {
    /// Controller in [`LocomotionState::Home`] with [`default_bindings`].
    #[must_use]
    pub fn new(robot: Robot) -> Self {
        Self::with_callbacks(robot, default_bindings())
    }

    /// Controller with custom button bindings.
    #[must_use]
    pub fn with_callbacks(robot: Robot, callbacks: ButtonCallbacks<Robot>) -> Self {
        Self {
            robot,
            callbacks,
            state: LocomotionState::Home,
            anchor: 0.0,
            start_held: false,
            last_tick: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> LocomotionState {
        self.state
    }

    #[must_use]
    pub const fn robot(&self) -> &Robot {
        &self.robot
    }

    pub const fn robot_mut(&mut self) -> &mut Robot {
        &mut self.robot
    }

    pub const fn callbacks_mut(&mut self) -> &mut ButtonCallbacks<Robot> {
        &mut self.callbacks
    }

    /// Time of the last timed transition (start pressed, or walking began).
    #[must_use]
    pub const fn anchor(&self) -> f64 {
        self.anchor
    }

    fn enter(&mut self, next: LocomotionState, now: f64) {
        info!(from = %self.state, to = %next, t = now, "locomotion state changed");
        self.state = next;
    }

    /// Run one tick at time `now` (seconds).
    ///
    /// Button callbacks for `edges` run first, then the state machine, then
    /// the spine drive. Select held ends the run after this tick.
    ///
    /// # Errors
    ///
    /// The first leg or spine error. The rest of the tick is skipped.
    pub fn tick(
        &mut self,
        now: f64,
        input: &GamepadState,
        edges: &[ButtonEdge],
    ) -> Result<TickOutcome, QuadrupedError> {
        let dt = now - self.last_tick.unwrap_or(now);
        self.last_tick = Some(now);
        self.robot.begin_tick(dt, input);
        self.callbacks.dispatch(edges, &mut self.robot);

        let start = input.pressed(Button::Start);
        let start_pressed = start && !self.start_held;
        self.start_held = start;

        match self.state {
            LocomotionState::Home => {
                self.robot.home()?;
                if !start {
                    self.enter(LocomotionState::ReadyToStand, now);
                }
            }
            LocomotionState::ReadyToStand => {
                if start_pressed {
                    self.anchor = now;
                    self.enter(LocomotionState::Standing, now);
                }
            }
            LocomotionState::Standing => {
                self.robot.stand()?;
                if !start && now >= self.anchor + self.robot.control().stand_hold {
                    self.anchor = now;
                    self.enter(LocomotionState::Walking, now);
                }
            }
            LocomotionState::Walking => {
                if start_pressed {
                    self.robot.home()?;
                    self.enter(LocomotionState::ReadyToStand, now);
                } else {
                    self.robot.run_gait(now - self.anchor)?;
                }
            }
        }

        self.robot.drive_spine()?;

        if input.pressed(Button::Select) {
            Ok(TickOutcome::Stop)
        } else {
            Ok(TickOutcome::Continue)
        }
    }

    /// Stop the spine and home the legs.
    ///
    /// # Errors
    ///
    /// [`QuadrupedError::JointAngle`] from homing.
    pub fn shutdown(&mut self) -> Result<(), QuadrupedError> {
        self.robot.shutdown()?;
        Ok(())
    }
}
