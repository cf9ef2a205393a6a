//! Gamepad input for teleoperating the quadruped.
//!
//! This crate keeps input capture separate from what the buttons do:
//!
//! - [`GamepadState`]: normalized sticks, triggers, d-pad and buttons
//! - [`InputDevice`]: polled once per tick, returns the button edges seen
//!   since the previous poll ([`JoystickDevice`] on Unix, [`ScriptedGamepad`]
//!   for simulation and tests)
//! - [`ButtonCallbacks`]: per-button press/release slots invoked with a
//!   mutable context
//!
//! # Example
//!
//! ```
//! use quadruped_teleop::prelude::*;
//!
//! let start = GamepadState { connected: true, ..GamepadState::default() }
//!     .with_button(Button::Start, true);
//! let mut pad = ScriptedGamepad::new().at(0.0, start);
//!
//! let mut presses = 0u32;
//! let mut callbacks = ButtonCallbacks::<u32>::new();
//! callbacks.on_pressed(Button::Start, |n| *n += 1);
//! callbacks.dispatch(&pad.poll(0.1), &mut presses);
//! assert_eq!(presses, 1);
//! ```

pub mod callbacks;
pub mod device;
pub mod state;

pub use callbacks::{ButtonCallbacks, Callback};
#[cfg(unix)]
pub use device::JoystickDevice;
pub use device::{InputDevice, JsEvent, ScriptedGamepad, apply_event, idle_device, open_device};
pub use state::{Button, ButtonEdge, EdgeKind, GamepadConfig, GamepadState, deadband, trigger};

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::callbacks::ButtonCallbacks;
    pub use crate::device::{InputDevice, ScriptedGamepad};
    pub use crate::state::{Button, ButtonEdge, EdgeKind, GamepadConfig, GamepadState};
}
