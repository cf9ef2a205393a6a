//! Gamepad state and axis conditioning.

use std::fmt;

use serde::{Deserialize, Serialize};

use quadruped_core::{ConfigError, Validate};

// ---------------------------------------------------------------------------
// Button
// ---------------------------------------------------------------------------

/// Gamepad buttons, in the joystick driver's numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Button {
    A,
    B,
    X,
    Y,
    LB,
    RB,
    Start,
    Select,
}

impl Button {
    /// Every button, in index order.
    pub const ALL: [Self; 8] = [
        Self::A,
        Self::B,
        Self::X,
        Self::Y,
        Self::LB,
        Self::RB,
        Self::Start,
        Self::Select,
    ];

    /// Position in [`Button::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Button for a driver button number.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::X => "X",
            Self::Y => "Y",
            Self::LB => "LB",
            Self::RB => "RB",
            Self::Start => "Start",
            Self::Select => "Select",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Axis conditioning
// ---------------------------------------------------------------------------

/// Symmetric deadband with saturation for raw stick values.
///
/// `|raw| ≤ deadband` gives 0, `|raw| ≥ saturation` gives ±1, linear in
/// between.
#[must_use]
pub fn deadband(raw: f64, deadband: f64, saturation: f64) -> f64 {
    if raw < 0.0 {
        return -self::deadband(-raw, deadband, saturation);
    }
    if raw <= deadband {
        0.0
    } else if raw >= saturation {
        1.0
    } else {
        (raw - deadband) / (saturation - deadband)
    }
}

/// Map a raw trigger axis in `[-32767, 32767]` to `[0, 1]`.
#[must_use]
pub fn trigger(raw: i16) -> f64 {
    (f64::from(raw) + f64::from(0x7FFF)) / f64::from(0xFFFE)
}

/// Stick conditioning parameters and device selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamepadConfig {
    /// Joystick number (`/dev/input/js<index>`).
    pub index: u32,
    /// Raw magnitude treated as zero.
    pub deadband: u16,
    /// Raw magnitude treated as full scale.
    pub saturation: u32,
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            index: 0,
            deadband: 0x1000,
            saturation: 0x8000,
        }
    }
}

impl GamepadConfig {
    /// Condition one raw stick value.
    #[must_use]
    pub fn stick(&self, raw: i16) -> f64 {
        deadband(f64::from(raw), f64::from(self.deadband), f64::from(self.saturation))
    }
}

impl Validate for GamepadConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if u32::from(self.deadband) >= self.saturation {
            return Err(ConfigError::invalid(
                "gamepad.deadband",
                format!("{} (must be below saturation {})", self.deadband, self.saturation),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GamepadState
// ---------------------------------------------------------------------------

/// Rising or falling button transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Pressed,
    Released,
}

/// One observed button transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ButtonEdge {
    pub button: Button,
    pub kind: EdgeKind,
}

impl ButtonEdge {
    /// Rising edge of `button`.
    #[must_use]
    pub const fn pressed(button: Button) -> Self {
        Self {
            button,
            kind: EdgeKind::Pressed,
        }
    }

    /// Falling edge of `button`.
    #[must_use]
    pub const fn released(button: Button) -> Self {
        Self {
            button,
            kind: EdgeKind::Released,
        }
    }
}

/// Normalized snapshot of a gamepad.
///
/// Sticks are in `[-1, 1]` with up and right positive, triggers in
/// `[0, 1]`, the d-pad in `{-1, 0, 1}`.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct GamepadState {
    pub connected: bool,
    pub left_x: f64,
    pub left_y: f64,
    pub right_x: f64,
    pub right_y: f64,
    pub left_trigger: f64,
    pub right_trigger: f64,
    pub dpad_x: i8,
    pub dpad_y: i8,
    /// Held state, indexed by [`Button::index`].
    pub buttons: [bool; 8],
}

impl GamepadState {
    /// Whether `button` is held.
    #[must_use]
    pub const fn pressed(&self, button: Button) -> bool {
        self.buttons[button.index()]
    }

    /// Set the held state of `button`.
    pub const fn set_button(&mut self, button: Button, held: bool) {
        self.buttons[button.index()] = held;
    }

    /// Builder form of [`set_button`](Self::set_button).
    #[must_use]
    pub const fn with_button(mut self, button: Button, held: bool) -> Self {
        self.set_button(button, held);
        self
    }

    /// Back to the disconnected, centered state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Button transitions going from `previous` to `self`.
    #[must_use]
    pub fn edges_since(&self, previous: &Self) -> Vec<ButtonEdge> {
        Button::ALL
            .iter()
            .filter_map(|&button| match (previous.pressed(button), self.pressed(button)) {
                (false, true) => Some(ButtonEdge::pressed(button)),
                (true, false) => Some(ButtonEdge::released(button)),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for GamepadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.connected {
            return write!(f, "Gamepad Disconnected.");
        }
        let b = |button| u8::from(self.pressed(button));
        writeln!(f, "Gamepad State:")?;
        writeln!(f, "  LeftX:      {:6.3}\tLeftY:       {:6.3}", self.left_x, self.left_y)?;
        writeln!(f, "  RightX:     {:6.3}\tRightY:      {:6.3}", self.right_x, self.right_y)?;
        writeln!(
            f,
            "  LeftTrigger:{:6.3}\tRightTrigger:{:6.3}",
            self.left_trigger, self.right_trigger
        )?;
        writeln!(f, "  DpadX:      {:2}    \tDpadY:       {:2}", self.dpad_x, self.dpad_y)?;
        writeln!(f, "  A:          {:2}    \tB:           {:2}", b(Button::A), b(Button::B))?;
        writeln!(f, "  X:          {:2}    \tY:           {:2}", b(Button::X), b(Button::Y))?;
        writeln!(f, "  LB:         {:2}    \tRB:          {:2}", b(Button::LB), b(Button::RB))?;
        write!(
            f,
            "  Start:      {:2}    \tSelect:      {:2}",
            b(Button::Start),
            b(Button::Select)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn deadband_shape() {
        let (db, sat) = (4096.0, 32768.0);
        assert_relative_eq!(deadband(0.0, db, sat), 0.0);
        assert_relative_eq!(deadband(4096.0, db, sat), 0.0);
        assert_relative_eq!(deadband(32767.0, db, sat), (32767.0 - 4096.0) / (32768.0 - 4096.0));
        assert_relative_eq!(deadband(40000.0, db, sat), 1.0);
        assert_relative_eq!(deadband(18432.0, db, sat), 0.5);
        assert_relative_eq!(deadband(-18432.0, db, sat), -0.5);
        assert_relative_eq!(deadband(-100.0, db, sat), 0.0);
    }

    #[test]
    fn stick_uses_config() {
        let config = GamepadConfig::default();
        assert_relative_eq!(config.stick(-32768), -1.0);
        assert_relative_eq!(config.stick(2000), 0.0);
        assert!(config.validate().is_ok());
        let bad = GamepadConfig {
            deadband: 0x9000,
            ..GamepadConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn trigger_range() {
        assert_relative_eq!(trigger(-32767), 0.0);
        assert_relative_eq!(trigger(32767), 1.0);
        assert_relative_eq!(trigger(0), 0.5);
    }

    #[test]
    fn button_indices() {
        for (i, button) in Button::ALL.iter().enumerate() {
            assert_eq!(button.index(), i);
            assert_eq!(Button::from_index(i), Some(*button));
        }
        assert_eq!(Button::from_index(8), None);
        assert_eq!(Button::Start.to_string(), "Start");
    }

    #[test]
    fn edges_between_states() {
        let before = GamepadState::default().with_button(Button::A, true);
        let after = GamepadState::default()
            .with_button(Button::Start, true)
            .with_button(Button::B, false);
        let edges = after.edges_since(&before);
        assert_eq!(
            edges,
            vec![ButtonEdge::released(Button::A), ButtonEdge::pressed(Button::Start)]
        );
        assert!(after.edges_since(&after).is_empty());
    }

    #[test]
    fn display_reports_connection() {
        let mut state = GamepadState::default();
        assert_eq!(state.to_string(), "Gamepad Disconnected.");
        state.connected = true;
        state.left_x = 0.25;
        state.set_button(Button::Select, true);
        let text = state.to_string();
        assert!(text.contains("LeftX:       0.250"));
        assert!(text.contains("Select:       1"));
    }

    #[test]
    fn clear_resets_everything() {
        let mut state = GamepadState {
            connected: true,
            right_y: 0.7,
            dpad_x: -1,
            ..GamepadState::default()
        };
        state.set_button(Button::X, true);
        state.clear();
        assert_eq!(state, GamepadState::default());
    }
}
