//! Input devices producing [`GamepadState`] and button edges.

use tracing::warn;

use crate::state::{ButtonEdge, GamepadConfig, GamepadState};

// ---------------------------------------------------------------------------
// InputDevice
// ---------------------------------------------------------------------------

/// A source of gamepad input, polled once per control tick.
pub trait InputDevice: Send {
    /// Short device description for logs.
    fn name(&self) -> &str;

    /// Consume pending input and return the button edges observed since
    /// the previous poll. Never blocks.
    fn poll(&mut self, now: f64) -> Vec<ButtonEdge>;

    /// Latest state. Disconnected devices report the cleared state.
    fn state(&self) -> &GamepadState;
}

// ---------------------------------------------------------------------------
// Linux joystick events
// ---------------------------------------------------------------------------

/// Size of one `struct js_event`.
pub const JS_EVENT_LEN: usize = 8;
/// Button press or release.
pub const JS_EVENT_BUTTON: u8 = 0x01;
/// Axis motion.
pub const JS_EVENT_AXIS: u8 = 0x02;
/// Synthetic event reporting initial state after open.
pub const JS_EVENT_INIT: u8 = 0x80;

/// One decoded `struct js_event`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JsEvent {
    /// Driver timestamp in milliseconds.
    pub time_ms: u32,
    pub value: i16,
    /// Event type with [`JS_EVENT_INIT`] possibly set.
    pub kind: u8,
    pub number: u8,
}

impl JsEvent {
    /// Decode the 8-byte native-endian wire form.
    #[must_use]
    pub fn parse(bytes: &[u8; JS_EVENT_LEN]) -> Self {
        Self {
            time_ms: u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            value: i16::from_ne_bytes([bytes[4], bytes[5]]),
            kind: bytes[6],
            number: bytes[7],
        }
    }

    /// Whether this is part of the initial-state burst.
    #[must_use]
    pub const fn is_init(&self) -> bool {
        self.kind & JS_EVENT_INIT != 0
    }

    /// Event type with the init flag masked off.
    #[must_use]
    pub const fn event_type(&self) -> u8 {
        self.kind & !JS_EVENT_INIT
    }
}

const fn sign(value: i16) -> i8 {
    if value > 0 {
        1
    } else if value < 0 {
        -1
    } else {
        0
    }
}

/// Fold one event into `state`.
///
/// Returns the button edge for non-init button events. Unknown axes and
/// buttons are ignored.
pub fn apply_event(state: &mut GamepadState, event: &JsEvent, config: &GamepadConfig) -> Option<ButtonEdge> {
    match event.event_type() {
        JS_EVENT_BUTTON => {
            let button = crate::state::Button::from_index(usize::from(event.number))?;
            let held = event.value & 1 == 1;
            state.set_button(button, held);
            if event.is_init() {
                None
            } else if held {
                Some(ButtonEdge::pressed(button))
            } else {
                Some(ButtonEdge::released(button))
            }
        }
        JS_EVENT_AXIS => {
            let v = event.value;
            match event.number {
                0 => state.left_x = config.stick(v),
                1 => state.left_y = -config.stick(v),
                2 => state.left_trigger = crate::state::trigger(v),
                3 => state.right_x = config.stick(v),
                4 => state.right_y = -config.stick(v),
                5 => state.right_trigger = crate::state::trigger(v),
                6 => state.dpad_x = sign(v),
                7 => state.dpad_y = -sign(v),
                _ => {}
            }
            None
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// JoystickDevice
// ---------------------------------------------------------------------------

#[cfg(unix)]
pub use joystick::JoystickDevice;

#[cfg(unix)]
mod joystick {
    use std::fs::{File, OpenOptions};
    use std::io::{ErrorKind, Read};
    use std::os::unix::fs::OpenOptionsExt;
    use std::path::{Path, PathBuf};

    use tracing::{debug, info, warn};

    use super::{InputDevice, JS_EVENT_LEN, JsEvent, apply_event};
    use crate::state::{ButtonEdge, GamepadConfig, GamepadState};

    /// Gamepad read from a Linux joystick node (`/dev/input/jsN`).
    ///
    /// The node is opened non-blocking. When it is absent or a read fails
    /// the state is cleared and every later poll retries the open.
    #[derive(Debug)]
    pub struct JoystickDevice {
        path: PathBuf,
        name: String,
        config: GamepadConfig,
        file: Option<File>,
        state: GamepadState,
        warned: bool,
    }

    impl JoystickDevice {
        /// Device for `/dev/input/js<config.index>`, connecting if present.
        #[must_use]
        pub fn new(config: GamepadConfig) -> Self {
            let path = PathBuf::from(format!("/dev/input/js{}", config.index));
            Self::with_path(path, config)
        }

        /// Device for an explicit node path.
        #[must_use]
        pub fn with_path(path: impl Into<PathBuf>, config: GamepadConfig) -> Self {
            let path = path.into();
            let mut device = Self {
                name: format!("joystick {}", path.display()),
                path,
                config,
                file: None,
                state: GamepadState::default(),
                warned: false,
            };
            device.connect();
            device
        }

        /// Node path.
        #[must_use]
        pub fn path(&self) -> &Path {
            &self.path
        }

        /// Whether the node is currently open.
        #[must_use]
        pub const fn is_connected(&self) -> bool {
            self.file.is_some()
        }

        fn connect(&mut self) {
            match OpenOptions::new()
                .read(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(&self.path)
            {
                Ok(file) => {
                    info!(path = %self.path.display(), "gamepad connected");
                    self.file = Some(file);
                    self.state.connected = true;
                    self.warned = false;
                }
                Err(err) => {
                    if !self.warned {
                        warn!(path = %self.path.display(), error = %err, "gamepad not available, retrying each tick");
                        self.warned = true;
                    }
                }
            }
        }

        fn disconnect(&mut self) {
            warn!(path = %self.path.display(), "gamepad disconnected");
            self.file = None;
            self.state.clear();
        }
    }

    impl InputDevice for JoystickDevice {
        fn name(&self) -> &str {
            &self.name
        }

        fn poll(&mut self, _now: f64) -> Vec<ButtonEdge> {
            if self.file.is_none() {
                self.connect();
            }
            let mut edges = Vec::new();
            while let Some(file) = self.file.as_mut() {
                let mut buf = [0u8; JS_EVENT_LEN];
                match file.read(&mut buf) {
                    Ok(JS_EVENT_LEN) => {
                        let event = JsEvent::parse(&buf);
                        if let Some(edge) = apply_event(&mut self.state, &event, &self.config) {
                            edges.push(edge);
                        }
                    }
                    Ok(got) => {
                        debug!(got, "short joystick read");
                        self.disconnect();
                    }
                    Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                    Err(err) if err.kind() == ErrorKind::Interrupted => {}
                    Err(err) => {
                        debug!(error = %err, "joystick read failed");
                        self.disconnect();
                    }
                }
            }
            edges
        }

        fn state(&self) -> &GamepadState {
            &self.state
        }
    }

}

// ---------------------------------------------------------------------------
// ScriptedGamepad
// ---------------------------------------------------------------------------

/// Replays timed gamepad states.
///
/// At each poll the latest keyframe at or before `now` becomes the state
/// and button edges are derived from the change.
#[derive(Clone, Debug, Default)]
pub struct ScriptedGamepad {
    keyframes: Vec<(f64, GamepadState)>,
    state: GamepadState,
}

impl ScriptedGamepad {
    /// Script with no keyframes; reports a connected, idle pad.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keyframes: Vec::new(),
            state: GamepadState {
                connected: true,
                ..GamepadState::default()
            },
        }
    }

    /// Add a keyframe taking effect at `time` seconds.
    #[must_use]
    pub fn at(mut self, time: f64, state: GamepadState) -> Self {
        let index = self.keyframes.partition_point(|(t, _)| *t <= time);
        self.keyframes.insert(index, (time, state));
        self
    }

    /// Number of keyframes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    /// Whether the script has no keyframes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }
}

impl InputDevice for ScriptedGamepad {
    fn name(&self) -> &str {
        "scripted gamepad"
    }

    fn poll(&mut self, now: f64) -> Vec<ButtonEdge> {
        let Some((_, next)) = self.keyframes.iter().rev().find(|(t, _)| *t <= now) else {
            return Vec::new();
        };
        let edges = next.edges_since(&self.state);
        self.state = next.clone();
        edges
    }

    fn state(&self) -> &GamepadState {
        &self.state
    }
}

/// Open the platform gamepad for `config`.
///
/// Falls back to an idle [`ScriptedGamepad`] where no joystick backend
/// exists.
#[must_use]
pub fn open_device(config: &GamepadConfig) -> Box<dyn InputDevice> {
    #[cfg(unix)]
    {
        Box::new(JoystickDevice::new(config.clone()))
    }
    #[cfg(not(unix))]
    {
        warn!(index = config.index, "no joystick backend on this platform, using idle input");
        Box::new(ScriptedGamepad::new())
    }
}

/// Device that never reports input. Used when no gamepad is wanted.
#[must_use]
pub fn idle_device() -> Box<dyn InputDevice> {
    warn!("gamepad input disabled");
    Box::new(ScriptedGamepad::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Button, EdgeKind};
    use approx::assert_relative_eq;

    fn event_bytes(value: i16, kind: u8, number: u8) -> [u8; JS_EVENT_LEN] {
        let mut bytes = [0u8; JS_EVENT_LEN];
        bytes[0..4].copy_from_slice(&1234u32.to_ne_bytes());
        bytes[4..6].copy_from_slice(&value.to_ne_bytes());
        bytes[6] = kind;
        bytes[7] = number;
        bytes
    }

    fn apply(state: &mut GamepadState, value: i16, kind: u8, number: u8) -> Option<ButtonEdge> {
        let event = JsEvent::parse(&event_bytes(value, kind, number));
        apply_event(state, &event, &GamepadConfig::default())
    }

    #[test]
    fn parse_fields() {
        let event = JsEvent::parse(&event_bytes(-300, JS_EVENT_AXIS | JS_EVENT_INIT, 4));
        assert_eq!(event.time_ms, 1234);
        assert_eq!(event.value, -300);
        assert_eq!(event.number, 4);
        assert!(event.is_init());
        assert_eq!(event.event_type(), JS_EVENT_AXIS);
    }

    #[test]
    fn button_events_produce_edges() {
        let mut state = GamepadState::default();
        assert_eq!(
            apply(&mut state, 1, JS_EVENT_BUTTON, 6),
            Some(ButtonEdge::pressed(Button::Start))
        );
        assert!(state.pressed(Button::Start));
        let edge = apply(&mut state, 0, JS_EVENT_BUTTON, 6).unwrap();
        assert_eq!(edge.kind, EdgeKind::Released);
        assert!(!state.pressed(Button::Start));
    }

    #[test]
    fn init_events_update_state_silently() {
        let mut state = GamepadState::default();
        assert_eq!(apply(&mut state, 1, JS_EVENT_BUTTON | JS_EVENT_INIT, 0), None);
        assert!(state.pressed(Button::A));
        assert_eq!(apply(&mut state, 32767, JS_EVENT_AXIS | JS_EVENT_INIT, 3), None);
        assert_relative_eq!(state.right_x, 1.0);
    }

    #[test]
    fn unknown_numbers_are_ignored() {
        let mut state = GamepadState::default();
        assert_eq!(apply(&mut state, 1, JS_EVENT_BUTTON, 11), None);
        assert_eq!(apply(&mut state, 500, JS_EVENT_AXIS, 9), None);
        assert_eq!(state, GamepadState::default());
    }

    #[test]
    fn axis_mapping() {
        let mut state = GamepadState::default();
        apply(&mut state, -32768, JS_EVENT_AXIS, 0);
        apply(&mut state, -32768, JS_EVENT_AXIS, 1);
        apply(&mut state, 32767, JS_EVENT_AXIS, 2);
        apply(&mut state, 1000, JS_EVENT_AXIS, 3);
        apply(&mut state, 18432, JS_EVENT_AXIS, 4);
        apply(&mut state, -32767, JS_EVENT_AXIS, 5);
        apply(&mut state, -32767, JS_EVENT_AXIS, 6);
        apply(&mut state, -32767, JS_EVENT_AXIS, 7);
        assert_relative_eq!(state.left_x, -1.0);
        assert_relative_eq!(state.left_y, 1.0);
        assert_relative_eq!(state.left_trigger, 1.0);
        assert_relative_eq!(state.right_x, 0.0);
        assert_relative_eq!(state.right_y, -0.5);
        assert_relative_eq!(state.right_trigger, 0.0);
        assert_eq!(state.dpad_x, -1);
        assert_eq!(state.dpad_y, 1);
    }

    #[test]
    fn scripted_replays_keyframes() {
        let pressed = GamepadState {
            connected: true,
            left_y: 0.5,
            ..GamepadState::default()
        }
        .with_button(Button::Start, true);
        let released = GamepadState {
            connected: true,
            ..GamepadState::default()
        };
        let mut pad = ScriptedGamepad::new().at(2.0, released).at(1.0, pressed);
        assert_eq!(pad.len(), 2);

        assert!(pad.poll(0.5).is_empty());
        assert!(pad.state().connected);

        assert_eq!(pad.poll(1.0), vec![ButtonEdge::pressed(Button::Start)]);
        assert_relative_eq!(pad.state().left_y, 0.5);
        assert!(pad.poll(1.5).is_empty());

        assert_eq!(pad.poll(2.5), vec![ButtonEdge::released(Button::Start)]);
        assert!(pad.poll(3.0).is_empty());
    }

    #[test]
    fn idle_device_reports_nothing() {
        let mut device = idle_device();
        assert!(device.poll(10.0).is_empty());
        assert_eq!(device.name(), "scripted gamepad");
    }
}
