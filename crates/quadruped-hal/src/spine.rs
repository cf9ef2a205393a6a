//! Spine actuator module.
//!
//! The module's USB controller drives up to 32 motor channels. Every update
//! is one duplex transfer of a 64-byte report:
//!
//! - **out**: two bytes per channel, a signed 12-bit PWM duty with the high
//!   nibble first (`[(v >> 8) & 0x0F, v & 0xFF]`).
//! - **in**: an 8-bit wrapped encoder count at byte `2·channel`.
//!
//! Positions are tracked as unbounded counters: each update moves a counter
//! by the wrap-corrected difference to the new reading, slew-limited to ±16
//! counts. Without a device the controller runs detached and every
//! operation is a no-op.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use quadruped_core::{ConfigError, DeviceError, SpineError, Validate};

use crate::control::{PidController, PidGains};

/// Report size in bytes.
pub const PACKET_LEN: usize = 64;
/// Motor channels per module.
pub const CHANNELS: usize = PACKET_LEN / 2;
/// Largest position change accepted per update, in counts.
pub const MAX_SLEW: i32 = 16;
/// Full PWM scale; `±1.0` maps to `±2047`.
pub const PWM_SCALE: f64 = 2048.0;

/// Raw report transport.
pub trait SpineTransport: Send {
    /// Send one outgoing report.
    ///
    /// # Errors
    ///
    /// [`DeviceError`] on I/O failure.
    fn write(&mut self, packet: &[u8; PACKET_LEN]) -> Result<(), DeviceError>;

    /// Receive one incoming report.
    ///
    /// # Errors
    ///
    /// [`DeviceError`] on I/O failure or a short read.
    fn read(&mut self) -> Result<[u8; PACKET_LEN], DeviceError>;
}

/// Encode a normalized effort in `[-1, 1]` as the two PWM bytes.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn encode_pwm(value: f64) -> [u8; 2] {
    let v = (PWM_SCALE * value).round().clamp(-2047.0, 2047.0) as i32;
    [((v >> 8) & 0x0F) as u8, (v & 0xFF) as u8]
}

/// Next counter value given the previous counter and a raw 8-bit reading.
#[must_use]
pub fn track_position(previous: i32, reading: u8) -> i32 {
    let mut d = i32::from(reading) - (previous & 0xFF);
    if d > 128 {
        d -= 256;
    } else if d < -128 {
        d += 256;
    }
    previous + d.clamp(-MAX_SLEW, MAX_SLEW)
}

fn check_channel(channel: usize) -> Result<(), SpineError> {
    if channel < CHANNELS {
        Ok(())
    } else {
        Err(SpineError::ChannelOutOfRange(channel))
    }
}

// ---------------------------------------------------------------------------
// SpineConfig
// ---------------------------------------------------------------------------

/// USB identity, motor channels and controller gains of the spine module.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpineConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Channels of the three spine motors, in module order.
    pub channels: [usize; 3],
    pub pid: PidGains,
}

impl Default for SpineConfig {
    fn default() -> Self {
        Self {
            vendor_id: 0xFFEF,
            product_id: 0x0004,
            channels: [5, 7, 6],
            pid: PidGains::default(),
        }
    }
}

impl Validate for SpineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for channel in self.channels {
            if check_channel(channel).is_err() {
                return Err(ConfigError::invalid(
                    "spine.channels",
                    format!("{channel} (must be in [0, 31])"),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SpineController
// ---------------------------------------------------------------------------

/// Outgoing PWM report plus the tracked position of every channel.
pub struct SpineController {
    packet: [u8; PACKET_LEN],
    positions: [i32; CHANNELS],
    transport: Option<Box<dyn SpineTransport>>,
}

impl SpineController {
    /// Controller with no device; updates do nothing.
    #[must_use]
    pub const fn detached() -> Self {
        Self {
            packet: [0; PACKET_LEN],
            positions: [0; CHANNELS],
            transport: None,
        }
    }

    /// Controller on `transport`. Sends an all-stop report and reads the
    /// initial positions; on failure warns and stays detached.
    #[must_use]
    pub fn with_transport(mut transport: Box<dyn SpineTransport>) -> Self {
        let mut controller = Self::detached();
        match initial_positions(transport.as_mut(), &controller.packet) {
            Ok(positions) => {
                controller.positions = positions;
                controller.transport = Some(transport);
            }
            Err(err) => {
                warn!(%err, "spine module did not answer; continuing without spine motor control");
            }
        }
        controller
    }

    /// Open the USB device named by `config`, or a detached controller with
    /// a warning if it is not present.
    #[must_use]
    pub fn open(config: &SpineConfig) -> Self {
        match open_transport(config) {
            Ok(transport) => Self::with_transport(transport),
            Err(err) => {
                warn!(%err, "unable to open spine module USB interface; continuing without spine motor control");
                Self::detached()
            }
        }
    }

    /// Whether a device is attached.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Set the PWM duty of `channel` to `value` in `[-1, 1]`.
    ///
    /// # Errors
    ///
    /// [`SpineError::ChannelOutOfRange`] unless `channel < 32`.
    pub fn set_motor_pwm(&mut self, channel: usize, value: f64) -> Result<(), SpineError> {
        check_channel(channel)?;
        let [hi, lo] = encode_pwm(value);
        self.packet[2 * channel] = hi;
        self.packet[2 * channel + 1] = lo;
        Ok(())
    }

    /// Tracked position of `channel`.
    ///
    /// # Errors
    ///
    /// [`SpineError::ChannelOutOfRange`] unless `channel < 32`.
    pub fn motor_position(&self, channel: usize) -> Result<i32, SpineError> {
        check_channel(channel)?;
        Ok(self.positions[channel])
    }

    /// The report sent on the next update.
    #[must_use]
    pub const fn packet(&self) -> &[u8; PACKET_LEN] {
        &self.packet
    }

    /// One duplex transfer. An I/O failure detaches the device with a
    /// warning.
    pub fn update(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        let reply = transport.write(&self.packet).and_then(|()| transport.read());
        match reply {
            Ok(reply) => {
                for (i, pos) in self.positions.iter_mut().enumerate() {
                    *pos = track_position(*pos, reply[2 * i]);
                }
            }
            Err(err) => {
                warn!(%err, "spine module transfer failed; continuing without spine motor control");
                self.transport = None;
            }
        }
    }
}

impl Default for SpineController {
    fn default() -> Self {
        Self::detached()
    }
}

impl std::fmt::Debug for SpineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpineController")
            .field("connected", &self.is_connected())
            .field("positions", &self.positions)
            .finish_non_exhaustive()
    }
}

fn initial_positions(
    transport: &mut dyn SpineTransport,
    packet: &[u8; PACKET_LEN],
) -> Result<[i32; CHANNELS], DeviceError> {
    transport.write(packet)?;
    // The reply to the first report predates it; positions come from the next.
    transport.read()?;
    let reply = transport.read()?;
    let mut positions = [0; CHANNELS];
    for (i, pos) in positions.iter_mut().enumerate() {
        *pos = i32::from(reply[2 * i]);
    }
    debug!(?positions, "spine module connected");
    Ok(positions)
}

#[cfg(target_os = "linux")]
fn open_transport(config: &SpineConfig) -> Result<Box<dyn SpineTransport>, DeviceError> {
    let transport = crate::hidraw::HidrawTransport::open(config.vendor_id, config.product_id)?;
    Ok(Box::new(transport))
}

#[cfg(not(target_os = "linux"))]
fn open_transport(config: &SpineConfig) -> Result<Box<dyn SpineTransport>, DeviceError> {
    Err(DeviceError::NotFound(format!(
        "USB HID {:04x}:{:04x} (hidraw is Linux only)",
        config.vendor_id, config.product_id
    )))
}

// ---------------------------------------------------------------------------
// SpineMotor / SpineModule
// ---------------------------------------------------------------------------

/// One motor channel with a zero offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpineMotor {
    channel: usize,
    offset: i32,
}

impl SpineMotor {
    /// Motor on `channel`, zeroed at the controller's current position.
    ///
    /// # Errors
    ///
    /// [`SpineError::ChannelOutOfRange`] unless `channel < 32`.
    pub fn new(controller: &SpineController, channel: usize) -> Result<Self, SpineError> {
        let offset = controller.motor_position(channel)?;
        Ok(Self { channel, offset })
    }

    /// PWM channel.
    #[must_use]
    pub const fn channel(&self) -> usize {
        self.channel
    }

    /// Position relative to the last zero.
    #[must_use]
    pub fn position(&self, controller: &SpineController) -> i32 {
        controller.positions[self.channel] - self.offset
    }

    /// Set the normalized effort.
    pub fn set_effort(&self, controller: &mut SpineController, value: f64) {
        let [hi, lo] = encode_pwm(value);
        controller.packet[2 * self.channel] = hi;
        controller.packet[2 * self.channel + 1] = lo;
    }

    /// Make the current position the new zero.
    pub fn zero(&mut self, controller: &SpineController) {
        self.offset = controller.positions[self.channel];
    }
}

/// Three-motor spine module with per-motor position controllers.
#[derive(Debug)]
pub struct SpineModule {
    controller: SpineController,
    motors: [SpineMotor; 3],
    pids: [PidController; 3],
}

impl SpineModule {
    /// Module on `controller` with motors on `config.channels`.
    ///
    /// # Errors
    ///
    /// [`SpineError::ChannelOutOfRange`] for an invalid channel.
    pub fn new(controller: SpineController, config: &SpineConfig) -> Result<Self, SpineError> {
        let [a, b, c] = config.channels;
        let motors = [
            SpineMotor::new(&controller, a)?,
            SpineMotor::new(&controller, b)?,
            SpineMotor::new(&controller, c)?,
        ];
        let pid = PidController::new(config.pid);
        Ok(Self {
            controller,
            motors,
            pids: [pid.clone(), pid.clone(), pid],
        })
    }

    /// Detached module with the default channels.
    #[must_use]
    pub fn detached() -> Self {
        let controller = SpineController::detached();
        let motors = SpineConfig::default()
            .channels
            .map(|channel| SpineMotor { channel, offset: 0 });
        Self {
            controller,
            motors,
            pids: std::array::from_fn(|_| PidController::default()),
        }
    }

    /// Underlying controller.
    #[must_use]
    pub const fn controller(&self) -> &SpineController {
        &self.controller
    }

    /// Set one effort per motor.
    ///
    /// # Errors
    ///
    /// [`SpineError::EffortLength`] unless `effort.len() == 3`.
    pub fn run_motors(&mut self, effort: &[f64]) -> Result<(), SpineError> {
        if effort.len() != self.motors.len() {
            return Err(SpineError::EffortLength {
                expected: self.motors.len(),
                got: effort.len(),
            });
        }
        for (motor, &value) in self.motors.iter().zip(effort) {
            motor.set_effort(&mut self.controller, value);
        }
        Ok(())
    }

    /// Set the same effort on every motor.
    pub fn run_uniform(&mut self, effort: f64) {
        for motor in &self.motors {
            motor.set_effort(&mut self.controller, effort);
        }
    }

    /// Zero effort on every motor.
    pub fn stop(&mut self) {
        self.run_uniform(0.0);
    }

    /// Re-zero every motor at its current position.
    pub fn zero_all(&mut self) {
        for motor in &mut self.motors {
            motor.zero(&self.controller);
        }
    }

    /// Positions relative to the last zero.
    #[must_use]
    pub fn motor_positions(&self) -> [i32; 3] {
        self.motors.map(|motor| motor.position(&self.controller))
    }

    /// Drive each motor toward `targets` with feed-forward `velocity`.
    pub fn run_pid(&mut self, targets: [f64; 3], velocity: f64) {
        for ((motor, pid), target) in self.motors.iter().zip(&mut self.pids).zip(targets) {
            let effort = pid.compute(target, f64::from(motor.position(&self.controller)), velocity);
            motor.set_effort(&mut self.controller, effort);
        }
    }

    /// One transfer with the module.
    pub fn update(&mut self) {
        self.controller.update();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Transport that replays scripted replies and records sent reports.
    #[derive(Clone, Default)]
    struct ScriptedTransport {
        replies: Arc<Mutex<VecDeque<[u8; PACKET_LEN]>>>,
        sent: Arc<Mutex<Vec<[u8; PACKET_LEN]>>>,
    }

    impl ScriptedTransport {
        fn push(&self, reply: [u8; PACKET_LEN]) {
            self.replies.lock().unwrap().push_back(reply);
        }
    }

    impl SpineTransport for ScriptedTransport {
        fn write(&mut self, packet: &[u8; PACKET_LEN]) -> Result<(), DeviceError> {
            self.sent.lock().unwrap().push(*packet);
            Ok(())
        }

        fn read(&mut self) -> Result<[u8; PACKET_LEN], DeviceError> {
            self.replies.lock().unwrap().pop_front().ok_or(DeviceError::Disconnected)
        }
    }

    fn reply_with(channel: usize, count: u8) -> [u8; PACKET_LEN] {
        let mut reply = [0; PACKET_LEN];
        reply[2 * channel] = count;
        reply
    }

    fn connected(initial: [u8; PACKET_LEN]) -> (SpineController, ScriptedTransport) {
        let transport = ScriptedTransport::default();
        transport.push([0xAA; PACKET_LEN]);
        transport.push(initial);
        let controller = SpineController::with_transport(Box::new(transport.clone()));
        (controller, transport)
    }

    #[test]
    fn pwm_encoding() {
        assert_eq!(encode_pwm(0.0), [0x00, 0x00]);
        assert_eq!(encode_pwm(1.0), [0x07, 0xFF]);
        assert_eq!(encode_pwm(0.5), [0x04, 0x00]);
        // -1024 = 0x...FC00
        assert_eq!(encode_pwm(-0.5), [0x0C, 0x00]);
        assert_eq!(encode_pwm(-5.0), encode_pwm(-1.0));
        assert_eq!(encode_pwm(-1.0), [0x08, 0x01]);
    }

    #[test]
    fn tracking_is_slew_limited_and_wraps() {
        assert_eq!(track_position(10, 14), 14);
        assert_eq!(track_position(10, 100), 26);
        assert_eq!(track_position(10, 0), 0);
        // 250 → 4 crosses the wrap: +10 counts.
        assert_eq!(track_position(250, 4), 260);
        // 260 & 0xFF = 4 → 250: −10 counts.
        assert_eq!(track_position(260, 250), 250);
        assert_eq!(track_position(-3, 250), -6);
    }

    #[test]
    fn set_motor_pwm_checks_channel() {
        let mut controller = SpineController::detached();
        controller.set_motor_pwm(31, 1.0).unwrap();
        assert_eq!(&controller.packet()[62..], &[0x07, 0xFF]);
        assert_eq!(controller.set_motor_pwm(32, 0.0), Err(SpineError::ChannelOutOfRange(32)));
        assert!(controller.motor_position(40).is_err());
    }

    #[test]
    fn initial_positions_come_from_second_read() {
        let (controller, transport) = connected(reply_with(5, 200));
        assert!(controller.is_connected());
        assert_eq!(controller.motor_position(5).unwrap(), 200);
        assert_eq!(controller.motor_position(4).unwrap(), 0);
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn update_tracks_and_stores_positions() {
        let (mut controller, transport) = connected(reply_with(5, 250));
        transport.push(reply_with(5, 4));
        transport.push(reply_with(5, 60));
        controller.update();
        assert_eq!(controller.motor_position(5).unwrap(), 260);
        controller.update();
        assert_eq!(controller.motor_position(5).unwrap(), 276);
    }

    #[test]
    fn failed_transfer_detaches() {
        let (mut controller, transport) = connected([0; PACKET_LEN]);
        controller.update();
        assert!(!controller.is_connected());
        controller.update();
        assert_eq!(transport.sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn missing_device_starts_detached() {
        let transport = ScriptedTransport::default();
        let controller = SpineController::with_transport(Box::new(transport));
        assert!(!controller.is_connected());
    }

    #[test]
    fn module_runs_and_zeroes_motors() {
        let mut initial = [0; PACKET_LEN];
        initial[10] = 100;
        initial[14] = 20;
        initial[12] = 30;
        let (controller, transport) = connected(initial);
        let mut module = SpineModule::new(controller, &SpineConfig::default()).unwrap();
        assert_eq!(module.motor_positions(), [0, 0, 0]);

        module.run_motors(&[0.5, 0.0, -0.5]).unwrap();
        assert_eq!(&module.controller().packet()[10..12], &[0x04, 0x00]);
        assert_eq!(&module.controller().packet()[12..14], &[0x0C, 0x00]);

        let mut reply = initial;
        reply[10] = 110;
        transport.push(reply);
        module.update();
        assert_eq!(module.motor_positions(), [10, 0, 0]);
        module.zero_all();
        assert_eq!(module.motor_positions(), [0, 0, 0]);

        assert_eq!(
            module.run_motors(&[0.0; 2]),
            Err(SpineError::EffortLength { expected: 3, got: 2 })
        );

        module.stop();
        assert!(module.controller().packet().iter().all(|&b| b == 0));
    }

    #[test]
    fn run_pid_sets_effort_toward_target() {
        let mut module = SpineModule::detached();
        module.run_pid([1000.0, 0.0, -1000.0], 0.0);
        let packet = module.controller().packet();
        // channel 5 positive, channel 7 zero, channel 6 negative (high nibble ≥ 8)
        assert!(packet[10] < 0x08 && (packet[10], packet[11]) != (0, 0));
        assert_eq!(&packet[14..16], &[0, 0]);
        assert!(packet[12] >= 0x08);
    }

    #[test]
    fn config_validation() {
        let config = SpineConfig {
            channels: [5, 7, 32],
            ..SpineConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(SpineConfig::default().validate().is_ok());
    }
}
