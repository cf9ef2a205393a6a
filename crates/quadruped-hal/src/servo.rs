//! Hobby-servo joint outputs.
//!
//! A [`JointServo`] remembers the commanded joint angle in degrees, adds its
//! calibration offset, clamps the result to the servo's `[0°, 180°]` travel
//! and forwards it to a physical [`ServoOutput`]. The raw angle, in radians,
//! also goes to an optional [`SimulatedJoint`] for simulation playback.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use quadruped_core::ServoError;

/// Mechanical travel of a hobby servo, in degrees.
pub const SERVO_RANGE_DEG: (f64, f64) = (0.0, 180.0);

/// A physical PWM channel accepting an angle in degrees.
pub trait ServoOutput: Send {
    /// Command the servo horn to `degrees`, already clamped to its travel.
    ///
    /// # Errors
    ///
    /// [`ServoError`] if the driver rejects the write.
    fn write_angle(&mut self, degrees: f64) -> Result<(), ServoError>;
}

/// A simulated joint accepting a position in radians.
pub trait SimulatedJoint: Send {
    /// Set the joint position target.
    fn set_position(&mut self, radians: f64);
}

/// Source of physical servo channels.
pub trait ServoBus {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Output for PWM `channel`.
    fn open_channel(&mut self, channel: u8) -> Box<dyn ServoOutput>;
}

// ---------------------------------------------------------------------------
// JointServo
// ---------------------------------------------------------------------------

/// One joint's servo with calibration offset.
pub struct JointServo {
    offset: f64,
    angle: f64,
    physical: Option<Box<dyn ServoOutput>>,
    simulated: Option<Box<dyn SimulatedJoint>>,
}

impl JointServo {
    /// Servo with no outputs attached.
    #[must_use]
    pub const fn new(offset: f64) -> Self {
        Self {
            offset,
            angle: 0.0,
            physical: None,
            simulated: None,
        }
    }

    /// Attach a physical output.
    #[must_use]
    pub fn with_physical(mut self, output: Box<dyn ServoOutput>) -> Self {
        self.physical = Some(output);
        self
    }

    /// Attach a simulated joint.
    #[must_use]
    pub fn with_simulated(mut self, joint: Box<dyn SimulatedJoint>) -> Self {
        self.simulated = Some(joint);
        self
    }

    /// Calibration offset in degrees.
    #[must_use]
    pub const fn offset(&self) -> f64 {
        self.offset
    }

    /// Last commanded joint angle in degrees.
    #[must_use]
    pub const fn angle(&self) -> f64 {
        self.angle
    }

    /// The angle actually sent to the servo horn for joint angle `degrees`.
    #[must_use]
    pub fn output_angle(&self, degrees: f64) -> f64 {
        (degrees + self.offset).clamp(SERVO_RANGE_DEG.0, SERVO_RANGE_DEG.1)
    }

    /// Command the joint to `degrees`.
    ///
    /// # Errors
    ///
    /// [`ServoError::NonFinite`] for NaN or infinite angles (the stored
    /// angle is left unchanged), or the physical output's error.
    pub fn set_angle(&mut self, degrees: f64) -> Result<(), ServoError> {
        if !degrees.is_finite() {
            return Err(ServoError::NonFinite(degrees));
        }
        self.angle = degrees;
        let horn = self.output_angle(degrees);
        if let Some(output) = self.physical.as_mut() {
            output.write_angle(horn)?;
        }
        if let Some(joint) = self.simulated.as_mut() {
            joint.set_position(degrees.to_radians());
        }
        Ok(())
    }
}

impl std::fmt::Debug for JointServo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JointServo")
            .field("offset", &self.offset)
            .field("angle", &self.angle)
            .field("physical", &self.physical.is_some())
            .field("simulated", &self.simulated.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Buses
// ---------------------------------------------------------------------------

/// Bus used when no servo driver is available. Warns once, then hands out
/// outputs that drop every write.
#[derive(Debug, Default)]
pub struct NullServoBus {
    warned: AtomicBool,
}

impl NullServoBus {
    /// New null bus.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            warned: AtomicBool::new(false),
        }
    }

    /// Null bus that never warns, for callers that already reported the
    /// missing driver.
    #[must_use]
    pub const fn quiet() -> Self {
        Self {
            warned: AtomicBool::new(true),
        }
    }
}

impl ServoBus for NullServoBus {
    fn name(&self) -> &'static str {
        "null"
    }

    fn open_channel(&mut self, channel: u8) -> Box<dyn ServoOutput> {
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!(channel, "servo driver unavailable; continuing without servo motors");
        }
        Box::new(NullOutput)
    }
}

struct NullOutput;

impl ServoOutput for NullOutput {
    fn write_angle(&mut self, _degrees: f64) -> Result<(), ServoError> {
        Ok(())
    }
}

/// Bus that records the last angle written to each channel. Backs the
/// simulation command and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryServoBus {
    channels: Arc<Mutex<BTreeMap<u8, f64>>>,
}

impl MemoryServoBus {
    /// Empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last angle written to `channel`, if any.
    #[must_use]
    pub fn angle(&self, channel: u8) -> Option<f64> {
        self.lock().get(&channel).copied()
    }

    /// Every channel's last angle.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<u8, f64> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<u8, f64>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ServoBus for MemoryServoBus {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open_channel(&mut self, channel: u8) -> Box<dyn ServoOutput> {
        Box::new(MemoryOutput {
            channel,
            channels: Arc::clone(&self.channels),
        })
    }
}

struct MemoryOutput {
    channel: u8,
    channels: Arc<Mutex<BTreeMap<u8, f64>>>,
}

impl ServoOutput for MemoryOutput {
    fn write_angle(&mut self, degrees: f64) -> Result<(), ServoError> {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.channel, degrees);
        Ok(())
    }
}

/// Simulated joint that stores its position in a shared cell.
#[derive(Debug, Clone, Default)]
pub struct SharedJointPosition {
    position: Arc<Mutex<f64>>,
}

impl SharedJointPosition {
    /// New cell at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last position in radians.
    #[must_use]
    pub fn get(&self) -> f64 {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SimulatedJoint for SharedJointPosition {
    fn set_position(&mut self, radians: f64) {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner) = radians;
    }
}
