//! PCA9685 16-channel PWM driver for the leg servos.
//!
//! The chip divides its 25 MHz oscillator into a 4096-count period. A horn
//! angle in `[0°, 180°]` maps linearly onto a pulse between
//! `min_pulse_us` and `max_pulse_us`; each channel switches on at count 0
//! and off at the pulse's count.
//!
//! The driver is generic over [`embedded_hal::i2c::I2c`]. On Linux,
//! [`Pca9685ServoBus::open`] talks to an `i2c-dev` adapter node.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use embedded_hal::i2c::I2c;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use quadruped_core::config::require_positive;
use quadruped_core::{ConfigError, DeviceError, ServoError, Validate};

use crate::servo::{NullServoBus, SERVO_RANGE_DEG, ServoBus, ServoOutput};

const OSCILLATOR_HZ: f64 = 25_000_000.0;
/// Counts per PWM period.
pub const PWM_STEPS: f64 = 4096.0;
/// Output channels on one chip.
pub const PWM_CHANNELS: u8 = 16;

const MODE1: u8 = 0x00;
const LED0_ON_L: u8 = 0x06;
const PRESCALE: u8 = 0xFE;

const MODE1_RESTART: u8 = 0x80;
const MODE1_AUTO_INCREMENT: u8 = 0x20;
const MODE1_SLEEP: u8 = 0x10;

/// Oscillator start-up time after leaving sleep.
const WAKE_DELAY: Duration = Duration::from_micros(500);

// ---------------------------------------------------------------------------
// ServoDriverConfig
// ---------------------------------------------------------------------------

/// Bus location, PWM frequency and pulse range of the servo driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoDriverConfig {
    /// `i2c-dev` adapter node.
    pub i2c_bus: PathBuf,
    /// 7-bit chip address.
    pub address: u8,
    /// PWM frequency in Hz.
    pub frequency: f64,
    /// Pulse width at 0°, in microseconds.
    pub min_pulse_us: f64,
    /// Pulse width at 180°, in microseconds.
    pub max_pulse_us: f64,
}

impl Default for ServoDriverConfig {
    fn default() -> Self {
        Self {
            i2c_bus: PathBuf::from("/dev/i2c-1"),
            address: 0x40,
            frequency: 333.0,
            min_pulse_us: 500.0,
            max_pulse_us: 2500.0,
        }
    }
}

impl Validate for ServoDriverConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.address > 0x7F {
            return Err(ConfigError::invalid(
                "servo.address",
                format!("{:#04x} (must be a 7-bit address)", self.address),
            ));
        }
        // Prescale register range [3, 255].
        if !(24.0..=1526.0).contains(&self.frequency) {
            return Err(ConfigError::invalid(
                "servo.frequency",
                format!("{} (must be in [24, 1526] Hz)", self.frequency),
            ));
        }
        require_positive("servo.min_pulse_us", self.min_pulse_us)?;
        if self.max_pulse_us <= self.min_pulse_us {
            return Err(ConfigError::invalid(
                "servo.max_pulse_us",
                format!("{} (must exceed min_pulse_us)", self.max_pulse_us),
            ));
        }
        let period_us = 1e6 / self.frequency;
        if self.max_pulse_us >= period_us {
            return Err(ConfigError::invalid(
                "servo.max_pulse_us",
                format!("{} (must be shorter than the {period_us:.0} us period)", self.max_pulse_us),
            ));
        }
        Ok(())
    }
}

impl ServoDriverConfig {
    /// Prescale register value for `frequency`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn prescale(&self) -> u8 {
        ((OSCILLATOR_HZ / (PWM_STEPS * self.frequency)).round() - 1.0).clamp(3.0, 255.0) as u8
    }

    /// Pulse width in microseconds for a horn angle, clamped to the servo
    /// travel.
    #[must_use]
    pub fn pulse_us(&self, degrees: f64) -> f64 {
        let (lo, hi) = SERVO_RANGE_DEG;
        let fraction = ((degrees - lo) / (hi - lo)).clamp(0.0, 1.0);
        fraction.mul_add(self.max_pulse_us - self.min_pulse_us, self.min_pulse_us)
    }

    /// OFF count within the PWM period for a horn angle.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn pulse_counts(&self, degrees: f64) -> u16 {
        let counts = self.pulse_us(degrees) * 1e-6 * self.frequency * PWM_STEPS;
        counts.round().clamp(0.0, PWM_STEPS - 1.0) as u16
    }
}

// ---------------------------------------------------------------------------
// Pca9685
// ---------------------------------------------------------------------------

/// Register access to one chip.
#[derive(Debug)]
pub struct Pca9685<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Pca9685<I2C> {
    /// Program the prescale for `config.frequency`, then wake the chip with
    /// register auto-increment.
    ///
    /// # Errors
    ///
    /// The first failed bus write.
    pub fn new(i2c: I2C, config: &ServoDriverConfig) -> Result<Self, I2C::Error> {
        let mut chip = Self {
            i2c,
            address: config.address,
        };
        // Prescale is only writable while asleep.
        chip.write_register(MODE1, MODE1_SLEEP)?;
        chip.write_register(PRESCALE, config.prescale())?;
        chip.write_register(MODE1, MODE1_AUTO_INCREMENT)?;
        std::thread::sleep(WAKE_DELAY);
        chip.write_register(MODE1, MODE1_RESTART | MODE1_AUTO_INCREMENT)?;
        Ok(chip)
    }

    /// Switch `channel` on at count 0 and off at `off`.
    ///
    /// # Errors
    ///
    /// The bus write error.
    pub fn set_pulse(&mut self, channel: u8, off: u16) -> Result<(), I2C::Error> {
        let [lo, hi] = off.to_le_bytes();
        self.i2c
            .write(self.address, &[LED0_ON_L + 4 * channel, 0, 0, lo, hi & 0x0F])
    }

    /// Give back the bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[register, value])
    }
}

// ---------------------------------------------------------------------------
// Pca9685ServoBus
// ---------------------------------------------------------------------------

/// Servo bus whose channels are the chip's PWM outputs.
pub struct Pca9685ServoBus<I2C> {
    chip: Arc<Mutex<Pca9685<I2C>>>,
    config: ServoDriverConfig,
}

impl<I2C: I2c> Pca9685ServoBus<I2C> {
    /// Initialize the chip on `i2c`.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NotFound`] if the chip does not acknowledge.
    pub fn new(i2c: I2C, config: &ServoDriverConfig) -> Result<Self, DeviceError> {
        let chip = Pca9685::new(i2c, config).map_err(|err| {
            DeviceError::NotFound(format!("PCA9685 at {:#04x}: {err:?}", config.address))
        })?;
        Ok(Self {
            chip: Arc::new(Mutex::new(chip)),
            config: config.clone(),
        })
    }
}

#[cfg(target_os = "linux")]
impl Pca9685ServoBus<linux_embedded_hal::I2cdev> {
    /// Open the adapter named by `config` and initialize the chip.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NotFound`] if the node cannot be opened or the chip
    /// does not acknowledge.
    pub fn open(config: &ServoDriverConfig) -> Result<Self, DeviceError> {
        let i2c = linux_embedded_hal::I2cdev::new(&config.i2c_bus)
            .map_err(|err| DeviceError::NotFound(format!("{}: {err:?}", config.i2c_bus.display())))?;
        Self::new(i2c, config)
    }
}

impl<I2C: I2c + Send + 'static> ServoBus for Pca9685ServoBus<I2C> {
    fn name(&self) -> &'static str {
        "pca9685"
    }

    fn open_channel(&mut self, channel: u8) -> Box<dyn ServoOutput> {
        Box::new(Pca9685Output {
            channel,
            chip: Arc::clone(&self.chip),
            config: self.config.clone(),
        })
    }
}

struct Pca9685Output<I2C> {
    channel: u8,
    chip: Arc<Mutex<Pca9685<I2C>>>,
    config: ServoDriverConfig,
}

impl<I2C: I2c + Send> ServoOutput for Pca9685Output<I2C> {
    fn write_angle(&mut self, degrees: f64) -> Result<(), ServoError> {
        if self.channel >= PWM_CHANNELS {
            return Err(ServoError::Bus(format!("PWM channel {} out of range", self.channel)));
        }
        let counts = self.config.pulse_counts(degrees);
        self.chip
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_pulse(self.channel, counts)
            .map_err(|err| ServoError::Bus(format!("channel {}: {err:?}", self.channel)))
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// The PCA9685 bus named by `config`, or a null bus with one warning if the
/// driver cannot be opened.
#[must_use]
pub fn open_servo_bus(config: &ServoDriverConfig) -> Box<dyn ServoBus> {
    match open_driver(config) {
        Ok(bus) => {
            info!(
                bus = %config.i2c_bus.display(),
                address = config.address,
                frequency = config.frequency,
                "servo driver ready"
            );
            bus
        }
        Err(err) => {
            warn!(%err, "unable to open servo driver; continuing without servo motors");
            Box::new(NullServoBus::quiet())
        }
    }
}

#[cfg(target_os = "linux")]
fn open_driver(config: &ServoDriverConfig) -> Result<Box<dyn ServoBus>, DeviceError> {
    Ok(Box::new(Pca9685ServoBus::open(config)?))
}

#[cfg(not(target_os = "linux"))]
fn open_driver(config: &ServoDriverConfig) -> Result<Box<dyn ServoBus>, DeviceError> {
    Err(DeviceError::NotFound(format!(
        "{} (I2C servo driver needs Linux i2c-dev)",
        config.i2c_bus.display()
    )))
}
