//! Control-loop time sources and the update-rate estimator.
//!
//! The locomotion loop reads "now" from a [`LoopClock`] once per tick. On the
//! robot that is the wall clock; in simulation playback it is a
//! [`SteppedClock`] that advances by a fixed timestep, tracked as an integer
//! nanosecond count so long runs do not accumulate floating-point drift.

use std::fmt;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// LoopClock
// ---------------------------------------------------------------------------

/// Source of the current loop time in seconds.
pub trait LoopClock {
    /// Current time in seconds since the clock started.
    fn now(&mut self) -> f64;
}

// ---------------------------------------------------------------------------
// WallClock
// ---------------------------------------------------------------------------

/// Monotonic wall clock anchored at construction.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    start: Instant,
}

impl WallClock {
    /// Start a wall clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopClock for WallClock {
    fn now(&mut self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

// ---------------------------------------------------------------------------
// SteppedClock
// ---------------------------------------------------------------------------

/// Fixed-timestep clock for simulation playback.
///
/// Each call to [`LoopClock::now`] returns the current time and then advances
/// by one timestep, so the first tick observes `t = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteppedClock {
    nanos: u64,
    step_nanos: u64,
}

impl SteppedClock {
    /// Create a clock that advances by `step` per tick.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(step: Duration) -> Self {
        Self {
            nanos: 0,
            step_nanos: step.as_nanos() as u64,
        }
    }

    /// Create a clock from a timestep in seconds.
    #[must_use]
    pub fn from_secs(step_secs: f64) -> Self {
        Self::new(Duration::from_secs_f64(step_secs.max(0.0)))
    }

    /// Raw nanosecond count.
    #[must_use]
    pub const fn nanos(&self) -> u64 {
        self.nanos
    }

    /// Elapsed seconds as `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn secs_f64(&self) -> f64 {
        self.nanos as f64 / 1_000_000_000.0
    }

    /// Timestep in seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn step_secs(&self) -> f64 {
        self.step_nanos as f64 / 1_000_000_000.0
    }

    /// Reset the clock to zero.
    pub const fn reset(&mut self) {
        self.nanos = 0;
    }
}

impl LoopClock for SteppedClock {
    fn now(&mut self) -> f64 {
        let now = self.secs_f64();
        self.nanos = self.nanos.saturating_add(self.step_nanos);
        now
    }
}

impl fmt::Display for SteppedClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_secs = self.nanos / 1_000_000_000;
        let millis = (self.nanos % 1_000_000_000) / 1_000_000;
        write!(f, "{total_secs}.{millis:03}s")
    }
}

// ---------------------------------------------------------------------------
// RateEstimator
// ---------------------------------------------------------------------------

/// Exponentially smoothed loop period and update rate.
///
/// Diagnostics only: nothing in the control path reads these values.
/// The period tracks upward spikes immediately and decays slowly:
/// `period ← max(dt, 0.99·period + 0.01·dt)`, `rate ← 0.99·rate + 0.01/period`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateEstimator {
    period: f64,
    rate: f64,
}

impl RateEstimator {
    /// Smoothing weight applied to the previous estimate.
    pub const DECAY: f64 = 0.99;

    /// Floor on the period when deriving the rate.
    const MIN_PERIOD: f64 = 1e-6;

    /// Create an estimator with zero period and rate.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            period: 0.0,
            rate: 0.0,
        }
    }

    /// Fold one observed tick interval `dt` (seconds) into the estimate.
    pub fn observe(&mut self, dt: f64) {
        let blend = 1.0 - Self::DECAY;
        self.period = dt.max(Self::DECAY.mul_add(self.period, blend * dt));
        self.rate = Self::DECAY.mul_add(self.rate, blend / self.period.max(Self::MIN_PERIOD));
    }

    /// Smoothed loop period in seconds.
    #[must_use]
    pub const fn period(&self) -> f64 {
        self.period
    }

    /// Smoothed update rate in Hz.
    #[must_use]
    pub const fn rate(&self) -> f64 {
        self.rate
    }
}
