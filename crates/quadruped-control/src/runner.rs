//! The control loop.

use std::thread;
use std::time::Duration;

use tracing::{error, info};

use quadruped_core::{LoopClock, QuadrupedError};
use quadruped_teleop::InputDevice;

use crate::controller::{LocomotionController, TickOutcome};

/// Why the loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Select on the gamepad.
    Operator,
    /// The caller's termination check fired (simulation end, Ctrl-C).
    Terminated,
}

/// Summary of a finished run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub reason: StopReason,
    /// Loop time of the last tick, in seconds.
    pub elapsed: f64,
}

/// Tick `controller` until the operator stops it or `terminated(now)`
/// returns true, then stop the spine and home the legs.
///
/// One tick: read the clock, poll `device`, run the controller tick.
///
/// # Errors
///
/// The first tick error, after a best-effort shutdown, or the shutdown
/// error itself.
pub fn run_loop(
    controller: &mut LocomotionController,
    device: &mut dyn InputDevice,
    clock: &mut dyn LoopClock,
    mut terminated: impl FnMut(f64) -> bool,
) -> Result<RunSummary, QuadrupedError> {
    info!(input = device.name(), "press START to continue");
    let mut ticks = 0;
    let (reason, elapsed) = loop {
        let now = clock.now();
        let edges = device.poll(now);
        let outcome = match controller.tick(now, device.state(), &edges) {
            Ok(outcome) => outcome,
            Err(err) => {
                if let Err(shutdown) = controller.shutdown() {
                    error!(error = %shutdown, "shutdown after failed tick also failed");
                }
                return Err(err);
            }
        };
        ticks += 1;
        if outcome == TickOutcome::Stop {
            info!("run complete (stopped by gamepad)");
            break (StopReason::Operator, now);
        }
        if terminated(now) {
            info!("run complete (terminated)");
            break (StopReason::Terminated, now);
        }
    };
    controller.shutdown()?;
    Ok(RunSummary {
        ticks,
        reason,
        elapsed,
    })
}

/// Clock that sleeps so successive readings are at least `period` apart.
///
/// Wraps a real-time clock for the hardware loop. When a tick overruns,
/// the schedule restarts from the late reading instead of bursting to
/// catch up.
#[derive(Debug, Clone)]
pub struct PacedClock<C> {
    inner: C,
    period: f64,
    deadline: Option<f64>,
}

impl<C: LoopClock> PacedClock<C> {
    /// Pace `inner` to one reading per `period` seconds.
    pub const fn new(inner: C, period: f64) -> Self {
        Self {
            inner,
            period,
            deadline: None,
        }
    }

    /// Target period in seconds.
    pub const fn period(&self) -> f64 {
        self.period
    }
}

impl<C: LoopClock> LoopClock for PacedClock<C> {
    fn now(&mut self) -> f64 {
        let mut now = self.inner.now();
        if let Some(deadline) = self.deadline {
            if now < deadline {
                thread::sleep(Duration::from_secs_f64(deadline - now));
                now = self.inner.now();
            }
            self.deadline = Some(if now - deadline > self.period {
                now + self.period
            } else {
                deadline + self.period
            });
        } else {
            self.deadline = Some(now + self.period);
        }
        now
    }
}
