//! Quadruped locomotion controller CLI.
//!
//! Provides three modes of operation:
//! - `run`: Drive the robot from a gamepad in real time
//! - `sim`: Replay a scripted gamepad session on a simulated clock and play
//!   the commanded joints back through the dynamics backend
//! - `info`: Print the configuration, gait table and leg geometry

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use quadruped_control::{
    GAIT_ORDER, LegKind, LegPlayback, LocomotionController, PacedClock, Robot, RobotConfig, RunSummary, run_loop,
};
use quadruped_core::config::require_positive;
use quadruped_core::{ChainError, QuadrupedError, SteppedClock, WallClock};
use quadruped_gait::GaitProfile;
use quadruped_hal::{
    MemoryServoBus, SharedJointPosition, SimulatedJoint, SpineController, SpineModule, open_servo_bus,
};
use quadruped_ik::{DynamicsBackend, KinematicDynamics};
use quadruped_teleop::{Button, GamepadState, InputDevice, ScriptedGamepad, idle_device, open_device};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Gamepad-driven locomotion controller for a four-legged walking robot.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Robot configuration (TOML). Defaults to the calibrated robot.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the robot from the gamepad until Select or Ctrl-C.
    Run {
        /// Ignore the gamepad; the robot stays at home.
        #[arg(long)]
        no_gamepad: bool,
    },

    /// Replay a scripted session: stand, then walk forward.
    Sim {
        /// Simulated seconds to run.
        #[arg(short, long, default_value_t = 6.0)]
        duration: f64,

        /// Simulation timestep in seconds.
        #[arg(long, default_value_t = 0.01)]
        dt: f64,

        /// Forward stick deflection while walking, in [-1, 1].
        #[arg(short, long, default_value_t = 1.0, allow_negative_numbers = true)]
        stick: f64,

        /// Seconds between printed samples.
        #[arg(long, default_value_t = 0.25)]
        sample: f64,

        /// Joint speed limit of the played-back servos, in rad/s.
        #[arg(long, default_value_t = 10.0)]
        joint_speed: f64,
    },

    /// Print configuration and leg geometry.
    Info,
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn run_hardware(config: &RobotConfig, no_gamepad: bool, stop: &AtomicBool) -> Result<RunSummary, QuadrupedError> {
    let mut bus = open_servo_bus(&config.servo);
    let spine = SpineModule::new(SpineController::open(&config.spine), &config.spine)?;
    let robot = Robot::assemble(config, bus.as_mut(), spine)?;
    let mut controller = LocomotionController::new(robot);

    let mut device: Box<dyn InputDevice> = if no_gamepad {
        idle_device()
    } else {
        open_device(&config.gamepad)
    };
    let mut clock = PacedClock::new(WallClock::new(), config.control.loop_period);

    let summary = run_loop(&mut controller, device.as_mut(), &mut clock, |_| {
        stop.load(Ordering::Relaxed)
    })?;
    info!("\n{}", controller.robot().report());
    Ok(summary)
}

/// Start pressed at 0.5 s and released at 2 s, then the left stick forward.
fn sim_script(stick: f64) -> ScriptedGamepad {
    let idle = GamepadState {
        connected: true,
        ..GamepadState::default()
    };
    ScriptedGamepad::new()
        .at(0.0, idle.clone())
        .at(0.5, idle.clone().with_button(Button::Start, true))
        .at(2.0, idle.clone())
        .at(
            2.5,
            GamepadState {
                left_y: stick.clamp(-1.0, 1.0),
                ..idle
            },
        )
}

/// Sampled playback: time, then each leg's joint angles and foot position.
type Sample = (f64, Vec<(LegKind, [f64; 3], [f64; 3])>);

struct SimOptions {
    duration: f64,
    dt: f64,
    stick: f64,
    sample: f64,
    joint_speed: f64,
}

fn run_sim(config: &RobotConfig, options: &SimOptions, stop: &AtomicBool) -> Result<RunSummary, QuadrupedError> {
    require_positive("sim.dt", options.dt)?;
    require_positive("sim.duration", options.duration)?;
    require_positive("sim.sample", options.sample)?;
    require_positive("sim.joint_speed", options.joint_speed)?;

    let commanded: BTreeMap<LegKind, [SharedJointPosition; 3]> =
        LegKind::ALL.into_iter().map(|kind| (kind, Default::default())).collect();

    let mut bus = MemoryServoBus::new();
    let robot = Robot::assemble_with(config, &mut bus, SpineModule::detached(), |kind, joint| {
        commanded
            .get(&kind)
            .map(|cells| Box::new(cells[joint].clone()) as Box<dyn SimulatedJoint>)
    })?;
    let mut controller = LocomotionController::new(robot);
    let mut device = sim_script(options.stick);
    let mut clock = SteppedClock::from_secs(options.dt);

    let dynamics = KinematicDynamics::new();
    let mut playback = GAIT_ORDER
        .into_iter()
        .map(|kind| LegPlayback::new(kind, options.joint_speed))
        .collect::<Result<Vec<_>, _>>()?;

    let mut samples: Vec<Sample> = Vec::new();
    let mut failure = None;
    let mut next_sample = 0.0;
    let summary = run_loop(&mut controller, &mut device, &mut clock, |now| {
        let stepped = playback.iter_mut().try_for_each(|leg| {
            let target = commanded
                .get(&leg.kind())
                .map_or([0.0; 3], |cells| cells.each_ref().map(SharedJointPosition::get));
            leg.step(&dynamics, target, options.dt)
        });
        let sampled = stepped.and_then(|()| {
            if now >= next_sample {
                samples.push((now, sample_feet(&playback, &dynamics)?));
                next_sample += options.sample;
            }
            Ok(())
        });
        if let Err(err) = sampled {
            failure = Some(err);
            return true;
        }
        now >= options.duration || stop.load(Ordering::Relaxed)
    })?;
    if let Some(err) = failure {
        return Err(err.into());
    }

    print_samples(&samples);
    Ok(summary)
}

fn sample_feet(
    playback: &[LegPlayback],
    dynamics: &dyn DynamicsBackend,
) -> Result<Vec<(LegKind, [f64; 3], [f64; 3])>, ChainError> {
    playback
        .iter()
        .map(|leg| {
            let [_, _, foot] = leg.linkage(dynamics)?;
            Ok((leg.kind(), leg.angles(), [foot.x, foot.y, foot.z]))
        })
        .collect()
}

/// Print the played-back joint angles and foot tracks.
fn print_samples(samples: &[Sample]) {
    println!("{:>7}  {:<12} {:>26}   {:>26}", "t [s]", "leg", "joint angles [deg]", "foot [in]");
    for (t, legs) in samples {
        for (kind, angles, [x, y, z]) in legs {
            let angles: Vec<String> = angles.iter().map(|a| format!("{a:6.2}°")).collect();
            println!(
                "{t:7.2}  {:<12} [{}]   [{x:7.3}, {y:7.3}, {z:7.3}]",
                kind.label(),
                angles.join(", ")
            );
        }
    }
}

fn print_gait(index: usize, gait: &GaitProfile) {
    println!(
        "  {index}: {:<16} {:<5} {:4.1}/s  step {:.2}-{:.2} in  body {:.2}-{:.2} in  stride {:.1}x{:.1} in",
        gait.name,
        gait.trajectory.to_string(),
        gait.step_frequency,
        gait.min_step_height,
        gait.max_step_height,
        gait.min_body_height,
        gait.max_body_height,
        gait.x_stride,
        gait.y_stride
    );
}

fn run_info(config: &RobotConfig) -> Result<(), QuadrupedError> {
    println!("quadruped v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!(
        "ik: {} iterations, tolerance {} m, damping {}",
        config.ik.max_iterations, config.ik.tolerance, config.ik.damping
    );
    println!(
        "control: stand {} in after {} s, loop {} s, spine gain {}",
        config.control.stand_height,
        config.control.stand_hold,
        config.control.loop_period,
        config.control.spine_gain
    );
    println!(
        "servo: pca9685 {} @ {:#04x}, {} Hz, {}-{} us",
        config.servo.i2c_bus.display(),
        config.servo.address,
        config.servo.frequency,
        config.servo.min_pulse_us,
        config.servo.max_pulse_us
    );
    println!(
        "spine: usb {:04x}:{:04x}, channels {:?}",
        config.spine.vendor_id, config.spine.product_id, config.spine.channels
    );
    println!("gamepad: /dev/input/js{}", config.gamepad.index);

    println!();
    println!("gaits:");
    for (index, gait) in config.gaits.iter().enumerate() {
        print_gait(index, gait);
    }

    let mut bus = MemoryServoBus::new();
    let mut robot = Robot::assemble(config, &mut bus, SpineModule::detached())?;
    robot.stand()?;
    let dynamics = KinematicDynamics::new();

    println!();
    println!("legs (standing, {}):", dynamics.name());
    for leg in robot.legs() {
        let wiring = config.leg(leg.kind());
        let channels = wiring.map(|w| w.servos().map(|s| s.channel));
        let [hip2, knee, foot] = leg.linkage(&dynamics)?;
        println!("  {:<12} channels {:?}", leg.label(), channels.unwrap_or_default());
        println!("    angles {}", leg.format_angles());
        println!("    hip 2  [{:7.3}, {:7.3}, {:7.3}] in", hip2.x, hip2.y, hip2.z);
        println!("    knee   [{:7.3}, {:7.3}, {:7.3}] in", knee.x, knee.y, knee.z);
        println!("    foot   [{:7.3}, {:7.3}, {:7.3}] in", foot.x, foot.y, foot.z);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn load_config(path: Option<&PathBuf>) -> Result<RobotConfig, QuadrupedError> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            Ok(RobotConfig::from_file(path)?)
        }
        None => Ok(RobotConfig::default()),
    }
}

fn install_stop_handler() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    if let Err(err) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
        warn!(%err, "unable to install Ctrl-C handler");
    }
    stop
}

fn report(summary: &RunSummary) {
    info!(
        ticks = summary.ticks,
        reason = ?summary.reason,
        elapsed_s = summary.elapsed,
        "finished"
    );
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = load_config(cli.config.as_ref()).and_then(|config| match cli.command {
        Some(Commands::Run { no_gamepad }) => {
            let stop = install_stop_handler();
            run_hardware(&config, no_gamepad, &stop).map(|s| report(&s))
        }
        Some(Commands::Sim {
            duration,
            dt,
            stick,
            sample,
            joint_speed,
        }) => {
            let options = SimOptions {
                duration,
                dt,
                stick,
                sample,
                joint_speed,
            };
            let stop = install_stop_handler();
            run_sim(&config, &options, &stop).map(|s| report(&s))
        }
        Some(Commands::Info) => run_info(&config),
        None => {
            // Default: drive the robot
            let stop = install_stop_handler();
            run_hardware(&config, false, &stop).map(|s| report(&s))
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "quadruped controller failed");
            ExitCode::FAILURE
        }
    }
}
