//! Joint-space playback of commanded leg motion.
//!
//! Each tick a [`LegPlayback`] asks the dynamics backend to carry its joint
//! state toward the angles the controller just commanded. Joint speed is
//! limited the way a hobby servo's is, so the played-back foot lags
//! commands that jump.

use nalgebra::Vector3;

use quadruped_core::ChainError;
use quadruped_ik::{DynamicsBackend, KinematicChain};

use crate::leg::{LegKind, linkage_points};

/// Simulated joint state of one leg.
#[derive(Debug, Clone)]
pub struct LegPlayback {
    kind: LegKind,
    chain: KinematicChain,
    q: [f64; 3],
    dq: [f64; 3],
    max_speed: f64,
}

impl LegPlayback {
    /// Leg at home, at rest, with joint speed limited to `max_speed` rad/s.
    ///
    /// # Errors
    ///
    /// Propagates chain construction errors.
    pub fn new(kind: LegKind, max_speed: f64) -> Result<Self, ChainError> {
        Ok(Self {
            kind,
            chain: kind.chain()?,
            q: [0.0; 3],
            dq: [0.0; 3],
            max_speed,
        })
    }

    #[must_use]
    pub const fn kind(&self) -> LegKind {
        self.kind
    }

    /// Joint positions in radians.
    #[must_use]
    pub const fn q(&self) -> [f64; 3] {
        self.q
    }

    /// Joint velocities in rad/s.
    #[must_use]
    pub const fn dq(&self) -> [f64; 3] {
        self.dq
    }

    /// Joint positions in degrees.
    #[must_use]
    pub fn angles(&self) -> [f64; 3] {
        self.q.map(f64::to_degrees)
    }

    /// Advance by `dt` toward `target` joint positions in radians. A
    /// non-positive `dt` leaves the state unchanged.
    ///
    /// # Errors
    ///
    /// Argument errors from `dynamics`, or a step result that is not one
    /// value per joint.
    pub fn step(&mut self, dynamics: &dyn DynamicsBackend, target: [f64; 3], dt: f64) -> Result<(), ChainError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Ok(());
        }
        let mut dq = [0.0; 3];
        for ((v, goal), q) in dq.iter_mut().zip(target).zip(self.q) {
            *v = ((goal - q) / dt).clamp(-self.max_speed, self.max_speed);
        }
        let step = dynamics.simulation_step(&self.chain, &self.q, &dq, &[0.0; 3], dt)?;
        self.q = joint_array("q", &step.q)?;
        self.dq = joint_array("dq", &step.dq)?;
        Ok(())
    }

    /// Hip 2, knee and foot positions for the played-back angles, in inches.
    ///
    /// # Errors
    ///
    /// Propagates argument errors from `dynamics`.
    pub fn linkage(&self, dynamics: &dyn DynamicsBackend) -> Result<[Vector3<f64>; 3], ChainError> {
        linkage_points(self.kind, &self.chain, &self.q, dynamics)
    }
}

fn joint_array(field: &'static str, values: &[f64]) -> Result<[f64; 3], ChainError> {
    <[f64; 3]>::try_from(values).map_err(|_| ChainError::ArgumentLength {
        field,
        expected: 3,
        got: values.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leg::Leg;
    use approx::assert_relative_eq;
    use quadruped_hal::JointServo;
    use quadruped_ik::{DlsConfig, JointStep, KinematicDynamics, PlanarLeg, default_backend};

    const DT: f64 = 0.01;

    #[test]
    fn small_command_is_reached_in_one_step() {
        let dynamics = KinematicDynamics::new();
        let mut leg = LegPlayback::new(LegKind::FrontLeft, 10.0).unwrap();
        leg.step(&dynamics, [0.05, -0.02, 0.03], DT).unwrap();
        assert_relative_eq!(leg.q()[0], 0.05, epsilon = 1e-12);
        assert_relative_eq!(leg.q()[1], -0.02, epsilon = 1e-12);
        assert_relative_eq!(leg.dq()[2], 3.0, epsilon = 1e-9);
    }

    #[test]
    fn large_command_is_speed_limited() {
        let dynamics = KinematicDynamics::new();
        let mut leg = LegPlayback::new(LegKind::BackRight, 10.0).unwrap();
        leg.step(&dynamics, [0.0, 0.0, 1.0], DT).unwrap();
        assert_relative_eq!(leg.q()[2], 0.1, epsilon = 1e-12);
        assert_relative_eq!(leg.dq()[2], 10.0);

        for _ in 0..9 {
            leg.step(&dynamics, [0.0, 0.0, 1.0], DT).unwrap();
        }
        assert_relative_eq!(leg.q()[2], 1.0, epsilon = 1e-9);
        leg.step(&dynamics, [0.0, 0.0, 1.0], DT).unwrap();
        assert_relative_eq!(leg.dq()[2], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn non_positive_dt_is_ignored() {
        let dynamics = KinematicDynamics::new();
        let mut leg = LegPlayback::new(LegKind::FrontRight, 10.0).unwrap();
        leg.step(&dynamics, [0.5; 3], 0.0).unwrap();
        leg.step(&dynamics, [0.5; 3], f64::NAN).unwrap();
        assert_eq!(leg.q(), [0.0; 3]);
    }

    #[test]
    fn settled_playback_matches_commanded_leg() {
        let dynamics = KinematicDynamics::new();
        let servos = std::array::from_fn(|_| JointServo::new(0.0));
        let mut commanded =
            Leg::new(LegKind::BackLeft, servos, default_backend(DlsConfig::default()), PlanarLeg::default()).unwrap();
        commanded.set_pose_2d(0.5, -7.0).unwrap();

        let mut played = LegPlayback::new(LegKind::BackLeft, 10.0).unwrap();
        for _ in 0..200 {
            played.step(&dynamics, commanded.joint_radians(), DT).unwrap();
        }
        for (a, b) in played.angles().iter().zip(commanded.joint_angles()) {
            assert_relative_eq!(*a, b, epsilon = 1e-6);
        }
        let [_, _, foot] = played.linkage(&dynamics).unwrap();
        assert_relative_eq!(foot, commanded.foot_position().unwrap(), epsilon = 1e-6);
    }

    /// Backend returning a truncated joint vector.
    struct Truncating;

    impl DynamicsBackend for Truncating {
        fn name(&self) -> &'static str {
            "truncating"
        }

        fn joint_positions(
            &self,
            chain: &KinematicChain,
            q: &[f64],
            home_points: &[Vector3<f64>],
        ) -> Result<Vec<Vector3<f64>>, ChainError> {
            KinematicDynamics::new().joint_positions(chain, q, home_points)
        }

        fn simulation_step(
            &self,
            _chain: &KinematicChain,
            q: &[f64],
            dq: &[f64],
            _effort: &[f64],
            _dt: f64,
        ) -> Result<JointStep, ChainError> {
            Ok(JointStep {
                q: q[..2].to_vec(),
                dq: dq.to_vec(),
            })
        }
    }

    #[test]
    fn short_step_result_is_rejected() {
        let mut leg = LegPlayback::new(LegKind::FrontLeft, 10.0).unwrap();
        let err = leg.step(&Truncating, [0.1; 3], DT).unwrap_err();
        assert_eq!(
            err,
            ChainError::ArgumentLength {
                field: "q",
                expected: 3,
                got: 2
            }
        );
        assert_eq!(leg.q(), [0.0; 3]);
    }
}
