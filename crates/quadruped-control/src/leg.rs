//! One three-joint leg: measured chain, servos and pose interfaces.
//!
//! Cartesian poses are in inches in the body frame (x right, y forward,
//! z up, origin at the body center). The chain itself is in meters.

use std::fmt;
use std::sync::Arc;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::error;

use quadruped_core::{ChainError, JointAngleError, QuadrupedError};
use quadruped_hal::JointServo;
use quadruped_ik::{DynamicsBackend, IkSolution, KinematicChain, KinematicsBackend, PlanarAngles, PlanarLeg};

/// Meters per inch.
pub const METERS_PER_INCH: f64 = 0.0254;

/// Joint labels in chain order.
pub const JOINT_LABELS: [&str; 3] = ["Hip 1", "Hip 2", "Knee"];

// ---------------------------------------------------------------------------
// LegKind
// ---------------------------------------------------------------------------

/// Mounting position of a leg.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegKind {
    FrontLeft,
    FrontRight,
    BackRight,
    BackLeft,
}

impl LegKind {
    /// Every kind, clockwise from front left.
    pub const ALL: [Self; 4] = [Self::FrontLeft, Self::FrontRight, Self::BackRight, Self::BackLeft];

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FrontLeft => "Front Left",
            Self::FrontRight => "Front Right",
            Self::BackRight => "Back Right",
            Self::BackLeft => "Back Left",
        }
    }

    #[must_use]
    pub const fn is_front(self) -> bool {
        matches!(self, Self::FrontLeft | Self::FrontRight)
    }

    #[must_use]
    pub const fn is_right(self) -> bool {
        matches!(self, Self::FrontRight | Self::BackRight)
    }

    /// Front-right and back-left joints turn the opposite way for the same
    /// foot motion.
    #[must_use]
    pub const fn is_mirrored(self) -> bool {
        matches!(self, Self::FrontRight | Self::BackLeft)
    }

    /// `+1` on the right, `-1` on the left.
    #[must_use]
    pub const fn side_sign(self) -> f64 {
        if self.is_right() { 1.0 } else { -1.0 }
    }

    /// `+1` at the front, `-1` at the back.
    #[must_use]
    pub const fn end_sign(self) -> f64 {
        if self.is_front() { 1.0 } else { -1.0 }
    }

    /// Measured chain of this leg, in meters.
    ///
    /// Hip 1 turns about the fore-aft axis; hip 2 and the knee turn about
    /// the lateral axis.
    ///
    /// # Errors
    ///
    /// Propagates chain construction errors.
    pub fn chain(self) -> Result<KinematicChain, ChainError> {
        let sx = self.side_sign();
        let sy = self.end_sign();
        let [hip1, hip2, knee] = self.joint_points();
        let mut builder = KinematicChain::builder();
        builder
            .add_revolute(&[0.0, sy, 0.0], hip1.as_slice())?
            .add_revolute(&[sx, 0.0, 0.0], hip2.as_slice())?
            .add_revolute(&[sx, 0.0, 0.0], knee.as_slice())?
            .set_home(&[0.1027 * sx, 0.1243 * sy, -0.1842])?;
        Ok(builder.build())
    }

    /// Joint axis points at home, in meters.
    #[must_use]
    pub fn joint_points(self) -> [Vector3<f64>; 3] {
        let sx = self.side_sign();
        let sy = self.end_sign();
        [
            Vector3::new(0.0446 * sx, 0.0951 * sy, 0.0),
            Vector3::new(0.0869 * sx, 0.1243 * sy, 0.0),
            Vector3::new(0.1027 * sx, 0.1243 * sy, -0.0889),
        ]
    }
}

/// Hip 2, knee and foot positions in inches for joint angles `q` in radians.
pub(crate) fn linkage_points(
    kind: LegKind,
    chain: &KinematicChain,
    q: &[f64; 3],
    dynamics: &dyn DynamicsBackend,
) -> Result<[Vector3<f64>; 3], ChainError> {
    let [_, hip2, knee] = kind.joint_points();
    let foot = chain.home().translation;
    // Each point rides on the joint before it.
    let origins = dynamics.joint_positions(chain, q, &[hip2, knee, foot])?;
    Ok([
        origins[0] / METERS_PER_INCH,
        origins[1] / METERS_PER_INCH,
        origins[2] / METERS_PER_INCH,
    ])
}

impl fmt::Display for LegKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Leg
// ---------------------------------------------------------------------------

/// A leg with its chain, servos and solvers.
pub struct Leg {
    kind: LegKind,
    chain: KinematicChain,
    home: Vector3<f64>,
    servos: [JointServo; 3],
    kinematics: Arc<dyn KinematicsBackend>,
    planar: PlanarLeg,
}

impl Leg {
    /// Assemble a leg of `kind` driving `servos` (hip 1, hip 2, knee).
    ///
    /// # Errors
    ///
    /// Propagates chain construction errors.
    pub fn new(
        kind: LegKind,
        servos: [JointServo; 3],
        kinematics: Arc<dyn KinematicsBackend>,
        planar: PlanarLeg,
    ) -> Result<Self, ChainError> {
        let chain = kind.chain()?;
        let home = chain.home().translation / METERS_PER_INCH;
        Ok(Self {
            kind,
            chain,
            home,
            servos,
            kinematics,
            planar,
        })
    }

    #[must_use]
    pub const fn kind(&self) -> LegKind {
        self.kind
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.kind.label()
    }

    /// The leg's chain, in meters.
    #[must_use]
    pub const fn chain(&self) -> &KinematicChain {
        &self.chain
    }

    /// Foot position at zero joint angles, in inches.
    #[must_use]
    pub const fn home(&self) -> &Vector3<f64> {
        &self.home
    }

    /// Commanded joint angles in degrees.
    #[must_use]
    pub fn joint_angles(&self) -> [f64; 3] {
        [self.servos[0].angle(), self.servos[1].angle(), self.servos[2].angle()]
    }

    /// Commanded joint angles in radians.
    #[must_use]
    pub fn joint_radians(&self) -> [f64; 3] {
        self.joint_angles().map(f64::to_radians)
    }

    /// Foot position for the commanded angles, in inches.
    ///
    /// # Errors
    ///
    /// Propagates forward-kinematics argument errors.
    pub fn foot_position(&self) -> Result<Vector3<f64>, ChainError> {
        let p = self.kinematics.forward_position(&self.chain, &self.joint_radians())?;
        Ok(p / METERS_PER_INCH)
    }

    /// Hip 2, knee and foot positions for the commanded angles, in inches.
    ///
    /// # Errors
    ///
    /// Propagates argument errors from `dynamics`.
    pub fn linkage(&self, dynamics: &dyn DynamicsBackend) -> Result<[Vector3<f64>; 3], ChainError> {
        linkage_points(self.kind, &self.chain, &self.joint_radians(), dynamics)
    }

    /// Command all three joints, in degrees.
    ///
    /// Joints are written in order; a rejected joint stops the write and
    /// leaves earlier joints updated.
    ///
    /// # Errors
    ///
    /// [`JointAngleError`] naming the rejected joint, after logging it.
    pub fn set_joint_angles(&mut self, degrees: [f64; 3]) -> Result<(), JointAngleError> {
        for ((servo, &angle), joint) in self.servos.iter_mut().zip(&degrees).zip(JOINT_LABELS) {
            if let Err(source) = servo.set_angle(angle) {
                error!(
                    leg = self.kind.label(),
                    joint,
                    angle_deg = angle,
                    error = %source,
                    "joint angle error"
                );
                return Err(JointAngleError {
                    leg: self.kind.label(),
                    joint,
                    angle_deg: angle,
                    source,
                });
            }
        }
        Ok(())
    }

    /// Hip 2 and knee angles placing the foot at `(y, z)` in the leg's
    /// sagittal plane, in radians.
    ///
    /// `y` is forward of the hip and `z` is relative to the hip axis, both in
    /// inches.
    #[must_use]
    pub fn planar_angles(&self, y: f64, z: f64) -> PlanarAngles {
        let y = if self.kind.is_front() { y } else { -y };
        let angles = self.planar.solve(y, z);
        if self.kind.is_mirrored() { angles.negated() } else { angles }
    }

    /// Place the foot in the sagittal plane with hip 1 at zero.
    ///
    /// # Errors
    ///
    /// [`JointAngleError`] if a servo rejects the result.
    pub fn set_pose_2d(&mut self, y: f64, z: f64) -> Result<(), JointAngleError> {
        let angles = self.planar_angles(y, z);
        self.set_joint_angles([0.0, angles.hip.to_degrees(), angles.knee.to_degrees()])
    }

    /// Place the foot at body-frame `(x, y, z)` in inches.
    ///
    /// The solver is seeded with the current joint angles. When the knee is
    /// bent the wrong way for this leg, hip 2 and the knee are reseeded from
    /// the planar solution so the solver does not have to pass through the
    /// straight-knee singularity. Non-convergence is not an error; the last
    /// iterate is applied.
    ///
    /// # Errors
    ///
    /// [`QuadrupedError::Linalg`] on invalid solver damping, or
    /// [`QuadrupedError::JointAngle`] if a servo rejects the result.
    pub fn set_pose(&mut self, x: f64, y: f64, z: f64) -> Result<IkSolution, QuadrupedError> {
        let target = Vector3::new(x, y, z) * METERS_PER_INCH;
        let mut seed = self.joint_radians();
        let knee = seed[2];
        let reversed = if self.kind.is_mirrored() { knee > 0.0 } else { knee < 0.0 };
        if reversed {
            let angles = self.planar_angles(y, z);
            seed[1] = angles.hip;
            seed[2] = angles.knee;
        }

        let solution = self.kinematics.solve_position(&self.chain, &target, &seed)?;
        let mut degrees = [0.0; 3];
        for (deg, q) in degrees.iter_mut().zip(&solution.joint_positions) {
            *deg = q.to_degrees();
        }
        self.set_joint_angles(degrees)?;
        Ok(solution)
    }

    /// Joint angles formatted as `[  a°,   b°,   c°]`.
    #[must_use]
    pub fn format_angles(&self) -> String {
        let parts: Vec<String> = self.joint_angles().iter().map(|a| format!("{a:6.2}°")).collect();
        format!("[{}]", parts.join(", "))
    }
}

impl fmt::Debug for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leg")
            .field("kind", &self.kind)
            .field("joint_angles", &self.joint_angles())
            .field("kinematics", &self.kinematics.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use quadruped_ik::{DlsConfig, KinematicDynamics, default_backend};

    fn leg(kind: LegKind) -> Leg {
        let servos = [JointServo::new(0.0), JointServo::new(0.0), JointServo::new(0.0)];
        Leg::new(kind, servos, default_backend(DlsConfig::default()), PlanarLeg::default()).unwrap()
    }

    #[test]
    fn kind_flags() {
        let flags: Vec<_> = LegKind::ALL
            .iter()
            .map(|k| (k.is_front(), k.is_right(), k.is_mirrored()))
            .collect();
        assert_eq!(
            flags,
            vec![(true, false, false), (true, true, true), (false, true, false), (false, false, true)]
        );
        assert_eq!(LegKind::BackRight.to_string(), "Back Right");
    }

    #[test]
    fn home_is_in_inches() {
        let fl = leg(LegKind::FrontLeft);
        assert_relative_eq!(fl.home().x, -0.1027 / METERS_PER_INCH, epsilon = 1e-12);
        assert_relative_eq!(fl.home().y, 0.1243 / METERS_PER_INCH, epsilon = 1e-12);
        assert_relative_eq!(fl.home().z, -0.1842 / METERS_PER_INCH, epsilon = 1e-12);

        let br = leg(LegKind::BackRight);
        assert_relative_eq!(br.home().x, -fl.home().x, epsilon = 1e-12);
        assert_relative_eq!(br.home().y, -fl.home().y, epsilon = 1e-12);
    }

    #[test]
    fn zero_angles_reach_home() {
        for kind in LegKind::ALL {
            let l = leg(kind);
            let foot = l.foot_position().unwrap();
            assert_relative_eq!(foot, *l.home(), epsilon = 1e-9);
        }
    }

    #[test]
    fn linkage_ends_at_foot() {
        let dynamics = KinematicDynamics::new();
        let mut l = leg(LegKind::BackLeft);
        let [hip2, knee, foot] = l.linkage(&dynamics).unwrap();
        assert_relative_eq!(hip2 * METERS_PER_INCH, LegKind::BackLeft.joint_points()[1], epsilon = 1e-12);
        assert_relative_eq!(knee * METERS_PER_INCH, LegKind::BackLeft.joint_points()[2], epsilon = 1e-12);
        assert_relative_eq!(foot, *l.home(), epsilon = 1e-9);

        l.set_pose_2d(0.0, -7.0).unwrap();
        let [hip2_after, _, foot] = l.linkage(&dynamics).unwrap();
        assert_relative_eq!(hip2_after, hip2, epsilon = 1e-9);
        assert_relative_eq!(foot, l.foot_position().unwrap(), epsilon = 1e-9);
    }

    #[test]
    fn stand_angles_are_mirrored() {
        let mut fl = leg(LegKind::FrontLeft);
        let mut fr = leg(LegKind::FrontRight);
        fl.set_pose_2d(0.0, -7.0).unwrap();
        fr.set_pose_2d(0.0, -7.0).unwrap();
        let [h1, h2, k] = fl.joint_angles();
        assert_relative_eq!(h1, 0.0);
        assert_relative_eq!(h2, (-0.272_837_362_673_683_97_f64).to_degrees(), epsilon = 1e-9);
        assert_relative_eq!(k, 0.527_067_740_061_204_3_f64.to_degrees(), epsilon = 1e-9);
        assert_relative_eq!(fr.joint_angles()[1], -h2, epsilon = 1e-12);
        assert_relative_eq!(fr.joint_angles()[2], -k, epsilon = 1e-12);
    }

    #[test]
    fn back_legs_flip_planar_y() {
        let front = leg(LegKind::FrontLeft).planar_angles(1.0, -6.5);
        let back = leg(LegKind::BackRight).planar_angles(-1.0, -6.5);
        assert_relative_eq!(front.hip, back.hip, epsilon = 1e-12);
        assert_relative_eq!(front.knee, back.knee, epsilon = 1e-12);
    }

    #[test]
    fn format_angles_layout() {
        let mut l = leg(LegKind::FrontLeft);
        l.set_joint_angles([0.0, -15.5, 30.25]).unwrap();
        assert_eq!(l.format_angles(), "[  0.00°, -15.50°,  30.25°]");
    }
}
