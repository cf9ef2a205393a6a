//! Serial kinematic chain described by screw axes.
//!
//! A [`KinematicChain`] is an ordered list of joints, each carrying its
//! twist in the base frame at the home configuration, a local joint frame
//! and an opaque six-value parameter block, plus the end-effector home
//! transform. Chains are assembled with a [`ChainBuilder`] and are
//! read-only once built.

use nalgebra::Vector3;

use quadruped_core::ChainError;

use crate::transform::Transform;
use crate::twist::{Twist, check_unit};

/// A single joint in the kinematic chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainJoint {
    /// Screw axis in the base frame at the home configuration.
    pub screw: Twist,
    /// Local joint frame.
    pub frame: Transform,
    /// Inertial/gain coefficients, passed through to dynamics backends.
    pub params: [f64; 6],
}

/// Denavit–Hartenberg parameters. Both angles are in radians; convert
/// tables given in degrees with [`f64::to_radians`] first.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DhParameters {
    /// Offset along the previous z.
    pub d: f64,
    /// Angle about the previous z, in radians.
    pub theta: f64,
    /// Length along the new x.
    pub r: f64,
    /// Angle about the new x, in radians.
    pub alpha: f64,
}

impl DhParameters {
    /// Bundle the four DH values, angles in radians.
    #[must_use]
    pub const fn new(d: f64, theta: f64, r: f64, alpha: f64) -> Self {
        Self { d, theta, r, alpha }
    }

    /// The local transform these parameters describe.
    #[must_use]
    pub fn transform(&self) -> Transform {
        Transform::from_dh(self.d, self.theta, self.r, self.alpha)
    }
}

/// An ordered serial chain from base to end-effector.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KinematicChain {
    joints: Vec<ChainJoint>,
    home: Transform,
}

impl KinematicChain {
    /// Start building a chain.
    #[must_use]
    pub fn builder() -> ChainBuilder {
        ChainBuilder::new()
    }

    /// Number of degrees of freedom.
    #[must_use]
    pub fn dof(&self) -> usize {
        self.joints.len()
    }

    /// Access the joint definitions.
    #[must_use]
    pub fn joints(&self) -> &[ChainJoint] {
        &self.joints
    }

    /// End-effector home transform.
    #[must_use]
    pub const fn home(&self) -> &Transform {
        &self.home
    }

    /// Check that a per-joint vector has one entry per joint.
    ///
    /// # Errors
    ///
    /// [`ChainError::ArgumentLength`] naming `field`.
    pub fn check_joint_vector(&self, field: &'static str, values: &[f64]) -> Result<(), ChainError> {
        ChainError::check_len(field, values, self.dof())
    }
}

// ---------------------------------------------------------------------------
// ChainBuilder
// ---------------------------------------------------------------------------

/// Append-only construction of a [`KinematicChain`].
///
/// Every add derives the joint twist, stores the joint frame and parameter
/// block, and right-multiplies the running home transform by the local
/// transform of the joint. All slice arguments are length-checked and axis
/// arguments must be unit length.
#[derive(Debug, Clone, Default)]
pub struct ChainBuilder {
    joints: Vec<ChainJoint>,
    home: Transform,
}

impl ChainBuilder {
    /// Empty chain with identity home.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Joints added so far.
    #[must_use]
    pub fn dof(&self) -> usize {
        self.joints.len()
    }

    /// Running home transform.
    #[must_use]
    pub const fn home(&self) -> &Transform {
        &self.home
    }

    /// Append a raw twist `[ω v]` with its 12-value joint frame and six
    /// parameters. The home transform is left untouched.
    ///
    /// # Errors
    ///
    /// Length errors for `screw`, `frame` or `params`.
    pub fn add_joint(
        &mut self,
        screw: &[f64],
        frame: &[f64],
        params: &[f64],
    ) -> Result<&mut Self, ChainError> {
        let screw = Twist::from_slice("screw", screw)?;
        let frame = Transform::from_row_major("frame", frame)?;
        let params = parse_params(params)?;
        self.joints.push(ChainJoint {
            screw,
            frame,
            params,
        });
        Ok(self)
    }

    /// Append a revolute joint about the unit `axis` through `point`.
    ///
    /// # Errors
    ///
    /// Length errors for `axis`/`point`, range error if `axis` is not unit.
    pub fn add_revolute(&mut self, axis: &[f64], point: &[f64]) -> Result<&mut Self, ChainError> {
        self.add_revolute_with(axis, point, Transform::identity(), [0.0; 6])
    }

    /// [`add_revolute`](Self::add_revolute) with an explicit local frame and
    /// parameter block.
    ///
    /// # Errors
    ///
    /// As [`add_revolute`](Self::add_revolute).
    pub fn add_revolute_with(
        &mut self,
        axis: &[f64],
        point: &[f64],
        frame: Transform,
        params: [f64; 6],
    ) -> Result<&mut Self, ChainError> {
        let axis = parse_vector("axis", axis)?;
        let point = parse_vector("point", point)?;
        check_unit("axis", &axis)?;
        self.push(Twist::revolute(axis, point), frame, frame, params);
        Ok(self)
    }

    /// Append a prismatic joint sliding along the unit `direction`.
    ///
    /// # Errors
    ///
    /// Length error for `direction`, range error if it is not unit.
    pub fn add_prismatic(&mut self, direction: &[f64]) -> Result<&mut Self, ChainError> {
        self.add_prismatic_with(direction, Transform::identity(), [0.0; 6])
    }

    /// [`add_prismatic`](Self::add_prismatic) with an explicit local frame and
    /// parameter block.
    ///
    /// # Errors
    ///
    /// As [`add_prismatic`](Self::add_prismatic).
    pub fn add_prismatic_with(
        &mut self,
        direction: &[f64],
        frame: Transform,
        params: [f64; 6],
    ) -> Result<&mut Self, ChainError> {
        let direction = parse_vector("direction", direction)?;
        check_unit("direction", &direction)?;
        self.push(Twist::prismatic(direction), frame, frame, params);
        Ok(self)
    }

    /// Append a revolute joint about the current home z-axis, then advance
    /// the home transform by the DH link transform.
    pub fn add_revolute_dh(&mut self, dh: DhParameters) -> &mut Self {
        self.add_revolute_dh_with(dh, Transform::identity(), [0.0; 6])
    }

    /// [`add_revolute_dh`](Self::add_revolute_dh) with an explicit joint
    /// frame and parameter block.
    pub fn add_revolute_dh_with(
        &mut self,
        dh: DhParameters,
        frame: Transform,
        params: [f64; 6],
    ) -> &mut Self {
        let screw = Twist::revolute(self.home.z_axis(), self.home.translation);
        self.push(screw, frame, dh.transform(), params);
        self
    }

    /// Replace the end-effector home transform. Three values give a pure
    /// translation, twelve a full row-major transform.
    ///
    /// # Errors
    ///
    /// [`ChainError::ArgumentLength`] for any other length.
    pub fn set_home(&mut self, values: &[f64]) -> Result<&mut Self, ChainError> {
        self.home = match values.len() {
            3 => Transform::from_translation(Vector3::new(values[0], values[1], values[2])),
            _ => Transform::from_row_major("home", values)?,
        };
        Ok(self)
    }

    /// Freeze the chain.
    #[must_use]
    pub fn build(&self) -> KinematicChain {
        KinematicChain {
            joints: self.joints.clone(),
            home: self.home,
        }
    }

    fn push(&mut self, screw: Twist, frame: Transform, local: Transform, params: [f64; 6]) {
        self.joints.push(ChainJoint {
            screw,
            frame,
            params,
        });
        self.home = self.home * local;
    }
}

fn parse_vector(field: &'static str, values: &[f64]) -> Result<Vector3<f64>, ChainError> {
    ChainError::check_len(field, values, 3)?;
    Ok(Vector3::new(values[0], values[1], values[2]))
}

fn parse_params(values: &[f64]) -> Result<[f64; 6], ChainError> {
    ChainError::check_len("params", values, 6)?;
    let mut params = [0.0; 6];
    params.copy_from_slice(values);
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    const IDENTITY_FRAME: [f64; 12] = [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];

    #[test]
    fn revolute_twist_is_point_cross_axis() {
        let mut builder = ChainBuilder::new();
        builder.add_revolute(&[0.0, 1.0, 0.0], &[0.0, 0.0, 1.0]).unwrap();
        let chain = builder.build();
        assert_eq!(chain.dof(), 1);
        let s = chain.joints()[0].screw;
        assert_eq!(s.to_array(), [0.0, 1.0, 0.0, -1.0, 0.0, 0.0]);
    }

    #[test]
    fn adds_chain_and_count() {
        let mut builder = KinematicChain::builder();
        builder
            .add_revolute(&[0.0, 0.0, 1.0], &[0.0, 0.0, 0.0])
            .unwrap()
            .add_prismatic(&[1.0, 0.0, 0.0])
            .unwrap()
            .add_joint(&[0.0; 6], &IDENTITY_FRAME, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap();
        let chain = builder.build();
        assert_eq!(chain.dof(), 3);
        assert!(chain.joints()[1].screw.is_prismatic());
        assert_eq!(chain.joints()[2].params, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn rejects_non_unit_axis() {
        let mut builder = ChainBuilder::new();
        let err = builder.add_revolute(&[0.0, 0.0, 1.001], &[0.0; 3]).unwrap_err();
        assert!(matches!(err, ChainError::ArgumentRange { field: "axis", .. }));
        let err = builder.add_prismatic(&[0.5, 0.5, 0.0]).unwrap_err();
        assert!(matches!(err, ChainError::ArgumentRange { field: "direction", .. }));
        assert_eq!(builder.dof(), 0);
    }

    #[test]
    fn accepts_axis_within_tolerance() {
        let mut builder = ChainBuilder::new();
        let nearly = 1.0 + 4e-7;
        assert!(builder.add_revolute(&[0.0, 0.0, nearly], &[0.0; 3]).is_ok());
    }

    #[test]
    fn rejects_wrong_lengths() {
        let mut builder = ChainBuilder::new();
        assert_eq!(
            builder.add_revolute(&[0.0, 1.0], &[0.0; 3]).unwrap_err().field(),
            "axis"
        );
        assert_eq!(
            builder.add_revolute(&[0.0, 1.0, 0.0], &[0.0; 4]).unwrap_err().field(),
            "point"
        );
        assert_eq!(builder.add_joint(&[0.0; 5], &IDENTITY_FRAME, &[0.0; 6]).unwrap_err().field(), "screw");
        assert_eq!(builder.add_joint(&[0.0; 6], &[0.0; 9], &[0.0; 6]).unwrap_err().field(), "frame");
        assert_eq!(builder.add_joint(&[0.0; 6], &IDENTITY_FRAME, &[0.0; 2]).unwrap_err().field(), "params");
        assert_eq!(builder.set_home(&[0.0; 4]).unwrap_err().field(), "home");
    }

    #[test]
    fn set_home_translation_and_full() {
        let mut builder = ChainBuilder::new();
        builder.set_home(&[1.0, 2.0, 3.0]).unwrap();
        assert_relative_eq!(builder.home().translation, Vector3::new(1.0, 2.0, 3.0));

        let full = [0.0, -1.0, 0.0, 0.5, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.25];
        builder.set_home(&full).unwrap();
        assert_eq!(builder.home().to_row_major(), full);
    }

    #[test]
    fn frame_advances_home() {
        let mut builder = ChainBuilder::new();
        let frame = Transform::from_translation(Vector3::new(0.0, 0.0, 0.5));
        builder
            .add_revolute_with(&[0.0, 0.0, 1.0], &[0.0; 3], frame, [0.0; 6])
            .unwrap();
        builder
            .add_revolute_with(&[0.0, 0.0, 1.0], &[0.0, 0.0, 0.5], frame, [0.0; 6])
            .unwrap();
        assert_relative_eq!(builder.home().translation, Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(builder.build().joints()[1].frame, frame);
    }

    #[test]
    fn dh_twist_uses_home_before_update() {
        let mut builder = ChainBuilder::new();
        builder.add_revolute_dh(DhParameters::new(0.3, 0.0, 0.0, -FRAC_PI_2));
        builder.add_revolute_dh(DhParameters::new(0.0, 0.0, 0.4, 0.0));
        let chain = builder.build();

        // First joint: base z through the origin.
        let s0 = chain.joints()[0].screw;
        assert_relative_eq!(s0.angular, Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(s0.linear, Vector3::zeros(), epsilon = 1e-12);

        // Second joint: z turned onto +y by the -90° twist, raised by d.
        let s1 = chain.joints()[1].screw;
        assert_relative_eq!(s1.angular, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        let expected = Vector3::new(0.0, 0.0, 0.3).cross(&Vector3::y());
        assert_relative_eq!(s1.linear, expected, epsilon = 1e-12);

        assert_relative_eq!(chain.home().translation, Vector3::new(0.4, 0.0, 0.3), epsilon = 1e-12);
    }

    #[test]
    fn dh_angles_are_radians() {
        // A table row of θ = 90°, r = 0.5 swings the link onto +y.
        let mut builder = ChainBuilder::new();
        builder.add_revolute_dh(DhParameters::new(0.0, 90.0_f64.to_radians(), 0.5, 0.0));
        assert_relative_eq!(builder.home().translation, Vector3::new(0.0, 0.5, 0.0), epsilon = 1e-12);

        // The same row left in degrees is a different angle entirely.
        let mut raw = ChainBuilder::new();
        raw.add_revolute_dh(DhParameters::new(0.0, 90.0, 0.5, 0.0));
        assert!((raw.home().translation - builder.home().translation).norm() > 0.1);
    }

    #[test]
    fn joint_vector_length_check() {
        let mut builder = ChainBuilder::new();
        builder.add_prismatic(&[0.0, 0.0, 1.0]).unwrap();
        let chain = builder.build();
        assert!(chain.check_joint_vector("q", &[0.1]).is_ok());
        let err = chain.check_joint_vector("q", &[0.1, 0.2]).unwrap_err();
        assert_eq!(
            err,
            ChainError::ArgumentLength {
                field: "q",
                expected: 1,
                got: 2
            }
        );
    }
}
