//! Screw-axis twists and their exponentials.
//!
//! A twist is stored as `(ω, v)`. For a revolute joint `ω` is the unit axis
//! and `v = p × ω` for any point `p` on the axis; for a prismatic joint
//! `ω = 0` and `v` is the unit direction of travel.

use nalgebra::{Matrix3, Vector3};

use quadruped_core::ChainError;

use crate::transform::Transform;

/// Tolerance on `‖axis‖² − 1` when accepting a unit axis.
pub const UNIT_TOLERANCE: f64 = 1e-6;

/// Screw axis `(ω, v)` in the base frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Twist {
    /// Angular part `ω`.
    pub angular: Vector3<f64>,
    /// Linear part `v`.
    pub linear: Vector3<f64>,
}

impl Twist {
    /// Build from raw angular and linear parts.
    #[must_use]
    pub const fn new(angular: Vector3<f64>, linear: Vector3<f64>) -> Self {
        Self { angular, linear }
    }

    /// Revolute screw about `axis` through `point`.
    #[must_use]
    pub fn revolute(axis: Vector3<f64>, point: Vector3<f64>) -> Self {
        Self {
            angular: axis,
            linear: point.cross(&axis),
        }
    }

    /// Prismatic screw along `direction`.
    #[must_use]
    pub fn prismatic(direction: Vector3<f64>) -> Self {
        Self {
            angular: Vector3::zeros(),
            linear: direction,
        }
    }

    /// Parse `[ωx ωy ωz vx vy vz]`.
    ///
    /// # Errors
    ///
    /// [`ChainError::ArgumentLength`] if `values.len() != 6`.
    pub fn from_slice(field: &'static str, values: &[f64]) -> Result<Self, ChainError> {
        ChainError::check_len(field, values, 6)?;
        Ok(Self {
            angular: Vector3::new(values[0], values[1], values[2]),
            linear: Vector3::new(values[3], values[4], values[5]),
        })
    }

    /// Flat `[ω, v]` form.
    #[must_use]
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.angular.x,
            self.angular.y,
            self.angular.z,
            self.linear.x,
            self.linear.y,
            self.linear.z,
        ]
    }

    /// True when the angular part is zero.
    #[must_use]
    pub fn is_prismatic(&self) -> bool {
        self.angular.norm_squared() < UNIT_TOLERANCE
    }

    /// Rigid motion produced by moving `theta` along this screw.
    ///
    /// Closed form for a unit (or zero) angular part:
    /// `R = I + sinθ[ω] + (1−cosθ)[ω]²`,
    /// `t = (θI + (1−cosθ)[ω] + (θ−sinθ)[ω]²)·v`.
    #[must_use]
    pub fn exp(&self, theta: f64) -> Transform {
        let w = self.angular.cross_matrix();
        let w2 = w * w;
        let (s, c) = theta.sin_cos();
        let rotation = Matrix3::identity() + w * s + w2 * (1.0 - c);
        let g = Matrix3::identity() * theta + w * (1.0 - c) + w2 * (theta - s);
        Transform::from_parts(rotation, g * self.linear)
    }

    /// Re-express this twist through the rigid transform `t`:
    /// `ω' = R·ω`, `v' = R·v + p × ω'`.
    #[must_use]
    pub fn adjoint(&self, t: &Transform) -> Self {
        let angular = t.rotation * self.angular;
        Self {
            angular,
            linear: t.rotation * self.linear + t.translation.cross(&angular),
        }
    }

    /// Linear velocity of the point `p` under this twist at unit rate.
    #[must_use]
    pub fn point_velocity(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.linear + self.angular.cross(p)
    }
}

/// Reject a vector that is not unit length within [`UNIT_TOLERANCE`].
pub(crate) fn check_unit(field: &'static str, v: &Vector3<f64>) -> Result<(), ChainError> {
    let n2 = v.norm_squared();
    if n2.is_finite() && (n2 - 1.0).abs() <= UNIT_TOLERANCE {
        Ok(())
    } else {
        Err(ChainError::ArgumentRange {
            field,
            message: format!("must be a unit vector, squared norm is {n2}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn revolute_about_z_through_origin() {
        let s = Twist::revolute(Vector3::z(), Vector3::zeros());
        let t = s.exp(FRAC_PI_2);
        let p = t.transform_point(&Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn revolute_about_offset_axis_keeps_axis_point_fixed() {
        let point = Vector3::new(1.0, 2.0, 0.0);
        let s = Twist::revolute(Vector3::z(), point);
        let t = s.exp(0.7);
        assert_relative_eq!(t.transform_point(&point), point, epsilon = 1e-12);

        // Half turn reflects through the axis.
        let half = s.exp(PI);
        let moved = half.transform_point(&Vector3::new(2.0, 2.0, 0.5));
        assert_relative_eq!(moved, Vector3::new(0.0, 2.0, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn prismatic_translates() {
        let s = Twist::prismatic(Vector3::new(0.0, 0.6, 0.8));
        let t = s.exp(2.0);
        assert_relative_eq!(t.rotation, Matrix3::identity(), epsilon = 1e-12);
        assert_relative_eq!(t.translation, Vector3::new(0.0, 1.2, 1.6), epsilon = 1e-12);
        assert!(s.is_prismatic());
    }

    #[test]
    fn zero_angle_is_identity() {
        let s = Twist::revolute(Vector3::x(), Vector3::new(0.3, -0.2, 0.9));
        assert_relative_eq!(s.exp(0.0).rotation, Matrix3::identity());
        assert_relative_eq!(s.exp(0.0).translation, Vector3::zeros());
    }

    #[test]
    fn exp_is_additive_along_one_screw() {
        let s = Twist::revolute(Vector3::y(), Vector3::new(0.1, 0.0, -0.3));
        let a = s.exp(0.4) * s.exp(0.9);
        let b = s.exp(1.3);
        assert_relative_eq!(a.rotation, b.rotation, epsilon = 1e-12);
        assert_relative_eq!(a.translation, b.translation, epsilon = 1e-12);
    }

    #[test]
    fn adjoint_through_identity_is_noop() {
        let s = Twist::revolute(Vector3::x(), Vector3::new(0.0, 1.0, 2.0));
        assert_eq!(s.adjoint(&Transform::identity()), s);
    }

    #[test]
    fn adjoint_moves_axis_point() {
        // Pure translation by d moves the axis through p to the axis through p + d.
        let s = Twist::revolute(Vector3::z(), Vector3::new(1.0, 0.0, 0.0));
        let d = Vector3::new(0.0, 2.0, 0.0);
        let moved = s.adjoint(&Transform::from_translation(d));
        let expected = Twist::revolute(Vector3::z(), Vector3::new(1.0, 2.0, 0.0));
        assert_relative_eq!(moved.angular, expected.angular, epsilon = 1e-12);
        assert_relative_eq!(moved.linear, expected.linear, epsilon = 1e-12);
    }

    #[test]
    fn point_velocity_of_revolute() {
        let s = Twist::revolute(Vector3::z(), Vector3::zeros());
        let v = s.point_velocity(&Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(v, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn slice_roundtrip_and_length_check() {
        let s = Twist::from_slice("screw", &[0.0, 0.0, 1.0, 0.5, -0.5, 0.0]).unwrap();
        assert_eq!(s.to_array(), [0.0, 0.0, 1.0, 0.5, -0.5, 0.0]);
        assert!(Twist::from_slice("screw", &[0.0; 5]).is_err());
    }

    #[test]
    fn unit_check() {
        assert!(check_unit("axis", &Vector3::new(0.0, 0.6, 0.8)).is_ok());
        let err = check_unit("axis", &Vector3::new(0.0, 1.0, 1.0)).unwrap_err();
        assert_eq!(err.field(), "axis");
        assert!(check_unit("axis", &Vector3::new(f64::NAN, 0.0, 1.0)).is_err());
    }
}
