//! 3×4 homogeneous transforms (rotation block + translation column).
//!
//! Kept as an explicit matrix pair rather than a quaternion isometry so that
//! user-supplied home transforms round-trip exactly through the flat
//! row-major form used by robot descriptions.

use std::ops::Mul;

use nalgebra::{Matrix3, Vector3};

use quadruped_core::ChainError;

/// Rigid transform `[R | t]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Rotation block.
    pub rotation: Matrix3<f64>,
    /// Translation column.
    pub translation: Vector3<f64>,
}

impl Transform {
    /// The identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Build from a rotation block and a translation column.
    #[must_use]
    pub const fn from_parts(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Pure translation.
    #[must_use]
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation,
        }
    }

    /// Parse a 12-element row-major `[r00 r01 r02 t0 r10 r11 r12 t1 r20 r21 r22 t2]`.
    ///
    /// # Errors
    ///
    /// [`ChainError::ArgumentLength`] naming `field` if `values.len() != 12`.
    pub fn from_row_major(field: &'static str, values: &[f64]) -> Result<Self, ChainError> {
        ChainError::check_len(field, values, 12)?;
        let v = values;
        Ok(Self {
            rotation: Matrix3::new(v[0], v[1], v[2], v[4], v[5], v[6], v[8], v[9], v[10]),
            translation: Vector3::new(v[3], v[7], v[11]),
        })
    }

    /// Row-major flat form, inverse of [`from_row_major`](Self::from_row_major).
    #[must_use]
    pub fn to_row_major(&self) -> [f64; 12] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            r[(0, 0)], r[(0, 1)], r[(0, 2)], t.x,
            r[(1, 0)], r[(1, 1)], r[(1, 2)], t.y,
            r[(2, 0)], r[(2, 1)], r[(2, 2)], t.z,
        ]
    }

    /// Transform derived from Denavit–Hartenberg parameters (angles in radians).
    #[must_use]
    pub fn from_dh(d: f64, theta: f64, r: f64, alpha: f64) -> Self {
        let (st, ct) = theta.sin_cos();
        let (sa, ca) = alpha.sin_cos();
        Self {
            rotation: Matrix3::new(
                ct, -st * ca, st * sa,
                st, ct * ca, -ct * sa,
                0.0, sa, ca,
            ),
            translation: Vector3::new(r * ct, r * st, d),
        }
    }

    /// Apply to a point: `R·p + t`.
    #[must_use]
    pub fn transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * point + self.translation
    }

    /// Apply to a direction: `R·v`.
    #[must_use]
    pub fn transform_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * vector
    }

    /// Third column of the rotation block.
    #[must_use]
    pub fn z_axis(&self) -> Vector3<f64> {
        self.rotation.column(2).into_owned()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for Transform {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            rotation: self.rotation * rhs.rotation,
            translation: self.rotation * rhs.translation + self.translation,
        }
    }
}

impl Mul<&Transform> for &Transform {
    type Output = Transform;

    fn mul(self, rhs: &Transform) -> Transform {
        *self * *rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn row_major_roundtrip() {
        let flat = [1.0, 0.0, 0.0, 0.526, 0.0, 0.0, -1.0, 0.0, 0.0, 1.0, 0.0, 0.74];
        let t = Transform::from_row_major("home", &flat).unwrap();
        assert_eq!(t.to_row_major(), flat);
        assert_relative_eq!(t.translation.x, 0.526);
        assert_relative_eq!(t.rotation[(1, 2)], -1.0);
    }

    #[test]
    fn row_major_rejects_wrong_length() {
        let err = Transform::from_row_major("frame", &[0.0; 11]).unwrap_err();
        assert_eq!(
            err,
            ChainError::ArgumentLength {
                field: "frame",
                expected: 12,
                got: 11
            }
        );
    }

    #[test]
    fn compose_matches_sequential_application() {
        let a = Transform::from_dh(0.1, 0.3, 0.2, -0.4);
        let b = Transform::from_dh(-0.2, 1.1, 0.5, 0.9);
        let p = Vector3::new(0.3, -0.7, 1.2);
        let composed = (a * b).transform_point(&p);
        let sequential = a.transform_point(&b.transform_point(&p));
        assert_relative_eq!(composed, sequential, epsilon = 1e-12);
    }

    #[test]
    fn dh_pure_offset() {
        let t = Transform::from_dh(0.5, 0.0, 0.25, 0.0);
        assert_relative_eq!(t.rotation, Matrix3::identity(), epsilon = 1e-12);
        assert_relative_eq!(t.translation, Vector3::new(0.25, 0.0, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn dh_twist_rotates_z_axis() {
        let t = Transform::from_dh(0.0, 0.0, 0.0, FRAC_PI_2);
        assert_relative_eq!(t.z_axis(), Vector3::new(0.0, -1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn dh_rotation_is_orthonormal() {
        let t = Transform::from_dh(0.3, 0.7, -0.2, 1.3);
        let rtr = t.rotation.transpose() * t.rotation;
        assert_relative_eq!(rtr, Matrix3::identity(), epsilon = 1e-12);
        assert_relative_eq!(t.rotation.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn identity_is_neutral() {
        let a = Transform::from_dh(0.1, 0.2, 0.3, 0.4);
        assert_eq!(a * Transform::identity(), a);
        assert_eq!(Transform::identity() * a, a);
    }
}
