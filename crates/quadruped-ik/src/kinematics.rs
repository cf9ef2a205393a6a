//! Forward kinematics and Jacobians by product of exponentials.
//!
//! ```text
//! T(q) = exp(S₁q₁) · exp(S₂q₂) · … · exp(Sₙqₙ)
//! p(q) = T(q) · home.t
//! ```
//!
//! Jacobian columns are the joint twists carried through the transform of
//! all preceding joints (`Ad_{T₁..ᵢ₋₁} Sᵢ`), accumulated in the same pass.
//! The position Jacobian is the linear half of the spatial one.

use nalgebra::{Matrix3xX, Matrix6xX, Vector3};

use quadruped_core::ChainError;

use crate::chain::KinematicChain;
use crate::transform::Transform;
use crate::twist::Twist;

/// End-effector position at configuration `q`.
///
/// # Errors
///
/// [`ChainError::ArgumentLength`] if `q.len() != chain.dof()`.
pub fn forward_position(chain: &KinematicChain, q: &[f64]) -> Result<Vector3<f64>, ChainError> {
    chain.check_joint_vector("q", q)?;
    Ok(end_effector(chain, &product_of_exponentials(chain, q)))
}

/// End-effector position and the 3×N linear-velocity Jacobian, in one pass.
///
/// # Errors
///
/// [`ChainError::ArgumentLength`] if `q.len() != chain.dof()`.
pub fn position_jacobian(
    chain: &KinematicChain,
    q: &[f64],
) -> Result<(Vector3<f64>, Matrix3xX<f64>), ChainError> {
    chain.check_joint_vector("q", q)?;
    Ok(position_jacobian_unchecked(chain, q))
}

/// Full 6×N spatial Jacobian with angular rows first, then linear rows of
/// the end-effector point.
///
/// # Errors
///
/// [`ChainError::ArgumentLength`] if `q.len() != chain.dof()`.
pub fn spatial_jacobian(chain: &KinematicChain, q: &[f64]) -> Result<Matrix6xX<f64>, ChainError> {
    chain.check_joint_vector("q", q)?;
    Ok(spatial_jacobian_unchecked(chain, q).1)
}

/// Position of each joint origin along the chain at `q`.
///
/// `home_points[i]` is joint `i`'s origin at the home configuration; the
/// result is that point carried through the first `i + 1` exponentials.
///
/// # Errors
///
/// [`ChainError::ArgumentLength`] if `q` or `home_points` is not one entry
/// per joint.
pub fn joint_origins(
    chain: &KinematicChain,
    q: &[f64],
    home_points: &[Vector3<f64>],
) -> Result<Vec<Vector3<f64>>, ChainError> {
    chain.check_joint_vector("q", q)?;
    if home_points.len() != chain.dof() {
        return Err(ChainError::ArgumentLength {
            field: "home_points",
            expected: chain.dof(),
            got: home_points.len(),
        });
    }
    let mut t = Transform::identity();
    let mut origins = Vec::with_capacity(chain.dof());
    for ((joint, &theta), point) in chain.joints().iter().zip(q).zip(home_points) {
        t = t * joint.screw.exp(theta);
        origins.push(t.transform_point(point));
    }
    Ok(origins)
}

/// Position-only Jacobian for callers that have already checked `q`: the
/// linear rows of the spatial Jacobian.
pub(crate) fn position_jacobian_unchecked(
    chain: &KinematicChain,
    q: &[f64],
) -> (Vector3<f64>, Matrix3xX<f64>) {
    let (ee, spatial) = spatial_jacobian_unchecked(chain, q);
    (ee, spatial.fixed_rows::<3>(3).into_owned())
}

/// End-effector position and the 6×N spatial Jacobian.
fn spatial_jacobian_unchecked(chain: &KinematicChain, q: &[f64]) -> (Vector3<f64>, Matrix6xX<f64>) {
    let (columns, ee) = spatial_columns(chain, q);
    let mut jacobian = Matrix6xX::zeros(columns.len());
    for (i, screw) in columns.iter().enumerate() {
        let linear = screw.point_velocity(&ee);
        jacobian.fixed_view_mut::<3, 1>(0, i).copy_from(&screw.angular);
        jacobian.fixed_view_mut::<3, 1>(3, i).copy_from(&linear);
    }
    (ee, jacobian)
}

fn product_of_exponentials(chain: &KinematicChain, q: &[f64]) -> Transform {
    chain
        .joints()
        .iter()
        .zip(q)
        .fold(Transform::identity(), |t, (joint, &theta)| t * joint.screw.exp(theta))
}

fn end_effector(chain: &KinematicChain, t: &Transform) -> Vector3<f64> {
    t.transform_point(&chain.home().translation)
}

/// Spatial twist of every joint at `q`, plus the end-effector position.
fn spatial_columns(chain: &KinematicChain, q: &[f64]) -> (Vec<Twist>, Vector3<f64>) {
    let mut t = Transform::identity();
    let mut columns = Vec::with_capacity(chain.dof());
    for (joint, &theta) in chain.joints().iter().zip(q) {
        columns.push(joint.screw.adjoint(&t));
        t = t * joint.screw.exp(theta);
    }
    (columns, end_effector(chain, &t))
}
