//! Contract of the rigid-body dynamics collaborator.
//!
//! Simulation playback needs two things from a physics backend: the position
//! of every joint origin (for trajectory display) and one explicit
//! integration step of joint-space dynamics. No physics engine ships with
//! this crate; [`KinematicDynamics`] fills the slot with a kinematic
//! stand-in.

use std::sync::atomic::{AtomicBool, Ordering};

use nalgebra::Vector3;
use tracing::warn;

use quadruped_core::ChainError;

use crate::chain::KinematicChain;
use crate::kinematics::joint_origins;

/// Joint positions and velocities after one integration step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JointStep {
    /// Joint positions.
    pub q: Vec<f64>,
    /// Joint velocities.
    pub dq: Vec<f64>,
}

/// Dynamics service used by simulation playback.
pub trait DynamicsBackend: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Origin of every joint at `q`, given each origin at home.
    ///
    /// # Errors
    ///
    /// [`ChainError::ArgumentLength`] for mismatched `q` or `home_points`.
    fn joint_positions(
        &self,
        chain: &KinematicChain,
        q: &[f64],
        home_points: &[Vector3<f64>],
    ) -> Result<Vec<Vector3<f64>>, ChainError>;

    /// Advance `(q, dq)` by `dt` under the generalized forces `effort`.
    ///
    /// # Errors
    ///
    /// [`ChainError::ArgumentLength`] naming `q`, `dq` or `effort`.
    fn simulation_step(
        &self,
        chain: &KinematicChain,
        q: &[f64],
        dq: &[f64],
        effort: &[f64],
        dt: f64,
    ) -> Result<JointStep, ChainError>;
}

/// Constant-velocity stand-in for a physics backend.
///
/// Integrates `q' = q + dq·dt`, keeps `dq`, and ignores `effort`. Warns once
/// on first use.
#[derive(Debug, Default)]
pub struct KinematicDynamics {
    warned: AtomicBool,
}

impl KinematicDynamics {
    /// New stand-in.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            warned: AtomicBool::new(false),
        }
    }
}

impl DynamicsBackend for KinematicDynamics {
    fn name(&self) -> &'static str {
        "kinematic"
    }

    fn joint_positions(
        &self,
        chain: &KinematicChain,
        q: &[f64],
        home_points: &[Vector3<f64>],
    ) -> Result<Vec<Vector3<f64>>, ChainError> {
        joint_origins(chain, q, home_points)
    }

    fn simulation_step(
        &self,
        chain: &KinematicChain,
        q: &[f64],
        dq: &[f64],
        effort: &[f64],
        dt: f64,
    ) -> Result<JointStep, ChainError> {
        chain.check_joint_vector("q", q)?;
        chain.check_joint_vector("dq", dq)?;
        chain.check_joint_vector("effort", effort)?;
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!("no physics backend linked; simulation steps ignore joint effort");
        }
        Ok(JointStep {
            q: q.iter().zip(dq).map(|(q, dq)| dq.mul_add(dt, *q)).collect(),
            dq: dq.to_vec(),
        })
    }
}
