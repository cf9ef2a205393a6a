//! Kinematics capability behind one interface.
//!
//! Call sites hold an `Arc<dyn KinematicsBackend>` chosen once at startup.
//! [`PortableKinematics`] is the from-scratch implementation and the only
//! one built in; an accelerated backend plugs in by implementing the trait.

use std::sync::Arc;

use nalgebra::{Matrix3xX, Vector3};

use quadruped_core::{ChainError, LinalgError};

use crate::chain::KinematicChain;
use crate::kinematics;
use crate::solver::{DlsConfig, DlsSolver, IkSolution};

/// Forward kinematics, Jacobian and position IK for serial chains.
pub trait KinematicsBackend: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// End-effector position at `q`.
    ///
    /// # Errors
    ///
    /// [`ChainError::ArgumentLength`] if `q` does not match the chain.
    fn forward_position(&self, chain: &KinematicChain, q: &[f64]) -> Result<Vector3<f64>, ChainError>;

    /// End-effector position and 3×N position Jacobian at `q`.
    ///
    /// # Errors
    ///
    /// [`ChainError::ArgumentLength`] if `q` does not match the chain.
    fn position_jacobian(
        &self,
        chain: &KinematicChain,
        q: &[f64],
    ) -> Result<(Vector3<f64>, Matrix3xX<f64>), ChainError>;

    /// Position-only IK from `seed`.
    ///
    /// # Errors
    ///
    /// [`LinalgError::NotPositiveDefinite`] on invalid damping.
    fn solve_position(
        &self,
        chain: &KinematicChain,
        target: &Vector3<f64>,
        seed: &[f64],
    ) -> Result<IkSolution, LinalgError>;
}

/// Pure-Rust kinematics built on [`kinematics`] and [`DlsSolver`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableKinematics {
    solver: DlsSolver,
}

impl PortableKinematics {
    /// Backend using the given solver configuration.
    #[must_use]
    pub const fn new(config: DlsConfig) -> Self {
        Self {
            solver: DlsSolver::new(config),
        }
    }

    /// Solver configuration.
    #[must_use]
    pub const fn config(&self) -> &DlsConfig {
        self.solver.config()
    }
}

impl KinematicsBackend for PortableKinematics {
    fn name(&self) -> &'static str {
        "portable"
    }

    fn forward_position(&self, chain: &KinematicChain, q: &[f64]) -> Result<Vector3<f64>, ChainError> {
        kinematics::forward_position(chain, q)
    }

    fn position_jacobian(
        &self,
        chain: &KinematicChain,
        q: &[f64],
    ) -> Result<(Vector3<f64>, Matrix3xX<f64>), ChainError> {
        kinematics::position_jacobian(chain, q)
    }

    fn solve_position(
        &self,
        chain: &KinematicChain,
        target: &Vector3<f64>,
        seed: &[f64],
    ) -> Result<IkSolution, LinalgError> {
        self.solver.solve(chain, target, seed)
    }
}

/// The backend selected at startup.
#[must_use]
pub fn default_backend(config: DlsConfig) -> Arc<dyn KinematicsBackend> {
    Arc::new(PortableKinematics::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainBuilder;
    use approx::assert_relative_eq;

    #[test]
    fn default_backend_is_portable() {
        let backend = default_backend(DlsConfig::default());
        assert_eq!(backend.name(), "portable");
    }

    #[test]
    fn backend_delegates_to_kinematics() {
        let mut builder = ChainBuilder::new();
        builder
            .add_revolute(&[0.0, 0.0, 1.0], &[0.0; 3])
            .unwrap()
            .set_home(&[1.0, 0.0, 0.0])
            .unwrap();
        let chain = builder.build();
        let backend = default_backend(DlsConfig::default());

        let p = backend.forward_position(&chain, &[0.5]).unwrap();
        assert_relative_eq!(p, Vector3::new(0.5f64.cos(), 0.5f64.sin(), 0.0), epsilon = 1e-12);

        let (_, jac) = backend.position_jacobian(&chain, &[0.0]).unwrap();
        assert_relative_eq!(jac.column(0).into_owned(), Vector3::y(), epsilon = 1e-12);

        let solution = backend.solve_position(&chain, &p, &[0.4]).unwrap();
        assert!(solution.converged);
        assert_relative_eq!(solution.joint_positions[0], 0.5, epsilon = 1e-3);
    }
}
