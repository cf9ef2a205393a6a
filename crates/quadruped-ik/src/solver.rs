//! Damped least squares position IK solver.
//!
//! Iterates `Δq = Jᵀ(JJᵀ + λI)⁻¹e` on the 3×N position Jacobian. The 3×3
//! normal matrix is factored with [`cholesky`](crate::cholesky); `λ` is a
//! fixed regularizer, not adapted per iteration.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::trace;

use quadruped_core::config::require_positive;
use quadruped_core::{ConfigError, LinalgError, Validate};

use crate::chain::KinematicChain;
use crate::cholesky::CholeskyFactor;
use crate::kinematics::position_jacobian_unchecked;

/// Configuration for the DLS solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DlsConfig {
    /// Maximum solver iterations.
    pub max_iterations: u32,
    /// Position error tolerance, in chain length units.
    pub tolerance: f64,
    /// Damping added to the diagonal of `JJᵀ`. Must be positive.
    pub damping: f64,
}

impl Default for DlsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-4,
            damping: 20e-3,
        }
    }
}

impl Validate for DlsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::invalid("ik.max_iterations", "must be > 0"));
        }
        require_positive("ik.tolerance", self.tolerance)?;
        require_positive("ik.damping", self.damping)
    }
}

/// Result of an IK solve.
///
/// Always carries a configuration. `converged == false` means the iteration
/// budget ran out; the configuration is the last iterate.
#[derive(Debug, Clone, PartialEq)]
pub struct IkSolution {
    /// Solved joint positions.
    pub joint_positions: Vec<f64>,
    /// Whether the solver converged within tolerance.
    pub converged: bool,
    /// Number of update steps taken.
    pub iterations: u32,
    /// Final position error norm.
    pub position_error: f64,
}

/// Damped least squares IK solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct DlsSolver {
    config: DlsConfig,
}

impl DlsSolver {
    /// Create a new solver with the given configuration.
    #[must_use]
    pub const fn new(config: DlsConfig) -> Self {
        Self { config }
    }

    /// Create a solver with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DlsConfig::default())
    }

    /// Solver configuration.
    #[must_use]
    pub const fn config(&self) -> &DlsConfig {
        &self.config
    }

    /// Solve for joint positions placing the end-effector at `target`.
    ///
    /// `seed` warm-starts the iteration; an empty or wrong-length seed
    /// starts from all zeros.
    ///
    /// # Errors
    ///
    /// [`LinalgError::NotPositiveDefinite`] if the damped normal matrix
    /// cannot be factored, which only happens with non-positive damping.
    pub fn solve(
        &self,
        chain: &KinematicChain,
        target: &Vector3<f64>,
        seed: &[f64],
    ) -> Result<IkSolution, LinalgError> {
        let n = chain.dof();
        let mut q = if seed.len() == n {
            seed.to_vec()
        } else {
            vec![0.0; n]
        };
        let tolerance_sq = self.config.tolerance * self.config.tolerance;
        let damping = Matrix3::identity() * self.config.damping;

        for iteration in 0..self.config.max_iterations {
            let (position, jacobian) = position_jacobian_unchecked(chain, &q);
            let error = target - position;
            if error.norm_squared() < tolerance_sq {
                return Ok(IkSolution {
                    joint_positions: q,
                    converged: true,
                    iterations: iteration,
                    position_error: error.norm(),
                });
            }

            let normal: Matrix3<f64> = &jacobian * jacobian.transpose() + damping;
            let y = CholeskyFactor::new(normal)?.solve(&error);
            let dq = jacobian.transpose() * y;
            for (qi, dqi) in q.iter_mut().zip(dq.iter()) {
                *qi += dqi;
            }
        }

        let (position, _) = position_jacobian_unchecked(chain, &q);
        let error = (target - position).norm();
        let converged = error * error < tolerance_sq;
        if !converged {
            trace!(
                iterations = self.config.max_iterations,
                position_error = error,
                "IK exhausted iteration budget"
            );
        }
        Ok(IkSolution {
            joint_positions: q,
            converged,
            iterations: self.config.max_iterations,
            position_error: error,
        })
    }
}
