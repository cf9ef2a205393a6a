//! Kinematics for serial legs described by screw axes.
//!
//! Provides product-of-exponentials forward kinematics, the position
//! Jacobian, a from-scratch Cholesky solver, damped least squares position
//! IK and a closed-form two-link planar solver.
//!
//! # Architecture
//!
//! ```text
//! ChainBuilder ──► KinematicChain ──► DlsSolver ──► joint angles
//!                        │
//!                        └──► forward_position / position_jacobian
//! ```
//!
//! Chains are built once while the robot description is assembled and are
//! read-only afterwards. The solver is reached through
//! [`KinematicsBackend`] so that call sites do not name an implementation.

pub mod backend;
pub mod chain;
pub mod cholesky;
pub mod dynamics;
pub mod kinematics;
pub mod planar;
pub mod solver;
pub mod transform;
pub mod twist;

pub use backend::{KinematicsBackend, PortableKinematics, default_backend};
pub use chain::{ChainBuilder, ChainJoint, DhParameters, KinematicChain};
pub use cholesky::CholeskyFactor;
pub use dynamics::{DynamicsBackend, JointStep, KinematicDynamics};
pub use kinematics::{forward_position, joint_origins, position_jacobian, spatial_jacobian};
pub use planar::{PlanarAngles, PlanarLeg};
pub use solver::{DlsConfig, DlsSolver, IkSolution};
pub use transform::Transform;
pub use twist::Twist;
