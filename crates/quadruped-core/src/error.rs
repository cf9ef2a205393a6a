use thiserror::Error;

/// Top-level error type for the quadruped workspace.
#[derive(Debug, Error)]
pub enum QuadrupedError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Linear algebra error: {0}")]
    Linalg(#[from] LinalgError),

    #[error("Joint angle error: {0}")]
    JointAngle(#[from] JointAngleError),

    #[error("Spine module error: {0}")]
    Spine(#[from] SpineError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`].
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Malformed kinematic-chain construction or query arguments.
///
/// Always fatal to the call that produced it; never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainError {
    #[error("Argument length error: {field} must contain {expected} elements, got {got}")]
    ArgumentLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Argument range error: {field} {message}")]
    ArgumentRange {
        field: &'static str,
        message: String,
    },
}

impl ChainError {
    /// Check that `values` has exactly `expected` elements.
    pub fn check_len(field: &'static str, values: &[f64], expected: usize) -> Result<(), Self> {
        if values.len() == expected {
            Ok(())
        } else {
            Err(Self::ArgumentLength {
                field,
                expected,
                got: values.len(),
            })
        }
    }

    /// The name of the offending argument.
    pub const fn field(&self) -> &'static str {
        match self {
            Self::ArgumentLength { field, .. } | Self::ArgumentRange { field, .. } => field,
        }
    }
}

/// Dense linear algebra failures.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum LinalgError {
    /// A Cholesky pivot had a non-positive radicand. With a positive damping
    /// term this cannot happen, so it signals a misconfigured solver.
    #[error("Matrix is not positive definite: pivot {pivot} radicand {radicand}")]
    NotPositiveDefinite { pivot: usize, radicand: f64 },
}

/// Rejections from the servo/actuator layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServoError {
    #[error("Servo angle is not finite: {0}")]
    NonFinite(f64),

    #[error("Servo rejected angle {angle_deg:.2}°: {reason}")]
    Rejected { angle_deg: f64, reason: String },

    #[error("Servo bus error: {0}")]
    Bus(String),
}

/// A single joint assignment rejected by the actuator layer.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Joint angle error in {leg} leg: {joint} joint set to {angle_deg:.2}°: {source}")]
pub struct JointAngleError {
    pub leg: &'static str,
    pub joint: &'static str,
    pub angle_deg: f64,
    #[source]
    pub source: ServoError,
}

/// Spine-module argument errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpineError {
    #[error("Spine motor channel {0} out of range, channel must be in [0, 31]")]
    ChannelOutOfRange(usize),

    #[error("Spine effort must contain {expected} elements, got {got}")]
    EffortLength { expected: usize, got: usize },
}

/// Collaborator device I/O errors.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Short transfer: expected {expected} bytes, got {got}")]
    ShortTransfer { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadruped_error_from_config_error() {
        let err = ConfigError::invalid("ik.damping", "must be > 0");
        let top: QuadrupedError = err.into();
        assert!(matches!(top, QuadrupedError::Config(_)));
        assert!(top.to_string().contains("ik.damping"));
    }

    #[test]
    fn chain_error_names_field() {
        let err = ChainError::check_len("axis", &[0.0, 1.0], 3).unwrap_err();
        assert_eq!(err.field(), "axis");
        assert_eq!(
            err,
            ChainError::ArgumentLength {
                field: "axis",
                expected: 3,
                got: 2
            }
        );
        assert!(err.to_string().contains("axis must contain 3 elements"));
    }

    #[test]
    fn check_len_accepts_exact_length() {
        assert!(ChainError::check_len("params", &[0.0; 6], 6).is_ok());
    }

    #[test]
    fn joint_angle_error_message_names_leg_and_joint() {
        let err = JointAngleError {
            leg: "Front Left",
            joint: "Knee",
            angle_deg: 231.456,
            source: ServoError::Rejected {
                angle_deg: 231.456,
                reason: "out of range".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("Front Left"));
        assert!(msg.contains("Knee"));
        assert!(msg.contains("231.46"));
        let top: QuadrupedError = err.into();
        assert!(matches!(top, QuadrupedError::JointAngle(_)));
    }

    #[test]
    fn linalg_error_is_copy() {
        let err = LinalgError::NotPositiveDefinite {
            pivot: 1,
            radicand: -0.5,
        };
        let copy = err;
        assert_eq!(err, copy);
        let top: QuadrupedError = copy.into();
        assert!(top.to_string().contains("not positive definite"));
    }

    #[test]
    fn spine_error_message() {
        let err = SpineError::ChannelOutOfRange(40);
        assert!(err.to_string().contains("40"));
    }
}
