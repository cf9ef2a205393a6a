//! TOML configuration loading shared by every crate that owns a config
//! section.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::ConfigError;

/// A configuration section that can check its own invariants.
pub trait Validate {
    /// Validate configuration. Returns Err on invalid values.
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Parse and validate a configuration from a TOML string.
pub fn from_toml_str<T>(content: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Validate,
{
    let config: T = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load and validate a configuration from a TOML file.
pub fn from_file<T>(path: impl AsRef<Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Validate,
{
    let content = std::fs::read_to_string(path)?;
    from_toml_str(&content)
}

/// Reject values that are not strictly positive and finite.
pub fn require_positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} (must be > 0)")))
    }
}
