//! Core error types for the Tracked workspace.
//!
//! Subsystem crates define their own error enums; this module holds the
//! errors raised by the shared types and the configuration layer.

use thiserror::Error;

/// Central error type for core operations.
#[derive(Error, Debug)]
pub enum TrackedError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors (malformed identifiers, invalid input)
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No home or XDG config directory for this user
    #[error("no config directory available for this user")]
    NoConfigDir,

    /// The config file is not valid TOML or has wrongly typed values
    #[error("malformed config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Encoding failed
    #[error("could not encode config as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Reading or writing the config file failed
    #[error("config file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the offending setting
        field: String,
        /// What the value must satisfy
        reason: String,
    },
}

/// Result type alias using `TrackedError`.
pub type Result<T> = std::result::Result<T, TrackedError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackedError::Validation("place id must be numeric".to_string());
        assert_eq!(err.to_string(), "validation error: place id must be numeric");

        let err = ConfigError::InvalidValue {
            field: "api.page_size".to_string(),
            reason: "must be greater than zero".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for api.page_size: must be greater than zero"
        );
    }

    #[test]
    fn test_error_from_config() {
        let config_err = ConfigError::NoConfigDir;
        let err: TrackedError = config_err.into();
        assert!(matches!(err, TrackedError::Config(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: TrackedError = io_err.into();
        assert!(matches!(err, TrackedError::Io(_)));
    }
}
