//! Error types for the folio-guard service.

use thiserror::Error;

/// Main error type for folio-guard operations.
///
/// The limiter itself never fails; these cover startup and I/O.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Invalid configuration values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration sources could not be read or merged
    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for folio-guard operations.
pub type Result<T> = std::result::Result<T, GuardError>;
