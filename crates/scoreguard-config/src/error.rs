//! Error types for configuration loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration or `.env` file could not be read.
    #[error("failed to read configuration file")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// File that failed to load.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// The YAML document could not be parsed.
    #[error("failed to parse configuration file")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Source YAML error.
        source: serde_yaml::Error,
    },
    /// The `.env` file could not be parsed.
    #[error("failed to parse env file")]
    EnvFile {
        /// File that failed to parse.
        path: PathBuf,
        /// Source dotenv error.
        source: dotenvy::Error,
    },
    /// A required field has no value.
    #[error("required configuration missing")]
    MissingField {
        /// Dotted path of the missing field.
        field: &'static str,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: &'static str,
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when it is safe to show.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// An environment override could not be converted.
    #[error("invalid environment override")]
    InvalidEnv {
        /// Environment variable name.
        name: &'static str,
        /// Raw value supplied.
        value: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
}

impl ConfigError {
    /// Describe the failure including its context fields.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Io { path, source, .. } => format!("{}: {source}", path.display()),
            Self::Parse { path, source } => format!("{}: {source}", path.display()),
            Self::EnvFile { path, source } => format!("{}: {source}", path.display()),
            Self::MissingField { field } => {
                format!("{field} must be set in the configuration file or environment")
            }
            Self::InvalidField {
                section,
                field,
                value,
                reason,
            } => value.as_ref().map_or_else(
                || format!("{section}.{field}: {reason}"),
                |value| format!("{section}.{field} = {value:?}: {reason}"),
            ),
            Self::InvalidEnv {
                name,
                value,
                reason,
            } => format!("{name}={value:?}: {reason}"),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
