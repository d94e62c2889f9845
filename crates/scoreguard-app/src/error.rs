//! # Design
//!
//! - Centralize application-level errors for bootstrap and run modes.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading or validation failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: scoreguard_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: scoreguard_telemetry::TelemetryError,
    },
    /// Building the upstream client failed.
    #[error("upstream client setup failed")]
    Client {
        /// Operation identifier.
        operation: &'static str,
        /// Source client error.
        source: scoreguard_sonarr::SonarrError,
    },
    /// Webhook server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: scoreguard_api::ApiServerError,
    },
    /// A run mode could not complete against upstream.
    #[error("upstream operation failed")]
    Upstream {
        /// Operation identifier.
        operation: &'static str,
        /// Source error.
        source: anyhow::Error,
    },
    /// A command-line argument was invalid.
    #[error("invalid command-line argument")]
    InvalidArgument {
        /// Argument name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
    /// Writing a report to stdout failed.
    #[error("failed to render report")]
    Report {
        /// Source serialization error.
        source: serde_json::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: scoreguard_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: scoreguard_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn client(
        operation: &'static str,
        source: scoreguard_sonarr::SonarrError,
    ) -> Self {
        Self::Client { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: scoreguard_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn upstream(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Upstream { operation, source }
    }
}
