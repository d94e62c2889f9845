//! Error types for upstream API calls.

use scoreguard_core::Retryable;
use thiserror::Error;

/// Primary error type for upstream API calls.
#[derive(Debug, Error)]
pub enum SonarrError {
    /// The configured base URL could not be used.
    #[error("invalid upstream url")]
    InvalidUrl {
        /// Offending URL text.
        url: String,
        /// Parse failure.
        source: url::ParseError,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build http client")]
    ClientBuild {
        /// Builder failure.
        source: reqwest::Error,
    },
    /// The API key cannot be sent as a header value.
    #[error("api key contains characters not allowed in a header")]
    InvalidApiKey,
    /// The request never produced a response.
    #[error("upstream request failed")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Transport failure.
        source: reqwest::Error,
    },
    /// The upstream service answered with an error status.
    #[error("upstream returned status {status}")]
    Status {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// `message` field of the error body, when present.
        message: Option<String>,
    },
    /// The response body did not match the expected shape.
    #[error("failed to decode upstream response")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// Decode failure.
        source: reqwest::Error,
    },
}

impl SonarrError {
    /// HTTP status for [`SonarrError::Status`].
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Operation identifier, when the error came from a request.
    #[must_use]
    pub const fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Transport { operation, .. }
            | Self::Status { operation, .. }
            | Self::Decode { operation, .. } => Some(operation),
            Self::InvalidUrl { .. } | Self::ClientBuild { .. } | Self::InvalidApiKey => None,
        }
    }
}

impl Retryable for SonarrError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidUrl { .. }
            | Self::ClientBuild { .. }
            | Self::InvalidApiKey
            | Self::Decode { .. } => false,
        }
    }
}

/// Convenience alias for upstream results.
pub type SonarrResult<T> = Result<T, SonarrError>;
