//! # Design
//!
//! - One error type covers the listener lifecycle: resolve, bind, serve.
//! - Messages stay constant; the endpoint travels in fields.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::net::SocketAddr;

/// Result alias for webhook server operations.
pub type ApiServerResult<T> = std::result::Result<T, ApiServerError>;

/// Listener lifecycle failures.
#[derive(Debug)]
pub enum ApiServerError {
    /// The configured host and port did not resolve to a socket address.
    Resolve {
        /// `host:port` as configured.
        endpoint: String,
        /// Resolver error.
        source: io::Error,
    },
    /// The listener could not bind.
    Bind {
        /// Resolved address.
        addr: SocketAddr,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The accept loop ended with an error.
    Serve {
        /// Listening address.
        addr: SocketAddr,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl ApiServerError {
    pub(crate) fn unresolved(host: &str, port: u16) -> Self {
        Self::Resolve {
            endpoint: format!("{host}:{port}"),
            source: io::Error::new(io::ErrorKind::NotFound, "no socket address for host"),
        }
    }
}

impl Display for ApiServerError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::Resolve { .. } => "failed to resolve webhook listen address",
            Self::Bind { .. } => "failed to bind webhook listener",
            Self::Serve { .. } => "webhook server terminated unexpectedly",
        };
        formatter.write_str(message)
    }
}

impl Error for ApiServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Resolve { source, .. } | Self::Bind { source, .. } | Self::Serve { source, .. } => {
                Some(source)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_endpoint_keeps_host_and_port() {
        let err = ApiServerError::unresolved("sonarr.invalid", 8090);
        assert!(matches!(
            &err,
            ApiServerError::Resolve { endpoint, .. } if endpoint == "sonarr.invalid:8090"
        ));
        assert_eq!(err.to_string(), "failed to resolve webhook listen address");
        assert!(err.source().is_some());
    }

    #[test]
    fn bind_failure_reports_source() -> Result<(), Box<dyn Error>> {
        let err = ApiServerError::Bind {
            addr: "127.0.0.1:8090".parse()?,
            source: io::Error::new(io::ErrorKind::AddrInUse, "busy"),
        };
        assert_eq!(err.to_string(), "failed to bind webhook listener");
        let source = err.source().ok_or("missing source")?;
        assert_eq!(source.to_string(), "busy");
        Ok(())
    }
}
