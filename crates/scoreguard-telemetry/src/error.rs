//! Error types for telemetry operations.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use prometheus::Error as PrometheusError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while installing the logger or maintaining the metrics registry.
#[derive(Debug)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed.
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        source: tracing_subscriber::util::TryInitError,
    },
    /// A Prometheus collector could not be built or registered.
    Collector {
        /// Metric name.
        name: &'static str,
        /// `true` when construction succeeded and registration failed.
        registering: bool,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// The registry could not be rendered as exposition text.
    Render {
        /// Encoder or UTF-8 conversion error.
        source: Box<dyn Error + Send + Sync>,
    },
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriberInstall { .. } => {
                formatter.write_str("tracing subscriber already installed")
            }
            Self::Collector {
                name,
                registering: true,
                ..
            } => write!(formatter, "metric '{name}' could not be registered"),
            Self::Collector { name, .. } => write!(formatter, "metric '{name}' could not be built"),
            Self::Render { .. } => formatter.write_str("metrics could not be rendered"),
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SubscriberInstall { source } => Some(source),
            Self::Collector { source, .. } => Some(source),
            Self::Render { source } => Some(source.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_message_names_the_stage() {
        let err = TelemetryError::Collector {
            name: "pending_grabs",
            registering: true,
            source: PrometheusError::AlreadyReg,
        };
        assert_eq!(err.to_string(), "metric 'pending_grabs' could not be registered");
        assert!(err.source().is_some());

        let err = TelemetryError::Collector {
            name: "pending_grabs",
            registering: false,
            source: PrometheusError::Msg("bad label".into()),
        };
        assert_eq!(err.to_string(), "metric 'pending_grabs' could not be built");
    }

    #[test]
    fn render_failures_keep_their_source() -> std::result::Result<(), Box<dyn Error>> {
        let source = String::from_utf8(vec![0, 159])
            .err()
            .ok_or("expected a utf-8 error")?;
        let err = TelemetryError::Render {
            source: Box::new(source),
        };
        assert_eq!(err.to_string(), "metrics could not be rendered");
        assert!(err.source().is_some());
        Ok(())
    }
}
