//! Typed configuration document.
//!
//! Every section deserialises with defaults so a partial YAML file (or none at all)
//! still produces a complete [`AppConfig`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::defaults;

/// Placeholder used for masked secrets.
pub const MASKED: &str = "***MASKED***";

const SENSITIVE_KEYS: [&str; 4] = ["api_key", "secret", "password", "token"];

/// Full application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Upstream connection.
    pub sonarr: SonarrConfig,
    /// Periodic queue scanning.
    pub monitoring: MonitoringConfig,
    /// Inbound notification receiver.
    pub webhook: WebhookConfig,
    /// Tracker classification lists.
    pub trackers: TrackersConfig,
    /// Decision thresholds.
    pub decisions: DecisionsConfig,
    /// Cache lifetimes.
    pub cache: CacheConfig,
    /// Log output.
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// JSON view with credentials masked, suitable for logging.
    #[must_use]
    pub fn masked(&self) -> Value {
        serde_json::to_value(self).map_or(Value::Null, mask_value)
    }
}

fn mask_value(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let lowered = key.to_lowercase();
                    let masked = if SENSITIVE_KEYS.iter().any(|needle| lowered.contains(needle)) {
                        match &value {
                            Value::Null => Value::Null,
                            Value::String(text) if text.is_empty() => Value::Null,
                            _ => Value::String(MASKED.to_string()),
                        }
                    } else {
                        mask_value(value)
                    };
                    (key, masked)
                })
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(mask_value).collect()),
        other => other,
    }
}

/// Upstream connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SonarrConfig {
    /// Base URL, e.g. `http://localhost:8989`.
    pub url: String,
    /// API key sent as `X-Api-Key`.
    pub api_key: String,
    /// Request timeout in seconds.
    #[serde(default = "defaults::sonarr_timeout")]
    pub timeout: u64,
}

impl SonarrConfig {
    /// Request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for SonarrConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            timeout: defaults::sonarr_timeout(),
        }
    }
}

/// Queue scanning settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Seconds between scans.
    #[serde(default = "defaults::monitoring_interval")]
    pub interval: u64,
    /// Run the repeated-grab check every other cycle.
    #[serde(default = "defaults::enabled")]
    pub detect_repeated_grabs: bool,
    /// Seconds to wait after a forced import before cleaning the queue.
    #[serde(default = "defaults::post_import_settle")]
    pub post_import_settle: u64,
}

impl MonitoringConfig {
    /// Interval between scans.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Wait after a forced import.
    #[must_use]
    pub const fn post_import_settle(&self) -> Duration {
        Duration::from_secs(self.post_import_settle)
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval: defaults::monitoring_interval(),
            detect_repeated_grabs: true,
            post_import_settle: defaults::post_import_settle(),
        }
    }
}

/// Per-client rate limit for inbound requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests admitted per window.
    #[serde(default = "defaults::rate_limit_max_requests")]
    pub max_requests: u32,
    /// Window length in seconds.
    #[serde(default = "defaults::rate_limit_window")]
    pub window: u64,
}

impl RateLimitConfig {
    /// Window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: defaults::rate_limit_max_requests(),
            window: defaults::rate_limit_window(),
        }
    }
}

/// Inbound notification receiver settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Start the receiver in continuous mode.
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
    /// Listener host.
    #[serde(default = "defaults::webhook_host")]
    pub host: String,
    /// Listener port.
    #[serde(default = "defaults::webhook_port")]
    pub port: u16,
    /// Shared secret; `None` disables authentication.
    pub secret: Option<String>,
    /// Seconds before a grab is reconciled.
    #[serde(default = "defaults::import_check_delay")]
    pub import_check_delay: u64,
    /// Seconds before a manual-interaction download check.
    #[serde(default = "defaults::manual_check_delay")]
    pub manual_check_delay: u64,
    /// Per-client rate limit.
    pub rate_limit: RateLimitConfig,
}

impl WebhookConfig {
    /// Secret when set and non-blank.
    #[must_use]
    pub fn secret(&self) -> Option<&str> {
        self.secret
            .as_deref()
            .map(str::trim)
            .filter(|secret| !secret.is_empty())
    }

    /// Delay before a grab is reconciled.
    #[must_use]
    pub const fn import_check_delay(&self) -> Duration {
        Duration::from_secs(self.import_check_delay)
    }

    /// Delay before a manual-interaction download check.
    #[must_use]
    pub const fn manual_check_delay(&self) -> Duration {
        Duration::from_secs(self.manual_check_delay)
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: defaults::webhook_host(),
            port: defaults::webhook_port(),
            secret: None,
            import_check_delay: defaults::import_check_delay(),
            manual_check_delay: defaults::manual_check_delay(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Tracker identifier lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackersConfig {
    /// Private tracker identifiers.
    #[serde(default = "defaults::private_trackers")]
    pub private: Vec<String>,
    /// Public tracker identifiers.
    #[serde(default = "defaults::public_trackers")]
    pub public: Vec<String>,
}

impl Default for TrackersConfig {
    fn default() -> Self {
        Self {
            private: defaults::private_trackers(),
            public: defaults::public_trackers(),
        }
    }
}

/// Decision thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionsConfig {
    /// Score gap that triggers a forced import.
    #[serde(default = "defaults::force_import_threshold")]
    pub force_import_threshold: i64,
}

impl Default for DecisionsConfig {
    fn default() -> Self {
        Self {
            force_import_threshold: defaults::force_import_threshold(),
        }
    }
}

/// Cache lifetimes in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Queue snapshot lifetime.
    #[serde(default = "defaults::queue_cache_ttl")]
    pub queue_ttl: u64,
    /// Format score lifetime.
    #[serde(default = "defaults::score_cache_ttl")]
    pub score_ttl: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            queue_ttl: defaults::queue_cache_ttl(),
            score_ttl: defaults::score_cache_ttl(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level or `EnvFilter` directive.
    #[serde(default = "defaults::log_level")]
    pub level: String,
    /// `json`, `pretty` or `text`; inferred from the build profile when absent.
    pub format: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            format: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_is_completed_with_defaults() -> Result<(), serde_yaml::Error> {
        let config: AppConfig = serde_yaml::from_str(
            "sonarr:\n  url: http://sonarr:8989\nwebhook:\n  port: 9000\n  rate_limit:\n    max_requests: 5\n",
        )?;
        assert_eq!(config.sonarr.url, "http://sonarr:8989");
        assert_eq!(config.sonarr.timeout, 30);
        assert_eq!(config.webhook.port, 9000);
        assert_eq!(config.webhook.host, "0.0.0.0");
        assert_eq!(config.webhook.rate_limit.max_requests, 5);
        assert_eq!(config.webhook.rate_limit.window, 60);
        assert_eq!(config.decisions.force_import_threshold, 10);
        assert!(config.trackers.private.contains(&"btn".to_string()));
        assert_eq!(config.webhook.import_check_delay(), Duration::from_secs(600));
        Ok(())
    }

    #[test]
    fn masked_view_hides_credentials() {
        let mut config = AppConfig::default();
        config.sonarr.api_key = "0123456789abcdef".into();
        config.webhook.secret = Some(String::new());

        let masked = config.masked();
        assert_eq!(masked["sonarr"]["api_key"], MASKED);
        assert_eq!(masked["webhook"]["secret"], Value::Null);
        assert_eq!(masked["webhook"]["port"], 8090);
    }

    #[test]
    fn blank_secret_counts_as_unset() {
        let mut webhook = WebhookConfig::default();
        assert_eq!(webhook.secret(), None);
        webhook.secret = Some("   ".into());
        assert_eq!(webhook.secret(), None);
        webhook.secret = Some("s3cret".into());
        assert_eq!(webhook.secret(), Some("s3cret"));
    }
}
