//! Validation rules for a loaded [`AppConfig`].
//!
//! Hard failures return [`ConfigError`]; soft findings come back as warning strings
//! for the caller to log.

use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::AppConfig;

/// Minimum accepted API key length.
pub const MIN_API_KEY_LEN: usize = 10;
/// Upper bound for the force-import threshold.
pub const MAX_THRESHOLD: i64 = 1000;
/// Lower bound for the monitoring interval in seconds.
pub const MIN_INTERVAL_SECS: u64 = 10;

const PLACEHOLDER_KEYS: [&str; 7] = [
    "your-api-key",
    "your-api-key-here",
    "changeme",
    "replace-me",
    "example",
    "test",
    "placeholder",
];

/// Validate the whole document.
///
/// # Errors
///
/// Returns the first failing rule.
pub fn validate(config: &AppConfig) -> ConfigResult<Vec<String>> {
    let mut warnings = Vec::new();
    validate_url(&config.sonarr.url)?;
    if let Some(warning) = validate_api_key(&config.sonarr.api_key)? {
        warnings.push(warning);
    }
    if config.sonarr.timeout == 0 {
        return Err(invalid("sonarr", "timeout", Some("0"), "must be positive"));
    }
    if config.webhook.port == 0 {
        return Err(invalid("webhook", "port", Some("0"), "must be between 1 and 65535"));
    }
    let threshold = config.decisions.force_import_threshold;
    if !(0..=MAX_THRESHOLD).contains(&threshold) {
        return Err(invalid(
            "decisions",
            "force_import_threshold",
            Some(&threshold.to_string()),
            "must be between 0 and 1000",
        ));
    }
    if config.monitoring.interval < MIN_INTERVAL_SECS {
        return Err(invalid(
            "monitoring",
            "interval",
            Some(&config.monitoring.interval.to_string()),
            "must be at least 10 seconds",
        ));
    }
    let rate_limit = config.webhook.rate_limit;
    if rate_limit.max_requests == 0 {
        return Err(invalid("webhook", "rate_limit.max_requests", Some("0"), "must be at least 1"));
    }
    if rate_limit.window == 0 {
        return Err(invalid("webhook", "rate_limit.window", Some("0"), "must be at least 1 second"));
    }
    if config
        .trackers
        .private
        .iter()
        .chain(&config.trackers.public)
        .any(|name| name.trim().is_empty())
    {
        return Err(invalid("trackers", "names", None, "must not be empty"));
    }
    if config.webhook.enabled && config.webhook.secret().is_none() {
        warnings.push(
            "webhook is enabled without a secret; inbound requests will not be authenticated"
                .to_string(),
        );
    }
    Ok(warnings)
}

/// Require an absolute http(s) URL with a host.
///
/// # Errors
///
/// Returns [`ConfigError::MissingField`] when empty and [`ConfigError::InvalidField`] otherwise.
pub fn validate_url(raw: &str) -> ConfigResult<Url> {
    if raw.trim().is_empty() {
        return Err(ConfigError::MissingField { field: "sonarr.url" });
    }
    let url = Url::parse(raw.trim())
        .map_err(|_| invalid("sonarr", "url", Some(raw), "must be a valid URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("sonarr", "url", Some(raw), "must start with http:// or https://"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("sonarr", "url", Some(raw), "must include a host"));
    }
    Ok(url)
}

/// Reject missing, short and placeholder keys; warn about unusual formats.
///
/// # Errors
///
/// Returns [`ConfigError::MissingField`] when empty and [`ConfigError::InvalidField`] otherwise.
pub fn validate_api_key(key: &str) -> ConfigResult<Option<String>> {
    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::MissingField {
            field: "sonarr.api_key",
        });
    }
    if PLACEHOLDER_KEYS.contains(&key.to_lowercase().as_str()) {
        return Err(invalid("sonarr", "api_key", None, "appears to be a placeholder"));
    }
    if key.len() < MIN_API_KEY_LEN {
        return Err(invalid("sonarr", "api_key", None, "is too short"));
    }
    let looks_standard = key.len() == 32 && key.chars().all(|c| c.is_ascii_hexdigit());
    Ok((!looks_standard)
        .then(|| "sonarr.api_key is not a 32-character hex key; check it is correct".to_string()))
}

fn invalid(
    section: &'static str,
    field: &'static str,
    value: Option<&str>,
    reason: &'static str,
) -> ConfigError {
    ConfigError::InvalidField {
        section,
        field,
        value: value.map(ToString::to_string),
        reason,
    }
}
