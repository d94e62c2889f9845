//! Default values for every optional configuration field.
//!
//! # Design
//! - Functions rather than constants where serde needs a `default = "..."` path.
//! - Durations are expressed in whole seconds to match the YAML document.

/// Upstream request timeout in seconds.
pub const SONARR_TIMEOUT_SECS: u64 = 30;
/// Queue scan interval in seconds.
pub const MONITORING_INTERVAL_SECS: u64 = 60;
/// Wait after a forced import before queue cleanup, in seconds.
pub const POST_IMPORT_SETTLE_SECS: u64 = 8;
/// Webhook listener host.
pub const WEBHOOK_HOST: &str = "0.0.0.0";
/// Webhook listener port.
pub const WEBHOOK_PORT: u16 = 8090;
/// Delay before reconciling a grab, in seconds.
pub const IMPORT_CHECK_DELAY_SECS: u64 = 600;
/// Delay before a manual-interaction download check, in seconds.
pub const MANUAL_CHECK_DELAY_SECS: u64 = 5;
/// Requests admitted per client per window.
pub const RATE_LIMIT_MAX_REQUESTS: u32 = 30;
/// Rate-limit window in seconds.
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;
/// Score gap that triggers a forced import.
pub const FORCE_IMPORT_THRESHOLD: i64 = 10;
/// Queue cache lifetime in seconds.
pub const QUEUE_CACHE_TTL_SECS: u64 = 60;
/// Format score cache lifetime in seconds.
pub const SCORE_CACHE_TTL_SECS: u64 = 300;
/// Log level.
pub const LOG_LEVEL: &str = "info";

/// Private tracker identifiers.
pub const PRIVATE_TRACKERS: [&str; 9] = [
    "beyondhd",
    "bhd",
    "privatehd",
    "passthepopcorn",
    "ptp",
    "broadcasthenet",
    "btn",
    "redacted",
    "orpheus",
];

/// Public tracker identifiers.
pub const PUBLIC_TRACKERS: [&str; 8] = [
    "nyaa",
    "animetosho",
    "rarbg",
    "1337x",
    "thepiratebay",
    "yts",
    "eztv",
    "torrentgalaxy",
];

/// Paths probed when no configuration file is given.
pub const CONFIG_SEARCH_PATHS: [&str; 2] = ["config.yaml", "config/config.yaml"];

pub(crate) const fn sonarr_timeout() -> u64 {
    SONARR_TIMEOUT_SECS
}

pub(crate) const fn monitoring_interval() -> u64 {
    MONITORING_INTERVAL_SECS
}

pub(crate) const fn post_import_settle() -> u64 {
    POST_IMPORT_SETTLE_SECS
}

pub(crate) const fn enabled() -> bool {
    true
}

pub(crate) fn webhook_host() -> String {
    WEBHOOK_HOST.to_string()
}

pub(crate) const fn webhook_port() -> u16 {
    WEBHOOK_PORT
}

pub(crate) const fn import_check_delay() -> u64 {
    IMPORT_CHECK_DELAY_SECS
}

pub(crate) const fn manual_check_delay() -> u64 {
    MANUAL_CHECK_DELAY_SECS
}

pub(crate) const fn rate_limit_max_requests() -> u32 {
    RATE_LIMIT_MAX_REQUESTS
}

pub(crate) const fn rate_limit_window() -> u64 {
    RATE_LIMIT_WINDOW_SECS
}

pub(crate) fn private_trackers() -> Vec<String> {
    PRIVATE_TRACKERS.iter().map(ToString::to_string).collect()
}

pub(crate) fn public_trackers() -> Vec<String> {
    PUBLIC_TRACKERS.iter().map(ToString::to_string).collect()
}

pub(crate) const fn force_import_threshold() -> i64 {
    FORCE_IMPORT_THRESHOLD
}

pub(crate) const fn queue_cache_ttl() -> u64 {
    QUEUE_CACHE_TTL_SECS
}

pub(crate) const fn score_cache_ttl() -> u64 {
    SCORE_CACHE_TTL_SECS
}

pub(crate) fn log_level() -> String {
    LOG_LEVEL.to_string()
}
