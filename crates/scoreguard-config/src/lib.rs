#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! File and environment configuration for scoreguard.
//!
//! Layout: `model.rs` (typed document + masking), `defaults.rs` (default values),
//! `loader.rs` (YAML/.env/environment precedence), `validate.rs` (validation rules).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, LoadedConfig, apply_env_overrides, parse_bool};
pub use model::{
    AppConfig, CacheConfig, DecisionsConfig, LoggingSettings, MASKED, MonitoringConfig,
    RateLimitConfig, SonarrConfig, TrackersConfig, WebhookConfig,
};
pub use validate::{validate, validate_api_key, validate_url};
