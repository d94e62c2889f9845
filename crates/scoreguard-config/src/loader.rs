//! YAML + `.env` + environment configuration loader.
//!
//! # Design
//! - Precedence, lowest first: built-in defaults, YAML document, `.env` file, process
//!   environment.
//! - `.env` entries are read into a map instead of the process environment; a variable
//!   already set in the environment wins, as with `dotenv` semantics.
//! - Overrides are resolved through a lookup closure so tests never touch global state.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::defaults::CONFIG_SEARCH_PATHS;
use crate::error::{ConfigError, ConfigResult};
use crate::model::AppConfig;
use crate::validate::validate;

const DEFAULT_ENV_FILE: &str = ".env";

/// Result of a successful load.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Validated configuration.
    pub config: AppConfig,
    /// YAML file that was read, if any.
    pub source: Option<PathBuf>,
    /// Non-fatal validation findings.
    pub warnings: Vec<String>,
}

/// Builder for configuration loading.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
    search_root: PathBuf,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader that searches the working directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_file: None,
            search_root: PathBuf::from("."),
        }
    }

    /// Read this YAML file instead of searching. The file must exist.
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Read this `.env` file instead of the optional `./.env`. The file must exist.
    #[must_use]
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Directory used for the default search paths and the implicit `.env`.
    #[must_use]
    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search_root = root.into();
        self
    }

    /// Load using the process environment and the `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error when a file cannot be read or parsed, an override is malformed,
    /// or validation fails.
    pub fn load(&self) -> ConfigResult<LoadedConfig> {
        let dotenv = self.read_env_file()?;
        self.load_with(|name| {
            std::env::var(name)
                .ok()
                .or_else(|| dotenv.get(name).cloned())
        })
    }

    /// Load using `lookup` for environment overrides.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`], minus `.env` handling.
    pub fn load_with<F>(&self, lookup: F) -> ConfigResult<LoadedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = self.resolve_config_path()?;
        let mut config = match &source {
            Some(path) => read_yaml(path)?,
            None => {
                debug!("no configuration file found; using defaults and environment");
                AppConfig::default()
            }
        };
        apply_env_overrides(&mut config, lookup)?;
        let warnings = validate(&config)?;
        if let Some(path) = &source {
            info!(path = %path.display(), "configuration loaded");
        }
        Ok(LoadedConfig {
            config,
            source,
            warnings,
        })
    }

    fn resolve_config_path(&self) -> ConfigResult<Option<PathBuf>> {
        if let Some(path) = &self.config_path {
            if !path.is_file() {
                return Err(ConfigError::Io {
                    operation: "config.open",
                    path: path.clone(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            return Ok(Some(path.clone()));
        }
        Ok(CONFIG_SEARCH_PATHS
            .iter()
            .map(|candidate| self.search_root.join(candidate))
            .find(|candidate| candidate.is_file()))
    }

    fn read_env_file(&self) -> ConfigResult<HashMap<String, String>> {
        let (path, required) = self.env_file.as_ref().map_or_else(
            || (self.search_root.join(DEFAULT_ENV_FILE), false),
            |path| (path.clone(), true),
        );
        if !path.is_file() {
            if required {
                return Err(ConfigError::Io {
                    operation: "env_file.open",
                    path,
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            return Ok(HashMap::new());
        }
        let entries = dotenvy::from_path_iter(&path).map_err(|source| ConfigError::EnvFile {
            path: path.clone(),
            source,
        })?;
        let mut values = HashMap::new();
        for entry in entries {
            let (key, value) = entry.map_err(|source| ConfigError::EnvFile {
                path: path.clone(),
                source,
            })?;
            values.insert(key, value);
        }
        debug!(path = %path.display(), entries = values.len(), "env file read");
        Ok(values)
    }
}

fn read_yaml(path: &Path) -> ConfigResult<AppConfig> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.to_path_buf(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse `true/yes/1/on` and `false/no/0/off`, case-insensitively.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Apply every supported environment override.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnv`] when a value cannot be converted.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("SONARR_URL") {
        config.sonarr.url = value;
    }
    if let Some(value) = lookup("SONARR_API_KEY") {
        config.sonarr.api_key = value;
    }
    if let Some(value) = number(&lookup, "SONARR_TIMEOUT")? {
        config.sonarr.timeout = value;
    }
    if let Some(value) = flag(&lookup, "WEBHOOK_ENABLED")? {
        config.webhook.enabled = value;
    }
    if let Some(value) = lookup("WEBHOOK_HOST") {
        config.webhook.host = value;
    }
    if let Some(value) = number(&lookup, "WEBHOOK_PORT")? {
        config.webhook.port = value;
    }
    if let Some(value) = lookup("WEBHOOK_SECRET") {
        config.webhook.secret = Some(value);
    }
    if let Some(value) = number(&lookup, "WEBHOOK_IMPORT_CHECK_DELAY")? {
        config.webhook.import_check_delay = value;
    }
    if let Some(value) = number(&lookup, "WEBHOOK_RATE_LIMIT")? {
        config.webhook.rate_limit.max_requests = value;
    }
    if let Some(value) = number(&lookup, "MONITORING_INTERVAL")? {
        config.monitoring.interval = value;
    }
    if let Some(value) = flag(&lookup, "MONITORING_DETECT_REPEATED_GRABS")? {
        config.monitoring.detect_repeated_grabs = value;
    }
    if let Some(value) = number(&lookup, "FORCE_IMPORT_THRESHOLD")? {
        config.decisions.force_import_threshold = value;
    }
    if let Some(value) = lookup("LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Some(value) = lookup("LOG_FORMAT") {
        config.logging.format = Some(value);
    }
    Ok(())
}

fn flag<F>(lookup: &F, name: &'static str) -> ConfigResult<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| {
            parse_bool(&value).ok_or(ConfigError::InvalidEnv {
                name,
                value,
                reason: "expected a boolean",
            })
        })
        .transpose()
}

fn number<F, T>(lookup: &F, name: &'static str) -> ConfigResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(name)
        .map(|value| {
            value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnv {
                name,
                value,
                reason: "expected a number in range",
            })
        })
        .transpose()
}
