use std::collections::HashMap;
use std::error::Error;
use std::fs;

use scoreguard_config::{ConfigError, ConfigLoader, MASKED};
use serial_test::serial;
use tempfile::TempDir;

const API_KEY: &str = "0123456789abcdef0123456789abcdef";

fn no_env(_: &str) -> Option<String> {
    None
}

fn env_map(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

fn write_config(dir: &TempDir, relative: &str, body: &str) -> Result<(), Box<dyn Error>> {
    let path = dir.path().join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)?;
    Ok(())
}

#[test]
fn yaml_document_is_found_in_search_paths() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    write_config(
        &dir,
        "config/config.yaml",
        &format!(
            "sonarr:\n  url: http://sonarr:8989\n  api_key: {API_KEY}\n\
             decisions:\n  force_import_threshold: 20\n\
             trackers:\n  private: [beyondhd]\n  public: [nyaa]\n"
        ),
    )?;

    let loaded = ConfigLoader::new()
        .with_search_root(dir.path())
        .load_with(no_env)?;

    assert_eq!(loaded.config.sonarr.url, "http://sonarr:8989");
    assert_eq!(loaded.config.decisions.force_import_threshold, 20);
    assert_eq!(loaded.config.trackers.private, vec!["beyondhd".to_string()]);
    assert_eq!(loaded.config.webhook.port, 8090);
    assert_eq!(loaded.config.monitoring.interval, 60);
    assert!(loaded.source.is_some());
    Ok(())
}

#[test]
fn environment_overrides_win_over_the_document() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    write_config(
        &dir,
        "config.yaml",
        &format!("sonarr:\n  url: http://file:8989\n  api_key: {API_KEY}\nwebhook:\n  port: 8000\n"),
    )?;

    let loaded = ConfigLoader::new()
        .with_search_root(dir.path())
        .load_with(env_map(&[
            ("SONARR_URL", "https://env.example:8989"),
            ("WEBHOOK_PORT", "9100"),
            ("WEBHOOK_SECRET", "shared"),
            ("MONITORING_DETECT_REPEATED_GRABS", "no"),
        ]))?;

    assert_eq!(loaded.config.sonarr.url, "https://env.example:8989");
    assert_eq!(loaded.config.webhook.port, 9100);
    assert_eq!(loaded.config.webhook.secret(), Some("shared"));
    assert!(!loaded.config.monitoring.detect_repeated_grabs);
    assert!(loaded.warnings.is_empty());
    Ok(())
}

#[test]
fn missing_document_uses_defaults_and_environment() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let loaded = ConfigLoader::new()
        .with_search_root(dir.path())
        .load_with(env_map(&[
            ("SONARR_URL", "http://localhost:8989"),
            ("SONARR_API_KEY", API_KEY),
        ]))?;

    assert!(loaded.source.is_none());
    assert_eq!(loaded.config.decisions.force_import_threshold, 10);
    assert!(
        loaded
            .warnings
            .iter()
            .any(|warning| warning.contains("without a secret"))
    );
    Ok(())
}

#[test]
fn missing_credentials_fail_validation() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let err = ConfigLoader::new()
        .with_search_root(dir.path())
        .load_with(no_env)
        .expect_err("url is required");
    assert!(matches!(
        err,
        ConfigError::MissingField {
            field: "sonarr.url"
        }
    ));

    let err = ConfigLoader::new()
        .with_search_root(dir.path())
        .load_with(env_map(&[
            ("SONARR_URL", "http://localhost:8989"),
            ("SONARR_API_KEY", "changeme"),
        ]))
        .expect_err("placeholder key");
    assert!(err.detail().contains("placeholder"));
    Ok(())
}

#[test]
fn explicit_paths_must_exist() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let err = ConfigLoader::new()
        .with_config_path(dir.path().join("absent.yaml"))
        .load_with(no_env)
        .expect_err("explicit config must exist");
    assert!(matches!(err, ConfigError::Io { .. }));

    let err = ConfigLoader::new()
        .with_search_root(dir.path())
        .with_env_file(dir.path().join("absent.env"))
        .load()
        .expect_err("explicit env file must exist");
    assert!(matches!(err, ConfigError::Io { .. }));
    Ok(())
}

#[test]
fn malformed_yaml_reports_parse_error() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    write_config(&dir, "config.yaml", "sonarr: [unterminated\n")?;
    let err = ConfigLoader::new()
        .with_search_root(dir.path())
        .load_with(no_env)
        .expect_err("invalid yaml");
    assert!(matches!(err, ConfigError::Parse { .. }));
    Ok(())
}

#[test]
#[serial]
fn env_file_supplies_overrides() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    write_config(
        &dir,
        ".env",
        &format!(
            "SCOREGUARD_UNUSED=1\nSONARR_URL=http://dotenv:8989\nSONARR_API_KEY={API_KEY}\n\
             WEBHOOK_SECRET=from-dotenv\nFORCE_IMPORT_THRESHOLD=15\n"
        ),
    )?;

    let loaded = ConfigLoader::new().with_search_root(dir.path()).load()?;

    if std::env::var_os("SONARR_URL").is_none() {
        assert_eq!(loaded.config.sonarr.url, "http://dotenv:8989");
    }
    if std::env::var_os("FORCE_IMPORT_THRESHOLD").is_none() {
        assert_eq!(loaded.config.decisions.force_import_threshold, 15);
    }
    Ok(())
}

#[test]
fn masked_view_hides_credentials() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let loaded = ConfigLoader::new()
        .with_search_root(dir.path())
        .load_with(env_map(&[
            ("SONARR_URL", "http://localhost:8989"),
            ("SONARR_API_KEY", API_KEY),
            ("WEBHOOK_SECRET", "shared"),
        ]))?;

    let masked = loaded.config.masked();
    assert_eq!(masked["sonarr"]["api_key"], MASKED);
    assert_eq!(masked["webhook"]["secret"], MASKED);
    assert_eq!(masked["sonarr"]["url"], "http://localhost:8989");
    Ok(())
}
