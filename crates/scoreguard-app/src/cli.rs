//! Command-line surface of the `scoreguard` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::error::{AppError, AppResult};

/// Keeps imported episodes from scoring worse than what was grabbed.
#[derive(Debug, Parser)]
#[command(
    name = "scoreguard",
    version,
    about = "Monitors the media manager's queue and repairs imports that lost custom-format score"
)]
pub struct Cli {
    /// YAML configuration file (defaults to `config.yaml` or `config/config.yaml`).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Environment file loaded before overrides are applied.
    #[arg(long = "env", value_name = "PATH")]
    pub env_file: Option<PathBuf>,
    /// Run a single scan and exit.
    #[arg(long, conflicts_with = "test")]
    pub once: bool,
    /// Inspect one episode and exit.
    #[arg(long, num_args = 3, value_names = ["SERIES", "SEASON", "EPISODE"])]
    pub test: Option<Vec<String>>,
    /// Serve the notification endpoint alongside the scan loop.
    #[arg(long, short = 'w')]
    pub webhook: bool,
    /// Log intended actions without changing anything upstream.
    #[arg(long)]
    pub dry_run: bool,
    /// Debug logging.
    #[arg(long, short = 'v')]
    pub verbose: bool,
    /// Check configuration and connectivity, then exit.
    #[arg(long)]
    pub test_config: bool,
}

/// What the process does after bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Validate configuration and probe upstream.
    TestConfig,
    /// Report on a single episode.
    Inspect {
        /// Series title (case-insensitive substring).
        series: String,
        /// Season number.
        season: i64,
        /// Episode number.
        episode: i64,
    },
    /// One scan cycle.
    Once,
    /// Scan loop until a shutdown signal.
    Continuous,
}

impl RunMode {
    /// Label recorded on the process-wide span.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TestConfig => "test_config",
            Self::Inspect { .. } => "inspect",
            Self::Once => "once",
            Self::Continuous => "continuous",
        }
    }
}

impl Cli {
    /// Resolve the run mode; `--test-config` wins over the other modes.
    ///
    /// # Errors
    ///
    /// Returns an error when the season or episode of `--test` is not a number.
    pub fn mode(&self) -> AppResult<RunMode> {
        if self.test_config {
            return Ok(RunMode::TestConfig);
        }
        if let Some([series, season, episode]) = self.test.as_deref() {
            return Ok(RunMode::Inspect {
                series: series.clone(),
                season: parse_number("season", season)?,
                episode: parse_number("episode", episode)?,
            });
        }
        if self.once {
            return Ok(RunMode::Once);
        }
        Ok(RunMode::Continuous)
    }

    /// Level directive for the logger, if the CLI overrides configuration.
    #[must_use]
    pub const fn log_level_override(&self) -> Option<&'static str> {
        if self.verbose { Some("debug") } else { None }
    }
}

fn parse_number(name: &'static str, value: &str) -> AppResult<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::InvalidArgument {
            name,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("scoreguard").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_to_continuous() -> Result<(), Box<dyn std::error::Error>> {
        let cli = parse(&[])?;
        assert_eq!(cli.mode()?, RunMode::Continuous);
        assert!(!cli.webhook);
        assert_eq!(cli.log_level_override(), None);
        Ok(())
    }

    #[test]
    fn test_mode_takes_three_values() -> Result<(), Box<dyn std::error::Error>> {
        let cli = parse(&["--test", "The Show", "1", "5", "--dry-run", "-v"])?;
        assert_eq!(
            cli.mode()?,
            RunMode::Inspect {
                series: "The Show".into(),
                season: 1,
                episode: 5,
            }
        );
        assert!(cli.dry_run);
        assert_eq!(cli.log_level_override(), Some("debug"));
        assert!(parse(&["--test", "The Show", "1"]).is_err());
        Ok(())
    }

    #[test]
    fn once_conflicts_with_test() {
        assert!(parse(&["--once", "--test", "Show", "1", "1"]).is_err());
    }

    #[test]
    fn non_numeric_episode_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let cli = parse(&["--test", "Show", "one", "2"])?;
        assert!(matches!(
            cli.mode(),
            Err(AppError::InvalidArgument { name: "season", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_config_wins_over_once() -> Result<(), Box<dyn std::error::Error>> {
        let cli = parse(&["--once", "--test-config", "--config", "cfg.yaml", "--env", ".env.local"])?;
        assert_eq!(cli.mode()?, RunMode::TestConfig);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("cfg.yaml")));
        assert_eq!(cli.env_file.as_deref(), Some(std::path::Path::new(".env.local")));
        Ok(())
    }
}
