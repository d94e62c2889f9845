//! Boot sequence: configuration, logging, upstream client, then the selected run mode.

use std::path::PathBuf;
use std::sync::Arc;

use scoreguard_api::{ApiServer, ApiServerResult, WebhookSettings, WebhookState};
use scoreguard_config::{AppConfig, ConfigLoader};
use scoreguard_core::MediaLibrary;
use scoreguard_sonarr::{SonarrClient, SonarrSettings};
use scoreguard_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics, init_logging};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::{Cli, RunMode};
use crate::error::{AppError, AppResult};
use crate::orchestrator::{Orchestrator, RunOptions};

/// Dependencies resolved before any run mode starts.
pub(crate) struct BootstrapDependencies {
    config: AppConfig,
    source: Option<PathBuf>,
    warnings: Vec<String>,
    upstream: Arc<dyn MediaLibrary>,
    metrics: Metrics,
}

impl BootstrapDependencies {
    /// Load configuration and build production dependencies for the binary entrypoint.
    pub(crate) fn from_cli(cli: &Cli) -> AppResult<Self> {
        let mut loader = ConfigLoader::new();
        if let Some(path) = &cli.config {
            loader = loader.with_config_path(path);
        }
        if let Some(path) = &cli.env_file {
            loader = loader.with_env_file(path);
        }
        let loaded = loader
            .load()
            .map_err(|err| AppError::config("config.load", err))?;

        let client = SonarrClient::new(&SonarrSettings {
            url: loaded.config.sonarr.url.clone(),
            api_key: loaded.config.sonarr.api_key.clone(),
            timeout: loaded.config.sonarr.timeout(),
        })
        .map_err(|err| AppError::client("sonarr_client.new", err))?;
        let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

        Ok(Self {
            config: loaded.config,
            source: loaded.source,
            warnings: loaded.warnings,
            upstream: Arc::new(client),
            metrics,
        })
    }
}

/// Entry point for the boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, logging, or the selected run mode fails.
pub async fn run_app(cli: Cli) -> AppResult<()> {
    let mode = cli.mode()?;
    let dependencies = BootstrapDependencies::from_cli(&cli)?;

    let logging = &dependencies.config.logging;
    init_logging(&LoggingConfig {
        level: cli.log_level_override().unwrap_or(logging.level.as_str()),
        format: LogFormat::from_setting(logging.format.as_deref()),
        ..LoggingConfig::default()
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new(mode.as_str());

    let options = RunOptions {
        dry_run: cli.dry_run,
        webhook: cli.webhook,
    };
    Box::pin(run_app_with(dependencies, mode, options)).await
}

/// Boot sequence over injected dependencies.
pub(crate) async fn run_app_with(
    dependencies: BootstrapDependencies,
    mode: RunMode,
    options: RunOptions,
) -> AppResult<()> {
    let BootstrapDependencies {
        config,
        source,
        warnings,
        upstream,
        metrics,
    } = dependencies;

    let source = source.map_or_else(|| "defaults".to_string(), |path| path.display().to_string());
    info!(
        source = %source,
        mode = mode.as_str(),
        "scoreguard starting"
    );
    for warning in &warnings {
        warn!(warning = %warning, "configuration warning");
    }
    debug!(config = %config.masked(), "effective configuration");
    if options.dry_run {
        warn!("dry run: no changes will be made upstream");
    }

    let orchestrator = Orchestrator::new(config.clone(), upstream, options, metrics.clone());
    let result = match mode {
        RunMode::TestConfig => {
            let report = orchestrator.test_config().await;
            report.and_then(|report| print_report(&report))
        }
        RunMode::Inspect {
            series,
            season,
            episode,
        } => {
            let report = orchestrator.inspect(&series, season, episode).await;
            report.and_then(|report| print_report(&report))
        }
        RunMode::Once => orchestrator.run_once().await.map(|summary| {
            info!(
                processed = summary.processed,
                forced = summary.forced,
                removed = summary.removed,
                "single cycle complete"
            );
        }),
        RunMode::Continuous => run_continuous(&orchestrator, &config, options, metrics).await,
    };
    orchestrator.shutdown().await;
    result
}

async fn run_continuous(
    orchestrator: &Orchestrator,
    config: &AppConfig,
    options: RunOptions,
    metrics: Metrics,
) -> AppResult<()> {
    let shutdown = orchestrator.shutdown_token();
    let forwarder = orchestrator.spawn_metrics_forwarder();
    let signals = spawn_signal_listener(shutdown.clone());

    let server = if options.webhook && config.webhook.enabled {
        let host = config.webhook.host.clone();
        let port = config.webhook.port;
        let state = WebhookState::new(
            orchestrator.correlator(),
            orchestrator.events().clone(),
            metrics,
            WebhookSettings {
                secret: config.webhook.secret().map(str::to_string),
                max_requests: config.webhook.rate_limit.max_requests,
                window: config.webhook.rate_limit.window(),
            },
        );
        let api = ApiServer::new(state);
        let token = shutdown.clone();
        Some(tokio::spawn(async move {
            let served = api.serve(&host, port, token.clone()).await;
            if served.is_err() {
                token.cancel();
            }
            served
        }))
    } else {
        if options.webhook {
            warn!("webhook requested but disabled in configuration");
        }
        None
    };

    orchestrator.run_continuous().await;
    shutdown.cancel();

    let result = match server {
        Some(server) => join_server(server).await,
        None => Ok(()),
    };
    signals.abort();
    if let Err(err) = forwarder.await {
        warn!(error = %err, "metrics forwarder join failed");
    }
    result
}

async fn join_server(server: JoinHandle<ApiServerResult<()>>) -> AppResult<()> {
    match server.await {
        Ok(result) => result.map_err(|err| AppError::api_server("api_server.serve", err)),
        Err(err) => {
            warn!(error = %err, "webhook server join failed");
            Ok(())
        }
    }
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM.
fn spawn_signal_listener(shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    let _ = signal.recv().await;
                }
                Err(err) => {
                    warn!(error = %err, "failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => info!("received ctrl-c, shutting down"),
            () = terminate => info!("received terminate signal, shutting down"),
            () = shutdown.cancelled() => return,
        }
        shutdown.cancel();
    })
}

fn print_report<T: Serialize>(report: &T) -> AppResult<()> {
    let rendered =
        serde_json::to_string_pretty(report).map_err(|source| AppError::Report { source })?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreguard_test_support::fixtures;
    use scoreguard_test_support::mocks::FakeLibrary;

    fn dependencies(
        library: Arc<FakeLibrary>,
    ) -> Result<BootstrapDependencies, Box<dyn std::error::Error>> {
        Ok(BootstrapDependencies {
            config: AppConfig::default(),
            source: None,
            warnings: vec!["sonarr.api_key is not set".to_string()],
            upstream: library,
            metrics: Metrics::new()?,
        })
    }

    #[tokio::test]
    async fn once_mode_scans_the_queue() -> Result<(), Box<dyn std::error::Error>> {
        let library = Arc::new(FakeLibrary::default());
        library.add_series(fixtures::series(1, "The Show", 1));
        run_app_with(
            dependencies(Arc::clone(&library))?,
            RunMode::Once,
            RunOptions::default(),
        )
        .await?;
        assert!(library.queue_calls() >= 1);
        Ok(())
    }

    #[tokio::test]
    async fn inspect_of_unknown_series_fails() -> Result<(), Box<dyn std::error::Error>> {
        let library = Arc::new(FakeLibrary::default());
        let result = run_app_with(
            dependencies(library)?,
            RunMode::Inspect {
                series: "Missing".into(),
                season: 1,
                episode: 1,
            },
            RunOptions::default(),
        )
        .await;
        assert!(matches!(
            result,
            Err(AppError::Upstream {
                operation: "inspect_episode",
                ..
            })
        ));
        Ok(())
    }
}
