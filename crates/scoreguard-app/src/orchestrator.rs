//! Service graph and run modes.
//!
//! # Design
//!
//! - The scanner reads through the caching decorator; reconciliation uses the raw client.
//! - The scan loop and the reconciliation scheduler share one cancellation token.
//! - A bus subscriber forwards every domain event into the Prometheus registry.

use std::sync::Arc;
use std::time::Duration;

use scoreguard_config::AppConfig;
use scoreguard_core::{
    CacheSettings, CachedLibrary, ConnectionReport, CorrelationSettings, Correlator,
    DecisionEngine, EpisodeReport, MediaLibrary, MonitorSettings, QueueMonitor, ScanSummary,
    ScoreAnalyzer, TrackerClassifier,
};
use scoreguard_events::EventBus;
use scoreguard_telemetry::Metrics;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};

/// Run-time switches taken from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Suppress upstream mutations.
    pub dry_run: bool,
    /// Serve the notification endpoint in continuous mode.
    pub webhook: bool,
}

/// Wired services shared by every run mode.
pub struct Orchestrator {
    config: AppConfig,
    options: RunOptions,
    events: EventBus,
    metrics: Metrics,
    library: Arc<CachedLibrary>,
    monitor: Arc<QueueMonitor>,
    correlator: Arc<Correlator>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    /// Build the service graph around an upstream library. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn new(
        config: AppConfig,
        upstream: Arc<dyn MediaLibrary>,
        options: RunOptions,
        metrics: Metrics,
    ) -> Self {
        let events = EventBus::new();
        let shutdown = CancellationToken::new();
        let library = Arc::new(CachedLibrary::new(
            Arc::clone(&upstream),
            CacheSettings {
                queue_ttl: Duration::from_secs(config.cache.queue_ttl),
                score_ttl: Duration::from_secs(config.cache.score_ttl),
            },
        ));
        let engine = DecisionEngine::new(
            config.decisions.force_import_threshold,
            TrackerClassifier::new(&config.trackers.private, &config.trackers.public),
        );
        let cached: Arc<dyn MediaLibrary> = library.clone();
        let monitor = Arc::new(QueueMonitor::new(
            Arc::clone(&cached),
            ScoreAnalyzer::new(cached, engine),
            events.clone(),
            MonitorSettings {
                dry_run: options.dry_run,
                settle_delay: config.monitoring.post_import_settle(),
                webhook_without_secret: options.webhook
                    && config.webhook.enabled
                    && config.webhook.secret().is_none(),
            },
        ));
        let correlator = Correlator::new(
            upstream,
            monitor.clone(),
            events.clone(),
            CorrelationSettings {
                import_check_delay: config.webhook.import_check_delay(),
                manual_check_delay: config.webhook.manual_check_delay(),
                threshold: config.decisions.force_import_threshold,
            },
            shutdown.child_token(),
        );
        Self {
            config,
            options,
            events,
            metrics,
            library,
            monitor,
            correlator,
            shutdown,
        }
    }

    /// Token that stops the scan loop, the scheduler, and the webhook server.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Domain event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Correlation pipeline fed by the webhook server.
    #[must_use]
    pub fn correlator(&self) -> Arc<Correlator> {
        Arc::clone(&self.correlator)
    }

    /// Validate upstream connectivity and configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when any upstream probe fails.
    pub async fn test_config(&self) -> AppResult<ConnectionReport> {
        info!("testing configuration and connectivity");
        self.monitor
            .test_connection()
            .await
            .map_err(|err| AppError::upstream("test_connection", err))
    }

    /// Report on one episode.
    ///
    /// # Errors
    ///
    /// Returns an error when the episode cannot be resolved or upstream fails.
    pub async fn inspect(&self, series: &str, season: i64, episode: i64) -> AppResult<EpisodeReport> {
        self.monitor
            .inspect_episode(series, season, episode)
            .await
            .map_err(|err| AppError::upstream("inspect_episode", err))
    }

    /// Run one scan, plus the repeated-grab check when enabled.
    ///
    /// # Errors
    ///
    /// Returns an error when the queue scan fails.
    pub async fn run_once(&self) -> AppResult<ScanSummary> {
        info!(dry_run = self.options.dry_run, "running single monitoring cycle");
        let summary = self
            .monitor
            .process_stuck_imports()
            .await
            .map_err(|err| AppError::upstream("process_stuck_imports", err));
        self.metrics.inc_monitor_cycle();
        let summary = summary?;
        if self.config.monitoring.detect_repeated_grabs {
            self.repeated_grab_check().await;
        }
        self.monitor.log_stats();
        Ok(summary)
    }

    /// Scan on the configured interval until the shutdown token is cancelled.
    ///
    /// Cycle failures are logged and the loop continues.
    pub async fn run_continuous(&self) {
        let interval = self.config.monitoring.interval();
        info!(
            dry_run = self.options.dry_run,
            interval_secs = interval.as_secs(),
            threshold = self.config.decisions.force_import_threshold,
            repeated_grab_detection = self.config.monitoring.detect_repeated_grabs,
            "starting continuous monitoring"
        );
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            self.run_cycle(cycle).await;
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }
        info!(cycles = cycle, "monitoring loop stopped");
    }

    /// Scan once as cycle `cycle` of the continuous loop.
    pub async fn run_cycle(&self, cycle: u64) {
        debug!(cycle, "check cycle starting");
        match self.monitor.process_stuck_imports().await {
            Ok(summary) => debug!(
                cycle,
                processed = summary.processed,
                forced = summary.forced,
                removed = summary.removed,
                "check cycle finished"
            ),
            Err(err) => error!(cycle, error = %err, "monitoring cycle failed"),
        }
        self.metrics.inc_monitor_cycle();
        self.metrics
            .set_pending_grabs(self.correlator.pending_count());
        if cycle % 2 == 0 && self.config.monitoring.detect_repeated_grabs {
            self.repeated_grab_check().await;
        }
        if cycle % 10 == 0 {
            self.monitor.log_stats();
        }
    }

    async fn repeated_grab_check(&self) {
        match self.monitor.check_repeated_grabs().await {
            Ok(0) => debug!("no repeated grabs detected"),
            Ok(problems) => warn!(problems, "episodes with repeated grabs"),
            Err(err) => warn!(error = %err, "repeated grab check failed"),
        }
    }

    /// Forward every bus event into the metrics registry until shutdown.
    #[must_use]
    pub fn spawn_metrics_forwarder(&self) -> JoinHandle<()> {
        let mut stream = self.events.subscribe();
        let metrics = self.metrics.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    next = stream.next() => match next {
                        Some(envelope) => metrics.observe(&envelope.event),
                        None => break,
                    },
                }
            }
        })
    }

    /// Stop scheduling, drop pending grabs and caches, and log final statistics.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.correlator.shutdown();
        self.library.clear_cache().await;
        self.monitor.log_stats();
        info!("shutdown complete");
    }
}
