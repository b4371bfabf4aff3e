//! Builder for an [`Aggregator`] and its configured sinks.

use super::{
    lifecycle::Aggregator,
    pipeline::{Pipeline, Sources},
};
use crate::{
    alerts::{AlertEvaluator, AlertRules},
    config::{AppConfig, ConfigError},
    exporters::{
        ConsoleExporter, CsvExporter, ExportError, Exporter, ExporterSet, GatewayExporter,
        PushExporter, ReportFileExporter,
    },
    ingest::Collector,
    scheduler::Scheduler,
    stats::{known_metrics, CollectedStats},
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

/// Errors raised while building or driving an [`Aggregator`].
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session {0} is already registered")]
    DuplicateSession(u64),

    #[error("Failed to initialize sink: {0}")]
    Export(#[from] ExportError),
}

/// Builder for an [`Aggregator`].
///
/// Sinks are derived from the configuration; extra ones can be added with
/// [`with_exporter`](Self::with_exporter).
///
/// # Examples
///
/// ```no_run
/// # use rtcperf_core::{config::AppConfig, runtime::AggregatorBuilder};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let aggregator = AggregatorBuilder::new().with_config(AppConfig::load()?).build()?;
/// aggregator.start().await;
/// # Ok(())
/// # }
/// ```
pub struct AggregatorBuilder {
    config: Option<AppConfig>,
    exporters: Vec<Box<dyn Exporter>>,
    default_exporters: bool,
}

impl AggregatorBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self { config: None, exporters: Vec::new(), default_exporters: true }
    }

    #[must_use]
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Adds a sink on top of the configured ones.
    #[must_use]
    pub fn with_exporter(mut self, exporter: Box<dyn Exporter>) -> Self {
        self.exporters.push(exporter);
        self
    }

    /// Skips the sinks the configuration would enable; only those added with
    /// [`with_exporter`](Self::with_exporter) are used.
    #[must_use]
    pub fn without_default_exporters(mut self) -> Self {
        self.default_exporters = false;
        self
    }

    /// Validates the configuration, parses the alert rules and creates the sinks.
    ///
    /// Without a configuration the defaults are used.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError`] if the configuration is invalid or a sink
    /// cannot be created.
    pub fn build(self) -> Result<Aggregator, AggregatorError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let rules = Arc::new(config.alert_rules()?);
        let catalogue = known_metrics(&config.stats.custom_metrics);

        let mut exporters = ExporterSet::new();
        if self.default_exporters {
            for exporter in configured_exporters(&config, &rules, &catalogue)? {
                exporters.push(exporter);
            }
        }
        for exporter in self.exporters {
            exporters.push(exporter);
        }

        info!(
            interval_s = config.stats.interval_seconds,
            rules = rules.len(),
            metrics = catalogue.len(),
            sinks = ?exporters.names(),
            "Initializing aggregator"
        );

        let sink_names = exporters.names();
        let (snapshot_tx, _) = watch::channel(Arc::new(CollectedStats::new()));
        let collector = Collector::new(config.interval(), config.rtc_stats_timeout());
        let evaluator = AlertEvaluator::new(rules, config.alerts.fail_percentile);
        let pipeline = Pipeline::new(collector, evaluator, exporters, catalogue, snapshot_tx.clone());
        let scheduler = Scheduler::new("stats", config.interval());

        Ok(Aggregator::new(
            config,
            Arc::new(Sources::default()),
            pipeline,
            scheduler,
            snapshot_tx,
            sink_names,
        ))
    }
}

impl Default for AggregatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn configured_exporters(
    config: &AppConfig,
    rules: &AlertRules,
    catalogue: &[String],
) -> Result<Vec<Box<dyn Exporter>>, ExportError> {
    let mut exporters: Vec<Box<dyn Exporter>> = Vec::new();

    if config.stats.show_stats {
        exporters.push(Box::new(ConsoleExporter::new(!config.stats.show_page_log)));
    }
    if !config.stats.stats_path.is_empty() {
        exporters.push(Box::new(CsvExporter::new(&config.stats.stats_path, catalogue.to_vec())));
    }
    if !config.gateway.url.is_empty() {
        exporters.push(Box::new(GatewayExporter::new(
            &config.gateway.url,
            &config.gateway.job_name,
            config.gateway.auth.as_deref().filter(|a| !a.is_empty()),
            config.gateway.gzip,
        )?));
    }
    if !config.push.url.is_empty() {
        exporters.push(Box::new(PushExporter::new(
            &config.push.url,
            &config.push.id,
            &config.push.secret,
        )?));
    }
    if !config.alerts.report_filename.is_empty() {
        if rules.is_empty() {
            debug!("Alert report file configured without rules, not writing it");
        } else {
            exporters.push(Box::new(ReportFileExporter::new(&config.alerts.report_filename)));
        }
    }
    Ok(exporters)
}
