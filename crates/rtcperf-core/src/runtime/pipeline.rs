//! One tick: collect, publish, evaluate, export.

use crate::{
    alerts::{AlertEvaluator, AlertReportBook, EvaluationSummary},
    exporters::{ExporterSet, TickContext},
    ingest::{CollectOutcome, Collector, ExternalStore, RunInfo, Session},
    metrics,
    stats::CollectedStats,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc, time::Instant};
use tokio::sync::watch;
use tracing::{debug, info};

/// Sources shared between the tick and the public API.
#[derive(Default)]
pub(crate) struct Sources {
    pub sessions: RwLock<BTreeMap<u64, Arc<dyn Session>>>,
    pub external: ExternalStore,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to collect from.
    Skipped,
    Completed {
        collected: CollectOutcome,
        alerts: EvaluationSummary,
        /// Number of sinks that failed this tick.
        failed_sinks: usize,
    },
}

/// Per-run state, owned by whoever holds the pipeline lock.
pub(crate) struct Pipeline {
    collector: Collector,
    evaluator: AlertEvaluator,
    exporters: ExporterSet,
    catalogue: Vec<String>,
    stats: CollectedStats,
    reports: AlertReportBook,
    run: RunInfo,
    start: DateTime<Utc>,
    snapshot_tx: watch::Sender<Arc<CollectedStats>>,
}

impl Pipeline {
    pub fn new(
        collector: Collector,
        evaluator: AlertEvaluator,
        exporters: ExporterSet,
        catalogue: Vec<String>,
        snapshot_tx: watch::Sender<Arc<CollectedStats>>,
    ) -> Self {
        let stats = CollectedStats::with_metrics(catalogue.iter().map(String::as_str));
        Self {
            collector,
            evaluator,
            exporters,
            catalogue,
            stats,
            reports: AlertReportBook::new(),
            run: RunInfo::default(),
            start: Utc::now(),
            snapshot_tx,
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn reports(&self) -> &AlertReportBook {
        &self.reports
    }

    /// Marks the run start and opens every sink.
    pub async fn begin(&mut self, start: DateTime<Utc>) {
        self.start = start;
        self.run = RunInfo { start_time: start.timestamp_millis(), ..RunInfo::default() };
        self.exporters.start_all().await;
        info!(sinks = ?self.exporters.names(), start = %start, "Run started");
    }

    /// Closes every sink and drops the run's data.
    pub async fn end(&mut self) {
        self.exporters.shutdown_all().await;
        self.stats = CollectedStats::with_metrics(self.catalogue.iter().map(String::as_str));
        self.reports.clear();
        self.run = RunInfo::default();
        self.snapshot_tx.send_replace(Arc::new(CollectedStats::new()));
        info!("Run ended");
    }

    pub async fn run_tick(&mut self, now: DateTime<Utc>, sources: &Sources) -> TickOutcome {
        let sessions: Vec<Arc<dyn Session>> = sources.sessions.read().values().cloned().collect();
        if sessions.is_empty() && sources.external.is_empty() {
            debug!("No sources, skipping tick");
            return TickOutcome::Skipped;
        }

        let started = Instant::now();
        let collected = self
            .collector
            .collect(now, &sessions, &sources.external, &mut self.stats, &mut self.run)
            .await;
        metrics::record_sources(sessions.len(), sources.external.len());
        self.snapshot_tx.send_replace(Arc::new(self.stats.clone()));

        let alerts = self.evaluator.evaluate(&self.stats, &mut self.reports, now, self.start);

        let ctx = TickContext {
            now,
            start: self.start,
            stats: &self.stats,
            rules: self.evaluator.rules(),
            reports: &self.reports,
            run: &self.run,
            fail_percentile: self.evaluator.default_fail_percentile(),
        };
        let failed_sinks = self.exporters.export_all(&ctx).await;

        let duration = started.elapsed();
        metrics::record_tick(duration);
        debug!(
            duration_ms = duration.as_millis(),
            sessions = sessions.len(),
            alerts_failed = alerts.failed,
            failed_sinks,
            "Tick complete"
        );
        TickOutcome::Completed { collected, alerts, failed_sinks }
    }
}
