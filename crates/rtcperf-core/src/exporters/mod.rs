//! Output sinks.
//!
//! Every sink receives the same read-only [`TickContext`] after evaluation.
//! Sinks run concurrently and in isolation: a failing sink is logged with its
//! name and counted, and neither the other sinks nor the next tick notice.
//!
//! | Sink | Enabled by | Output |
//! |------|------------|--------|
//! | [`ConsoleExporter`] | `stats.show_stats` | tables on stdout |
//! | [`CsvExporter`] | `stats.stats_path` | one CSV row per tick |
//! | [`GatewayExporter`] | `gateway.url` | Prometheus pushgateway group |
//! | [`PushExporter`] | `push.url` | raw series to another aggregator |
//! | [`ReportFileExporter`] | `alerts.report_filename` | alert report, text or JSON |

pub mod console;
pub mod csv;
pub mod errors;
pub mod gateway;
pub mod http;
pub mod push;
pub mod report_file;

pub use console::ConsoleExporter;
pub use csv::CsvExporter;
pub use errors::ExportError;
pub use gateway::{GatewayExporter, GaugeSet};
pub use push::PushExporter;
pub use report_file::ReportFileExporter;

use crate::{
    alerts::{elapsed_seconds, AlertReportBook, AlertRules},
    ingest::RunInfo,
    metrics,
    stats::CollectedStats,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, error};

/// Everything a sink may read for one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    pub now: DateTime<Utc>,
    /// Run start; also the `datetime` label of gateway series.
    pub start: DateTime<Utc>,
    pub stats: &'a CollectedStats,
    pub rules: &'a AlertRules,
    pub reports: &'a AlertReportBook,
    pub run: &'a RunInfo,
    /// Global percentile used for the tag rollup.
    pub fail_percentile: f64,
}

impl TickContext<'_> {
    #[must_use]
    pub fn elapsed_seconds(&self) -> f64 {
        elapsed_seconds(self.start, self.now)
    }
}

/// An output sink.
#[async_trait]
pub trait Exporter: Send {
    /// Short stable name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Called once when the aggregator starts.
    async fn start(&mut self) -> Result<(), ExportError> {
        Ok(())
    }

    /// Writes one tick.
    async fn export(&mut self, ctx: &TickContext<'_>) -> Result<(), ExportError>;

    /// Called once when the aggregator stops, after the last tick.
    async fn shutdown(&mut self) -> Result<(), ExportError> {
        Ok(())
    }
}

/// The sinks of one aggregator.
#[derive(Default)]
pub struct ExporterSet {
    exporters: Vec<Box<dyn Exporter>>,
}

impl ExporterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, exporter: Box<dyn Exporter>) {
        self.exporters.push(exporter);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.exporters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exporters.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.exporters.iter().map(|e| e.name()).collect()
    }

    pub async fn start_all(&mut self) {
        let results = join_all(self.exporters.iter_mut().map(|e| async move {
            let result = e.start().await;
            (e.name(), result)
        }))
        .await;
        report_failures("start", results);
    }

    /// Exports one tick to every sink. Returns how many sinks failed.
    pub async fn export_all(&mut self, ctx: &TickContext<'_>) -> usize {
        let results = join_all(self.exporters.iter_mut().map(|e| async move {
            let result = e.export(ctx).await;
            (e.name(), result)
        }))
        .await;
        report_failures("export", results)
    }

    pub async fn shutdown_all(&mut self) {
        let results = join_all(self.exporters.iter_mut().map(|e| async move {
            let result = e.shutdown().await;
            (e.name(), result)
        }))
        .await;
        report_failures("shutdown", results);
    }
}

fn report_failures(stage: &'static str, results: Vec<(&'static str, Result<(), ExportError>)>) -> usize {
    let mut failed = 0;
    for (sink, result) in results {
        match result {
            Ok(()) => debug!(sink, stage, "Sink done"),
            Err(e) => {
                error!(sink, stage, error = %e, "Sink failed");
                metrics::record_export_error(sink, &e);
                failed += 1;
            }
        }
    }
    failed
}
