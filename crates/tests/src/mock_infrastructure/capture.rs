use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rtcperf_core::{
    alerts::AlertReportBook,
    exporters::{ExportError, Exporter, TickContext},
    ingest::RunInfo,
    stats::CollectedStats,
};
use std::sync::{Arc, Mutex};

/// Copy of one tick as seen by a sink.
#[derive(Debug, Clone)]
pub struct CapturedTick {
    pub now: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub stats: CollectedStats,
    pub reports: AlertReportBook,
    pub run: RunInfo,
}

/// Records every tick; clones share the same record.
#[derive(Clone, Default)]
pub struct CapturingExporter {
    ticks: Arc<Mutex<Vec<CapturedTick>>>,
    started: Arc<Mutex<usize>>,
    shut_down: Arc<Mutex<usize>>,
}

impl CapturingExporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn boxed(&self) -> Box<dyn Exporter> {
        Box::new(self.clone())
    }

    pub fn ticks(&self) -> Vec<CapturedTick> {
        self.ticks.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<CapturedTick> {
        self.ticks.lock().unwrap().last().cloned()
    }

    pub fn starts(&self) -> usize {
        *self.started.lock().unwrap()
    }

    pub fn shutdowns(&self) -> usize {
        *self.shut_down.lock().unwrap()
    }
}

#[async_trait]
impl Exporter for CapturingExporter {
    fn name(&self) -> &'static str {
        "capture"
    }

    async fn start(&mut self) -> Result<(), ExportError> {
        *self.started.lock().unwrap() += 1;
        Ok(())
    }

    async fn export(&mut self, ctx: &TickContext<'_>) -> Result<(), ExportError> {
        self.ticks.lock().unwrap().push(CapturedTick {
            now: ctx.now,
            start: ctx.start,
            stats: ctx.stats.clone(),
            reports: ctx.reports.clone(),
            run: ctx.run.clone(),
        });
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), ExportError> {
        *self.shut_down.lock().unwrap() += 1;
        Ok(())
    }
}
