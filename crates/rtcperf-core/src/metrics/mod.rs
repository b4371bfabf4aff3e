//! Self-telemetry of the aggregator through the `metrics` facade.
//!
//! Recording is a no-op until a recorder is installed. The agent binary calls
//! [`init_prometheus_recorder`] once at startup and serves the rendered text;
//! library users may install any other recorder.
//!
//! | Metric | Kind | Labels |
//! |--------|------|--------|
//! | `rtcperf_ticks_total` | counter | |
//! | `rtcperf_tick_duration_seconds` | histogram | |
//! | `rtcperf_source_errors_total` | counter | `source`, `kind` |
//! | `rtcperf_export_errors_total` | counter | `sink`, `kind` |
//! | `rtcperf_sessions` | gauge | |
//! | `rtcperf_external_sources` | gauge | |

use crate::{exporters::ExportError, ingest::SourceError};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::{sync::OnceLock, time::Duration};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Short, bounded label value for an error.
pub trait MetricsState {
    fn as_metric_str(&self) -> &'static str;
}

impl MetricsState for SourceError {
    fn as_metric_str(&self) -> &'static str {
        match self {
            Self::Failed(_) => "failed",
            Self::Timeout(_) => "timeout",
            Self::Unavailable => "unavailable",
        }
    }
}

impl MetricsState for ExportError {
    fn as_metric_str(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Http(_) => "http",
            Self::Status { .. } => "status",
            Self::Serialization(_) => "serialization",
            Self::Render(_) => "render",
        }
    }
}

/// Installs the process-wide Prometheus recorder, once.
///
/// When another recorder is already installed a detached recorder is built
/// instead so the returned handle is always usable.
pub fn init_prometheus_recorder() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to install Prometheus recorder, using a detached one"
                );
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

pub fn record_tick(duration: Duration) {
    counter!("rtcperf_ticks_total").increment(1);
    histogram!("rtcperf_tick_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_source_error(source: &'static str, error: &SourceError) {
    counter!("rtcperf_source_errors_total", "source" => source, "kind" => error.as_metric_str())
        .increment(1);
}

pub fn record_export_error(sink: &'static str, error: &ExportError) {
    counter!("rtcperf_export_errors_total", "sink" => sink, "kind" => error.as_metric_str())
        .increment(1);
}

#[allow(clippy::cast_precision_loss)]
pub fn record_sources(sessions: usize, external: usize) {
    gauge!("rtcperf_sessions").set(sessions as f64);
    gauge!("rtcperf_external_sources").set(external as f64);
}
