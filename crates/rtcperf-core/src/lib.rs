//! # rtcperf core
//!
//! Telemetry aggregation and alerting for a distributed WebRTC load-testing tool.
//!
//! Every page session of a load test exposes its WebRTC and page statistics.
//! Once per interval this crate pulls them, folds them together with stats
//! pushed by other load-test processes, evaluates alert rules and hands the
//! result to the configured sinks.
//!
//! - **[`stats`]**: Accumulators with summary statistics, label-indexed series
//!   and the known metric catalogue.
//!
//! - **[`ingest`]**: The [`Session`](ingest::Session) source trait, per-tick
//!   collection and the store for externally pushed stats.
//!
//! - **[`alerts`]**: Rule definitions, per-tick evaluation and the long-lived
//!   failure reports.
//!
//! - **[`exporters`]**: Console, CSV, Prometheus pushgateway, remote push and
//!   alert report file sinks.
//!
//! - **[`scheduler`]**: Drift-corrected, non-overlapping periodic ticks.
//!
//! - **[`runtime`]**: The [`Aggregator`](runtime::Aggregator) tying it together.
//!
//! - **[`metrics`]**: Self-telemetry of the aggregator.
//!
//! ## Tick Flow
//!
//! ```text
//!  Scheduler (every interval, never overlapping)
//!       │
//!       ▼
//! ┌──────────────────────────────────────────┐
//! │ Collector                                │
//! │  reset ─► pull sessions ─► merge external│
//! └────────────────────┬─────────────────────┘
//!                      │ CollectedStats
//!          ┌───────────┼────────────────┐
//!          ▼           ▼                ▼
//!     subscribers  AlertEvaluator ──► AlertReportBook
//!                      │
//!                      ▼
//! ┌──────────────────────────────────────────┐
//! │ ExporterSet (concurrent, isolated)       │
//! │  console  csv  gateway  push  report     │
//! └──────────────────────────────────────────┘
//! ```

pub mod alerts;
pub mod config;
pub mod exporters;
pub mod ingest;
pub mod metrics;
pub mod runtime;
pub mod scheduler;
pub mod stats;
