//! Integration tests for the rtcperf aggregator
//!
//! This crate contains various test modules:
//!
//! - `aggregator_tests`: Tick pipeline, source merging and lifecycle of the `Aggregator`
//! - `alert_tests`: Alert rule evaluation and reports across ticks
//! - `exporter_tests`: Pushgateway, remote push, CSV and report file sinks against mocks
//! - `scheduler_tests`: Drift and overlap behavior of the scheduler on paused time
//! - `mock_infrastructure`: Reusable scripted sessions and capturing sinks
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tests
//! ```

#[cfg(test)]
mod aggregator_tests;

#[cfg(test)]
mod alert_tests;

#[cfg(test)]
mod exporter_tests;

#[cfg(test)]
mod scheduler_tests;

/// Mock infrastructure for testing
pub mod mock_infrastructure;
