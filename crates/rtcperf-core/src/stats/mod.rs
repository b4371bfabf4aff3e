//! Aggregated statistics: accumulators, label-indexed series and the metric catalogue.

pub mod accumulator;
pub mod names;
pub mod series;

pub use accumulator::{StatAccumulator, StatField, StatSummary};
pub use names::{known_metrics, MetricGroup};
pub use series::{CollectedStats, MetricSeries, SeriesLabel};
