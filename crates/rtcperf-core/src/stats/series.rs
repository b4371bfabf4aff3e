//! Label-indexed accumulators for every metric seen in a run.
//!
//! A metric owns one [`StatAccumulator`] per label. The `all` label is the
//! unfiltered view; `host:<addr>` and `codec:<name>` labels are discovered
//! while ingesting and created on first use. Series are only ever reset
//! between ticks, never removed, so a label keeps its identity for the run.

use super::accumulator::{StatAccumulator, StatSummary};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Dimension value of a series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SeriesLabel {
    All,
    Host(String),
    Codec(String),
    /// Any label pushed by an external producer that does not follow the known prefixes.
    Other(String),
}

impl SeriesLabel {
    #[must_use]
    pub fn host(addr: impl Into<String>) -> Self {
        Self::Host(addr.into())
    }

    #[must_use]
    pub fn codec(name: impl Into<String>) -> Self {
        Self::Codec(name.into())
    }

    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// The `(host, codec)` pair used for gateway gauge labels, `all` standing
    /// for the unfiltered dimension. `None` for labels outside that scheme.
    #[must_use]
    pub fn host_codec(&self) -> Option<(&str, &str)> {
        match self {
            Self::All => Some(("all", "all")),
            Self::Host(h) => Some((h.as_str(), "all")),
            Self::Codec(c) => Some(("all", c.as_str())),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for SeriesLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Host(h) => write!(f, "host:{h}"),
            Self::Codec(c) => write!(f, "codec:{c}"),
            Self::Other(o) => f.write_str(o),
        }
    }
}

impl From<&str> for SeriesLabel {
    fn from(s: &str) -> Self {
        if s == "all" {
            Self::All
        } else if let Some(h) = s.strip_prefix("host:") {
            Self::Host(h.to_string())
        } else if let Some(c) = s.strip_prefix("codec:") {
            Self::Codec(c.to_string())
        } else {
            Self::Other(s.to_string())
        }
    }
}

impl From<String> for SeriesLabel {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<SeriesLabel> for String {
    fn from(label: SeriesLabel) -> Self {
        label.to_string()
    }
}

/// Every series of one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    series: BTreeMap<SeriesLabel, StatAccumulator>,
}

impl Default for MetricSeries {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSeries {
    /// Creates a metric with an empty `all` series.
    #[must_use]
    pub fn new() -> Self {
        let mut series = BTreeMap::new();
        series.insert(SeriesLabel::All, StatAccumulator::new());
        Self { series }
    }

    /// Returns the series for `label`, creating it when absent.
    pub fn entry(&mut self, label: SeriesLabel) -> &mut StatAccumulator {
        self.series.entry(label).or_default()
    }

    pub fn push(&mut self, label: SeriesLabel, value: f64) {
        self.entry(label).push(value);
    }

    #[must_use]
    pub fn get(&self, label: &SeriesLabel) -> Option<&StatAccumulator> {
        self.series.get(label)
    }

    /// The unfiltered series. Always present.
    #[must_use]
    pub fn all(&self) -> &StatAccumulator {
        static EMPTY: StatAccumulator = StatAccumulator::new();
        self.series.get(&SeriesLabel::All).unwrap_or(&EMPTY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SeriesLabel, &StatAccumulator)> {
        self.series.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    fn reset(&mut self) {
        for acc in self.series.values_mut() {
            acc.reset();
        }
    }
}

/// The per-run stats store: metric name to its label-indexed series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedStats {
    metrics: BTreeMap<String, MetricSeries>,
}

impl CollectedStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with an `all` series for each name.
    #[must_use]
    pub fn with_metrics<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let metrics = names.into_iter().map(|n| (n.into(), MetricSeries::new())).collect();
        Self { metrics }
    }

    /// Clears the values of every series, keeping the series themselves.
    pub fn reset(&mut self) {
        for series in self.metrics.values_mut() {
            series.reset();
        }
    }

    /// Drops every metric. Used when a run is torn down.
    pub fn clear(&mut self) {
        self.metrics.clear();
    }

    /// Returns the metric's series set, creating it when absent.
    pub fn metric_mut(&mut self, name: &str) -> &mut MetricSeries {
        self.metrics.entry(name.to_string()).or_default()
    }

    pub fn push(&mut self, name: &str, label: SeriesLabel, value: f64) {
        self.metric_mut(name).push(label, value);
    }

    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&MetricSeries> {
        self.metrics.get(name)
    }

    /// The `all` series of a metric, if the metric is known.
    #[must_use]
    pub fn all(&self, name: &str) -> Option<&StatAccumulator> {
        self.metrics.get(name).map(MetricSeries::all)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetricSeries)> {
        self.metrics.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Raw values of every non-empty series, keyed by metric then label.
    #[must_use]
    pub fn raw_values(&self) -> BTreeMap<String, BTreeMap<String, Vec<f64>>> {
        self.metrics
            .iter()
            .filter_map(|(name, series)| {
                let labels: BTreeMap<String, Vec<f64>> = series
                    .iter()
                    .filter(|(_, acc)| !acc.is_empty())
                    .map(|(label, acc)| (label.to_string(), acc.values().to_vec()))
                    .collect();
                (!labels.is_empty()).then(|| (name.clone(), labels))
            })
            .collect()
    }

    /// Aggregates of every non-empty series, keyed by metric then label.
    #[must_use]
    pub fn summaries(&self) -> BTreeMap<String, BTreeMap<String, StatSummary>> {
        self.metrics
            .iter()
            .filter_map(|(name, series)| {
                let labels: BTreeMap<String, StatSummary> = series
                    .iter()
                    .filter(|(_, acc)| !acc.is_empty())
                    .map(|(label, acc)| (label.to_string(), acc.summary()))
                    .collect();
                (!labels.is_empty()).then(|| (name.clone(), labels))
            })
            .collect()
    }
}
