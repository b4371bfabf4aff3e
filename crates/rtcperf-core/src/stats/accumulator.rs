//! Order-independent descriptive statistics over one interval's samples.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Holds every value pushed since the last reset.
///
/// All aggregates are computed on demand. An empty accumulator answers `0.0`
/// for every aggregate so callers only ever need to look at [`count`](Self::count).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatAccumulator {
    values: Vec<f64>,
}

impl StatAccumulator {
    #[must_use]
    pub const fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Adds a sample. Non-finite values are dropped.
    pub fn push(&mut self, value: f64) {
        if value.is_finite() {
            self.values.push(value);
        }
    }

    /// Adds many samples at once, applying the same filtering as [`push`](Self::push).
    pub fn extend<I: IntoIterator<Item = f64>>(&mut self, values: I) {
        self.values.extend(values.into_iter().filter(|v| v.is_finite()));
    }

    /// Clears the buffer while keeping its allocation.
    pub fn reset(&mut self) {
        self.values.clear();
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.sum() / self.values.len() as f64
    }

    /// Population standard deviation.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stddev(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
            / self.values.len() as f64;
        variance.sqrt()
    }

    #[must_use]
    pub fn min(&self) -> f64 {
        self.values.iter().copied().reduce(f64::min).unwrap_or(0.0)
    }

    #[must_use]
    pub fn max(&self) -> f64 {
        self.values.iter().copied().reduce(f64::max).unwrap_or(0.0)
    }

    /// Percentile `p` (0..=100) with linear interpolation between closest ranks.
    ///
    /// Computed from a sorted copy of the buffer; `p` outside the range is clamped.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percentile(&self, p: f64) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);

        let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
        let rank = p / 100.0 * (sorted.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        if lower == upper {
            return sorted[lower];
        }
        let weight = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * weight
    }

    /// Reads one aggregate by field.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn field(&self, field: StatField) -> f64 {
        match field {
            StatField::Count => self.count() as f64,
            StatField::Sum => self.sum(),
            StatField::Mean => self.mean(),
            StatField::Stddev => self.stddev(),
            StatField::P5 => self.percentile(5.0),
            StatField::P95 => self.percentile(95.0),
            StatField::Min => self.min(),
            StatField::Max => self.max(),
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn summary(&self) -> StatSummary {
        StatSummary {
            length: self.count(),
            sum: self.sum(),
            mean: self.mean(),
            stddev: self.stddev(),
            p5: self.percentile(5.0),
            p95: self.percentile(95.0),
            min: self.min(),
            max: self.max(),
        }
    }
}

impl FromIterator<f64> for StatAccumulator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = Self::new();
        acc.extend(iter);
        acc
    }
}

/// A frozen copy of every aggregate, as served to JSON consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatSummary {
    pub length: usize,
    pub sum: f64,
    pub mean: f64,
    pub stddev: f64,
    pub p5: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
}

/// The aggregate fields a rule or sink can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatField {
    Count,
    Sum,
    Mean,
    Stddev,
    P5,
    P95,
    Min,
    Max,
}

impl StatField {
    /// Every field in export column order.
    pub const ALL: [StatField; 8] = [
        StatField::Count,
        StatField::Sum,
        StatField::Mean,
        StatField::Stddev,
        StatField::P5,
        StatField::P95,
        StatField::Min,
        StatField::Max,
    ];

    /// Name used in rule files and gateway gauge names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StatField::Count => "length",
            StatField::Sum => "sum",
            StatField::Mean => "mean",
            StatField::Stddev => "stddev",
            StatField::P5 => "p5",
            StatField::P95 => "p95",
            StatField::Min => "min",
            StatField::Max => "max",
        }
    }

    /// Column suffix used by the CSV writer.
    #[must_use]
    pub const fn csv_suffix(self) -> &'static str {
        match self {
            StatField::Count => "length",
            StatField::Sum => "sum",
            StatField::Mean => "mean",
            StatField::Stddev => "stdev",
            StatField::P5 => "5p",
            StatField::P95 => "95p",
            StatField::Min => "min",
            StatField::Max => "max",
        }
    }
}

impl fmt::Display for StatField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "length" | "count" => Ok(StatField::Count),
            "sum" => Ok(StatField::Sum),
            "mean" => Ok(StatField::Mean),
            "stddev" => Ok(StatField::Stddev),
            "p5" => Ok(StatField::P5),
            "p95" => Ok(StatField::P95),
            "min" => Ok(StatField::Min),
            "max" => Ok(StatField::Max),
            other => Err(format!("unknown stat field '{other}'")),
        }
    }
}
