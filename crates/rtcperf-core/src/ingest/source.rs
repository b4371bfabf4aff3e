//! The pull interface of a session and how its batches fold into series.

use super::SourceError;
use crate::stats::{CollectedStats, SeriesLabel};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One value reported under a metric name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    /// Values keyed by `pageIndex:participantName:host:codec:trackId`.
    Keyed(BTreeMap<String, KeyedValue>),
}

/// An entry of a keyed metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyedValue {
    Number(f64),
    /// A categorical observation such as a codec name.
    Label(String),
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Scalar(v)
    }
}

impl From<f64> for KeyedValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for KeyedValue {
    fn from(v: &str) -> Self {
        Self::Label(v.to_string())
    }
}

/// One batch returned by a session pull.
pub type SessionStats = BTreeMap<String, MetricValue>;

/// A producer of periodic samples, managed outside the aggregator.
#[async_trait]
pub trait Session: Send + Sync {
    fn id(&self) -> u64;

    /// Returns the samples gathered since the previous call.
    async fn update_stats(&self, now: DateTime<Utc>) -> Result<SessionStats, SourceError>;

    /// Number of pages this session drives.
    fn pages(&self) -> usize {
        0
    }

    /// URL under test. May carry credentials; they are stripped before reporting.
    fn url(&self) -> Option<String> {
        None
    }

    /// Releases the session's resources when the aggregator stops.
    async fn stop(&self) -> Result<(), SourceError> {
        Ok(())
    }
}

/// Host and codec fields of a track key.
#[must_use]
pub fn parse_track_key(key: &str) -> (Option<&str>, Option<&str>) {
    let mut fields = key.split(':').skip(2);
    let host = fields.next().filter(|s| !s.is_empty());
    let codec = fields.next().filter(|s| !s.is_empty());
    (host, codec)
}

/// Folds one session batch into `stats`.
///
/// Scalars go to `all`. A numeric keyed entry goes to `all` plus the
/// `host:` and `codec:` series named by its key. A categorical entry counts
/// one presence in `all` and in `codec:<value>`.
pub fn fold_session_stats(stats: &mut CollectedStats, batch: &SessionStats) {
    for (name, value) in batch {
        match value {
            MetricValue::Scalar(v) => {
                if v.is_finite() {
                    stats.push(name, SeriesLabel::All, *v);
                }
            }
            MetricValue::Keyed(entries) => {
                let series = stats.metric_mut(name);
                for (key, entry) in entries {
                    match entry {
                        KeyedValue::Number(v) if v.is_finite() => {
                            series.push(SeriesLabel::All, *v);
                            let (host, codec) = parse_track_key(key);
                            if let Some(host) = host {
                                series.push(SeriesLabel::host(host), *v);
                            }
                            if let Some(codec) = codec {
                                series.push(SeriesLabel::codec(codec), *v);
                            }
                        }
                        KeyedValue::Number(_) => {}
                        KeyedValue::Label(label) => {
                            series.push(SeriesLabel::All, 1.0);
                            series.push(SeriesLabel::codec(label.as_str()), 1.0);
                        }
                    }
                }
            }
        }
    }
}
