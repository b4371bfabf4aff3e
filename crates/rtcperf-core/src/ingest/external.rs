//! Pre-aggregated stats pushed by out-of-process producers.
//!
//! Each producer is keyed by its submitter id; a new push replaces the previous
//! one. Entries are checked once per tick against wall-clock age and purged
//! when they are older than the configured timeout.

use super::{hide_auth, RunInfo};
use crate::stats::{CollectedStats, SeriesLabel};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};
use tracing::debug;

/// Metric name to label to raw values.
pub type ExternalStats = BTreeMap<String, BTreeMap<String, Vec<f64>>>;

/// Run-config fragment sent alongside a push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pages: Option<usize>,
}

#[derive(Debug)]
struct ExternalEntry {
    added_at: DateTime<Utc>,
    stats: ExternalStats,
    config: ExternalConfig,
}

/// Outcome of one merge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub merged: usize,
    pub expired: usize,
}

#[derive(Debug, Default)]
pub struct ExternalStore {
    entries: Mutex<BTreeMap<String, ExternalEntry>>,
}

impl ExternalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or refreshes the payload of `id`.
    pub fn insert(
        &self,
        id: impl Into<String>,
        stats: ExternalStats,
        config: ExternalConfig,
        now: DateTime<Utc>,
    ) {
        let id = id.into();
        debug!(source_id = %id, metrics = stats.len(), "External stats received");
        self.entries.lock().insert(id, ExternalEntry { added_at: now, stats, config });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Purges expired entries and merges the live ones into `stats`.
    ///
    /// An entry is live while its age is below `timeout`. For each metric, an
    /// `all` array feeds the `all` series and every other label feeds only its
    /// own series. A payload without an `all` array feeds every label into
    /// `all` as well.
    pub fn merge_into(
        &self,
        stats: &mut CollectedStats,
        run: &mut RunInfo,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> MergeOutcome {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        let mut outcome = MergeOutcome::default();
        let mut entries = self.entries.lock();

        entries.retain(|id, entry| {
            let live = now.signed_duration_since(entry.added_at) < timeout;
            if !live {
                debug!(source_id = %id, "External stats expired");
                outcome.expired += 1;
            }
            live
        });

        for (id, entry) in entries.iter() {
            debug!(source_id = %id, "Merging external stats");
            if let Some(url) = entry.config.url.as_ref().filter(|u| !u.is_empty()) {
                run.url = hide_auth(url);
            }
            run.pages += entry.config.pages.unwrap_or(0);

            for (name, labels) in &entry.stats {
                let has_all = labels.contains_key("all");
                let series = stats.metric_mut(name);
                for (label, values) in labels {
                    let label = SeriesLabel::from(label.as_str());
                    if !label.is_all() && !has_all {
                        series.entry(SeriesLabel::All).extend(values.iter().copied());
                    }
                    series.entry(label).extend(values.iter().copied());
                }
            }
            outcome.merged += 1;
        }
        outcome
    }
}
