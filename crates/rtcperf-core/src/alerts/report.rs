//! Long-lived per-rule reports, tag rollup and report rendering.

use super::{types::ClauseOutcome, AlertRules};
use crate::stats::StatAccumulator;
use chrono::{DateTime, Utc};
use prettytable::{format, row, Table};
use serde::Serialize;
use std::collections::BTreeMap;

/// Running record of one clause over the whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertRuleReport {
    pub total_fails: u64,
    /// Seconds spent failing, counted between consecutive failed evaluations.
    pub total_fails_time: f64,
    /// `total_fails_time` as a rounded share of the clause's active time.
    pub total_fails_perc: f64,
    last_failed: Option<DateTime<Utc>>,
    pub value_stats: StatAccumulator,
    pub value_average: f64,
    pub fail_amount_stats: StatAccumulator,
    pub fail_amount_percentile: f64,
}

impl AlertRuleReport {
    /// Folds one evaluation into the report.
    ///
    /// `active_seconds` is the time since the clause became active.
    pub fn record(
        &mut self,
        value: f64,
        outcome: ClauseOutcome,
        now: DateTime<Utc>,
        active_seconds: f64,
        fail_percentile: f64,
    ) {
        if outcome.failed {
            self.total_fails += 1;
            if let Some(last) = self.last_failed {
                self.total_fails_time += seconds_between(last, now);
            }
            self.last_failed = Some(now);
        } else {
            self.last_failed = None;
        }

        self.total_fails_perc = if active_seconds > 0.0 {
            (100.0 * self.total_fails_time / active_seconds).round()
        } else {
            0.0
        };

        self.value_stats.push(value);
        self.value_average = self.value_stats.mean();
        self.fail_amount_stats.push(if outcome.failed { outcome.fail_amount } else { 0.0 });
        self.fail_amount_percentile = self.fail_amount_stats.percentile(fail_percentile).round();
    }

    /// Whether the clause is currently in a failing streak.
    #[must_use]
    pub fn is_failing(&self) -> bool {
        self.last_failed.is_some()
    }

    /// Reports are only printed once they have accumulated failing time.
    #[must_use]
    pub fn is_reportable(&self) -> bool {
        self.total_fails > 0 && self.total_fails_perc > 0.0
    }
}

#[allow(clippy::cast_precision_loss)]
fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    to.signed_duration_since(from).num_milliseconds() as f64 / 1000.0
}

/// Table flavour for [`AlertReportBook::render_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    /// Borderless columns for the terminal.
    Console,
    /// Boxed tables for report files.
    File,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReportEntry {
    total_fails: u64,
    total_fails_time: f64,
    value_average: f64,
    total_fails_perc: f64,
    fail_amount: f64,
    count: usize,
}

#[derive(Debug, Serialize)]
struct JsonReport {
    tags: BTreeMap<String, f64>,
    reports: BTreeMap<String, JsonReportEntry>,
}

/// All reports of a run: metric name to clause description to report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertReportBook {
    reports: BTreeMap<String, BTreeMap<String, AlertRuleReport>>,
}

impl AlertReportBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the report of a clause, creating it on first evaluation.
    pub fn entry(&mut self, metric: &str, description: &str) -> &mut AlertRuleReport {
        self.reports
            .entry(metric.to_string())
            .or_default()
            .entry(description.to_string())
            .or_default()
    }

    #[must_use]
    pub fn get(&self, metric: &str, description: &str) -> Option<&AlertRuleReport> {
        self.reports.get(metric)?.get(description)
    }

    /// Iterates `(metric, description, report)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &AlertRuleReport)> {
        self.reports.iter().flat_map(|(metric, by_desc)| {
            by_desc.iter().map(move |(desc, report)| (metric.as_str(), desc.as_str(), report))
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn clear(&mut self) {
        self.reports.clear();
    }

    /// Summary value per tag.
    ///
    /// For each tag, the `fail_percentile`-th percentile of the
    /// `fail_amount_percentile` of every report whose metric carries the tag.
    #[must_use]
    pub fn tag_rollup(&self, rules: &AlertRules, fail_percentile: f64) -> BTreeMap<String, f64> {
        let mut per_tag: BTreeMap<&str, StatAccumulator> = BTreeMap::new();
        for (metric, rule) in rules.iter() {
            for tag in &rule.tags {
                let acc = per_tag.entry(tag.as_str()).or_default();
                if let Some(by_desc) = self.reports.get(metric) {
                    acc.extend(by_desc.values().map(|r| r.fail_amount_percentile));
                }
            }
        }
        per_tag
            .into_iter()
            .map(|(tag, acc)| (tag.to_string(), acc.percentile(fail_percentile).round()))
            .collect()
    }

    /// Text report: failing clauses followed by the tag table.
    #[must_use]
    pub fn render_text(&self, rules: &AlertRules, fail_percentile: f64, style: TextStyle) -> String {
        let table_format = match style {
            TextStyle::Console => *format::consts::FORMAT_CLEAN,
            TextStyle::File => *format::consts::FORMAT_DEFAULT,
        };

        let mut conditions = Table::new();
        conditions.set_format(table_format);
        conditions.set_titles(row![b => "Condition", "Fails", "Fail time (s)", "Fail time (%)", "Fail amount %"]);
        for (metric, desc, report) in self.iter().filter(|(_, _, r)| r.is_reportable()) {
            conditions.add_row(row![
                format!("{metric} {desc}"),
                report.total_fails,
                report.total_fails_time.round(),
                report.total_fails_perc,
                report.fail_amount_percentile,
            ]);
        }

        let mut tags = Table::new();
        tags.set_format(table_format);
        tags.set_titles(row![b => "Tag", "Fail %"]);
        for (tag, value) in self.tag_rollup(rules, fail_percentile) {
            tags.add_row(row![tag, value]);
        }

        format!("{conditions}{tags}")
    }

    /// JSON report with the same filtering as the text one.
    ///
    /// # Errors
    ///
    /// Returns the serializer error, which only happens on non-string map keys.
    pub fn render_json(&self, rules: &AlertRules, fail_percentile: f64) -> Result<String, serde_json::Error> {
        let reports = self
            .iter()
            .filter(|(_, _, r)| r.is_reportable())
            .map(|(metric, desc, r)| {
                let entry = JsonReportEntry {
                    total_fails: r.total_fails,
                    total_fails_time: r.total_fails_time.round(),
                    value_average: r.value_average,
                    total_fails_perc: r.total_fails_perc,
                    fail_amount: r.fail_amount_percentile,
                    count: r.fail_amount_stats.count(),
                };
                (format!("{metric} {desc}"), entry)
            })
            .collect();
        let report = JsonReport { tags: self.tag_rollup(rules, fail_percentile), reports };
        serde_json::to_string_pretty(&report)
    }
}
