//! Per-tick evaluation of alert rules against the collected stats.

use super::{report::AlertReportBook, types::AlertRules, EvaluationError};
use crate::stats::{CollectedStats, StatField};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// What one evaluation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub evaluated: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Evaluates every configured clause once per tick and folds the outcome
/// into the run's [`AlertReportBook`].
///
/// Evaluation never fails: a clause whose metric is missing or whose value
/// is not finite is skipped for the tick without touching its report.
#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    rules: Arc<AlertRules>,
    default_fail_percentile: f64,
}

impl AlertEvaluator {
    /// Creates an evaluator.
    ///
    /// # Arguments
    ///
    /// * `rules` - Parsed rule set, shared with the exporters
    /// * `default_fail_percentile` - Used by rules without their own `failPercentile`
    #[must_use]
    pub fn new(rules: Arc<AlertRules>, default_fail_percentile: f64) -> Self {
        Self { rules, default_fail_percentile }
    }

    #[must_use]
    pub fn rules(&self) -> &Arc<AlertRules> {
        &self.rules
    }

    #[must_use]
    pub fn default_fail_percentile(&self) -> f64 {
        self.default_fail_percentile
    }

    /// The aggregate a clause checks: `field` of the metric's `all` series.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError`] when the metric is unknown or the value is not finite.
    pub fn check_value(
        stats: &CollectedStats,
        metric: &str,
        field: StatField,
    ) -> Result<f64, EvaluationError> {
        let all = stats
            .all(metric)
            .ok_or_else(|| EvaluationError::MissingMetric(metric.to_string()))?;
        let value = all.field(field);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvaluationError::NonFinite { metric: metric.to_string(), field })
        }
    }

    /// Runs every active clause against `stats`.
    ///
    /// `start` is the run start; clause windows are relative to it.
    pub fn evaluate(
        &self,
        stats: &CollectedStats,
        book: &mut AlertReportBook,
        now: DateTime<Utc>,
        start: DateTime<Utc>,
    ) -> EvaluationSummary {
        let elapsed = elapsed_seconds(start, now);
        let mut summary = EvaluationSummary::default();

        for (metric, rule) in self.rules.iter() {
            let fail_percentile = rule.fail_percentile.unwrap_or(self.default_fail_percentile);

            for check in &rule.checks {
                let value = match Self::check_value(stats, metric, check.field) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        debug!(metric = %metric, stat = %check.stat, error = %e, "Skipping alert check");
                        None
                    }
                };

                for clause in &check.clauses {
                    if !clause.is_active(elapsed) {
                        continue;
                    }
                    let Some(value) = value else {
                        summary.skipped += 1;
                        continue;
                    };

                    let outcome = clause.check(value);
                    let description = clause.describe(&check.stat);
                    if outcome.failed {
                        debug!(
                            metric = %metric,
                            rule = %description,
                            value,
                            fail_amount = outcome.fail_amount,
                            "Alert rule failed"
                        );
                        summary.failed += 1;
                    }
                    book.entry(metric, &description).record(
                        value,
                        outcome,
                        now,
                        clause.active_seconds(elapsed),
                        fail_percentile,
                    );
                    summary.evaluated += 1;
                }
            }
        }
        summary
    }
}

/// Seconds from `start` to `now`, millisecond precision.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn elapsed_seconds(start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    now.signed_duration_since(start).num_milliseconds() as f64 / 1000.0
}
