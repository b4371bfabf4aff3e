//! Alert rules: definitions, per-tick evaluation and long-lived reports.
//!
//! # Flow
//!
//! ```text
//! CollectedStats ──► AlertEvaluator::evaluate ──► AlertReportBook
//!                          │                           │
//!                    AlertRules (immutable)      render_text / render_json
//! ```

pub mod evaluator;
pub mod report;
pub mod types;

pub use evaluator::{elapsed_seconds, AlertEvaluator, EvaluationSummary};
pub use report::{AlertReportBook, AlertRuleReport, TextStyle};
pub use types::{fail_amount, AlertRule, AlertRules, ClauseOutcome, Operator, RuleClause, StatCheck};

use crate::stats::StatField;
use thiserror::Error;

/// A clause could not be evaluated this tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("metric '{0}' has not been collected")]
    MissingMetric(String),

    #[error("{field} of metric '{metric}' is not finite")]
    NonFinite { metric: String, field: StatField },
}
