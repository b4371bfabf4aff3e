//! Alert rule definitions.
//!
//! Rules are configured as JSON, one entry per metric:
//!
//! ```json
//! {
//!   "videoRecvBitrates": {
//!     "tags": ["video"],
//!     "failPercentile": 90,
//!     "p95": [{ "$gt": 300000, "$after": 30 }],
//!     "mean": { "$lt": 2000000 }
//!   }
//! }
//! ```
//!
//! Each stat key holds one clause or a list of clauses. A clause is a set of
//! threshold operators with an optional activation window in seconds since
//! the run started.

use crate::stats::StatField;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Threshold operator of a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Operator {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Result of checking one value against one clause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClauseOutcome {
    pub failed: bool,
    /// Normalized miss in `0..=100`. Zero when the clause passed.
    pub fail_amount: f64,
}

impl ClauseOutcome {
    const PASSED: Self = Self { failed: false, fail_amount: 0.0 };

    fn failed(value: f64, threshold: f64) -> Self {
        Self { failed: true, fail_amount: fail_amount(value, threshold) }
    }
}

/// How far `value` missed `threshold`, as a percentage capped at 100.
///
/// Relative to the threshold when it is non-zero, absolute otherwise.
#[must_use]
pub fn fail_amount(value: f64, threshold: f64) -> f64 {
    let miss = if threshold == 0.0 {
        value.abs()
    } else {
        (value - threshold).abs() / threshold.abs()
    };
    100.0 * miss.min(1.0)
}

/// One threshold condition with its activation window.
///
/// The operators describe the accepted range: `{"$lt": 10}` passes while the
/// value stays below 10.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleClause {
    #[serde(rename = "$eq", default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<f64>,
    #[serde(rename = "$lt", default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
    #[serde(rename = "$lte", default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
    #[serde(rename = "$gt", default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    #[serde(rename = "$gte", default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    /// Seconds after the run start before the clause is evaluated.
    #[serde(rename = "$after", default, skip_serializing_if = "Option::is_none")]
    pub after: Option<f64>,
    /// Seconds after the run start past which the clause is no longer evaluated.
    #[serde(rename = "$before", default, skip_serializing_if = "Option::is_none")]
    pub before: Option<f64>,
}

impl RuleClause {
    /// Operators with their thresholds, in gateway export order.
    #[must_use]
    pub fn thresholds(&self) -> Vec<(Operator, f64)> {
        [
            (Operator::Eq, self.eq),
            (Operator::Lt, self.lt),
            (Operator::Lte, self.lte),
            (Operator::Gt, self.gt),
            (Operator::Gte, self.gte),
        ]
        .into_iter()
        .filter_map(|(op, v)| v.map(|v| (op, v)))
        .collect()
    }

    /// Human readable form, also used as the report key.
    ///
    /// `p95 > 300000 and < 2000000 after 30s`
    #[must_use]
    pub fn describe(&self, stat: &str) -> String {
        let ops: Vec<String> = [
            (Operator::Eq, self.eq),
            (Operator::Gt, self.gt),
            (Operator::Gte, self.gte),
            (Operator::Lt, self.lt),
            (Operator::Lte, self.lte),
        ]
        .into_iter()
        .filter_map(|(op, v)| v.map(|v| format!("{op} {v}")))
        .collect();

        let mut desc = format!("{stat} {}", ops.join(" and "));
        if let Some(after) = self.after {
            desc.push_str(&format!(" after {after}s"));
        }
        if let Some(before) = self.before {
            desc.push_str(&format!(" before {before}s"));
        }
        desc
    }

    /// `true` once `elapsed` has reached `$after`.
    #[must_use]
    pub fn has_started(&self, elapsed: f64) -> bool {
        self.after.map_or(true, |after| elapsed >= after)
    }

    /// `true` once `elapsed` is past `$before`.
    #[must_use]
    pub fn is_expired(&self, elapsed: f64) -> bool {
        self.before.is_some_and(|before| elapsed > before)
    }

    /// `true` while `elapsed` lies in `[$after, $before]`.
    #[must_use]
    pub fn is_active(&self, elapsed: f64) -> bool {
        self.has_started(elapsed) && !self.is_expired(elapsed)
    }

    /// Seconds the clause has been active for at `elapsed`.
    #[must_use]
    pub fn active_seconds(&self, elapsed: f64) -> f64 {
        elapsed - self.after.unwrap_or(0.0)
    }

    /// Checks `value` against the clause.
    ///
    /// `$eq` wins over any bound. Otherwise the upper bound (`$lt`, else
    /// `$lte`) is checked first and only when it holds is the lower bound
    /// (`$gt`, else `$gte`) checked, so a value failing both reports the
    /// upper-bound miss.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn check(&self, value: f64) -> ClauseOutcome {
        if let Some(eq) = self.eq {
            return if value == eq { ClauseOutcome::PASSED } else { ClauseOutcome::failed(value, eq) };
        }

        if let Some(lt) = self.lt {
            if value >= lt {
                return ClauseOutcome::failed(value, lt);
            }
        } else if let Some(lte) = self.lte {
            if value > lte {
                return ClauseOutcome::failed(value, lte);
            }
        }

        if let Some(gt) = self.gt {
            if value <= gt {
                return ClauseOutcome::failed(value, gt);
            }
        } else if let Some(gte) = self.gte {
            if value < gte {
                return ClauseOutcome::failed(value, gte);
            }
        }

        ClauseOutcome::PASSED
    }

    fn validate(&self) -> Result<(), String> {
        let thresholds = self.thresholds();
        if thresholds.is_empty() {
            return Err("clause has no threshold operator".to_string());
        }
        if thresholds.iter().any(|(_, v)| !v.is_finite()) {
            return Err("clause threshold must be finite".to_string());
        }
        if let (Some(after), Some(before)) = (self.after, self.before) {
            if after > before {
                return Err(format!("$after ({after}) is later than $before ({before})"));
            }
        }
        Ok(())
    }
}

/// The clauses configured for one aggregate field of a metric.
#[derive(Debug, Clone, PartialEq)]
pub struct StatCheck {
    /// Key as written in the rule file, used in descriptions.
    pub stat: String,
    pub field: StatField,
    pub clauses: Vec<RuleClause>,
}

/// Every check configured for one metric.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawAlertRule")]
pub struct AlertRule {
    pub tags: Vec<String>,
    /// Overrides the global fail percentile for this metric's reports.
    pub fail_percentile: Option<f64>,
    pub checks: Vec<StatCheck>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAlertRule {
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    fail_percentile: Option<f64>,
    #[serde(flatten)]
    checks: BTreeMap<String, OneOrMany<RuleClause>>,
}

impl TryFrom<RawAlertRule> for AlertRule {
    type Error = String;

    fn try_from(raw: RawAlertRule) -> Result<Self, Self::Error> {
        if let Some(p) = raw.fail_percentile {
            if !(0.0..=100.0).contains(&p) {
                return Err(format!("failPercentile {p} is outside 0..=100"));
            }
        }

        let mut checks = Vec::with_capacity(raw.checks.len());
        for (stat, clauses) in raw.checks {
            let field = stat.parse::<StatField>()?;
            let clauses = match clauses {
                OneOrMany::One(c) => vec![c],
                OneOrMany::Many(cs) => cs,
            };
            for clause in &clauses {
                clause.validate().map_err(|e| format!("{stat}: {e}"))?;
            }
            checks.push(StatCheck { stat, field, clauses });
        }

        Ok(Self { tags: raw.tags, fail_percentile: raw.fail_percentile, checks })
    }
}

/// Metric name to its rule.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct AlertRules(BTreeMap<String, AlertRule>);

impl AlertRules {
    /// Parses a rule document. Empty or blank input yields no rules.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the document is malformed or a rule is invalid.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn get(&self, metric: &str) -> Option<&AlertRule> {
        self.0.get(metric)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AlertRule)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, AlertRule)> for AlertRules {
    fn from_iter<I: IntoIterator<Item = (String, AlertRule)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
