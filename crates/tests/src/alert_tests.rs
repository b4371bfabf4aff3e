//! End-to-end alert evaluation through the aggregator.

#![allow(clippy::float_cmp)]

use crate::mock_infrastructure::{config_with_rules, ScriptedSession};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rtcperf_core::runtime::{Aggregator, TickOutcome};

fn build(rules: &str, cpu: &[f64]) -> Aggregator {
    let aggregator =
        Aggregator::builder().with_config(config_with_rules(rules)).build().expect("valid rules");
    for (id, value) in (0_u64..).zip(cpu) {
        let session = ScriptedSession::new(id).with_scalar("cpu", *value).into_arc();
        aggregator.add_session(session).unwrap();
    }
    aggregator
}

async fn tick_at(aggregator: &Aggregator, start: DateTime<Utc>, secs: i64) -> TickOutcome {
    aggregator.tick(start + ChronoDuration::seconds(secs)).await
}

#[tokio::test]
async fn test_failing_rule_accumulates_report() {
    let aggregator = build(r#"{"cpu": {"tags": ["perf"], "p95": {"$lt": 25}}}"#, &[10.0, 20.0, 30.0]);
    let start = Utc::now();
    aggregator.start_at(start).await;

    for secs in [15, 30, 45] {
        let TickOutcome::Completed { alerts, .. } = tick_at(&aggregator, start, secs).await else {
            panic!("tick should run");
        };
        assert_eq!(alerts.evaluated, 1);
        assert_eq!(alerts.failed, 1);
    }

    let reports = aggregator.reports().await;
    let report = reports.get("cpu", "p95 < 25").expect("report created");
    assert_eq!(report.total_fails, 3);
    assert_eq!(report.total_fails_time, 30.0);
    assert_eq!(report.total_fails_perc, 67.0);
    assert_eq!(report.fail_amount_percentile, 16.0);
    assert!(report.is_failing());

    let rules = aggregator.config().alert_rules().unwrap();
    assert_eq!(reports.tag_rollup(&rules, 95.0).get("perf"), Some(&16.0));

    aggregator.stop().await;
}

#[tokio::test]
async fn test_passing_tick_ends_failing_streak() {
    let aggregator = build(r#"{"cpu": {"tags": ["perf"], "max": {"$lte": 50}}}"#, &[10.0, 60.0]);
    let start = Utc::now();
    aggregator.start_at(start).await;

    tick_at(&aggregator, start, 10).await;
    tick_at(&aggregator, start, 20).await;
    aggregator.remove_session(1);
    tick_at(&aggregator, start, 30).await;

    let reports = aggregator.reports().await;
    let report = reports.get("cpu", "max <= 50").expect("report created");
    assert_eq!(report.total_fails, 2);
    assert_eq!(report.total_fails_time, 10.0);
    assert!(!report.is_failing());
    assert_eq!(report.value_stats.count(), 3);

    aggregator.stop().await;
}

#[tokio::test]
async fn test_clause_window_limits_evaluation() {
    let aggregator = build(
        r#"{"cpu": {"mean": [{"$gt": 100, "$after": 20, "$before": 40}, {"$lt": 1}]}}"#,
        &[10.0],
    );
    let start = Utc::now();
    aggregator.start_at(start).await;

    let mut evaluated = Vec::new();
    for secs in [10, 25, 35, 45] {
        if let TickOutcome::Completed { alerts, .. } = tick_at(&aggregator, start, secs).await {
            evaluated.push(alerts.evaluated);
        }
    }
    assert_eq!(evaluated, vec![1, 2, 2, 1]);

    let reports = aggregator.reports().await;
    let windowed = reports.get("cpu", "mean > 100 after 20s before 40s").expect("windowed report");
    assert_eq!(windowed.total_fails, 2);
    let always = reports.get("cpu", "mean < 1").expect("unbounded report");
    assert_eq!(always.total_fails, 4);

    aggregator.stop().await;
}

#[tokio::test]
async fn test_rule_on_missing_metric_is_skipped() {
    let aggregator = build(r#"{"customLatency": {"mean": {"$lt": 100}}}"#, &[10.0]);
    let start = Utc::now();
    aggregator.start_at(start).await;

    let TickOutcome::Completed { alerts, .. } = tick_at(&aggregator, start, 10).await else {
        panic!("tick should run");
    };
    assert_eq!(alerts.evaluated, 0);
    assert_eq!(alerts.skipped, 1);
    assert!(aggregator.reports().await.is_empty());

    aggregator.stop().await;
}
