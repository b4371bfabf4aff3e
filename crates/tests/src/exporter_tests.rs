//! Integration tests for the network and file sinks, driven through the aggregator.
//!
//! Remote endpoints are mocked with mockito; files go to a temporary directory.

use crate::mock_infrastructure::{config_with_rules, quiet_config, ScriptedSession};
use chrono::{Duration as ChronoDuration, Utc};
use mockito::Matcher;
use rtcperf_core::{config::AppConfig, runtime::Aggregator};
use serde_json::json;

/// `admin:secret` as a basic auth header.
const ADMIN_AUTH: &str = "Basic YWRtaW46c2VjcmV0";

fn build(config: AppConfig) -> Aggregator {
    Aggregator::builder().with_config(config).build().expect("aggregator should build")
}

#[tokio::test]
async fn test_gateway_deletes_on_start_and_stop_and_puts_each_tick() {
    let mut server = mockito::Server::new_async().await;
    let delete = server
        .mock("DELETE", "/metrics/job/load-test")
        .with_status(202)
        .expect(2)
        .create_async()
        .await;
    let put = server
        .mock("PUT", "/metrics/job/load-test")
        .match_header("content-type", "text/plain; version=0.0.4")
        .match_header("content-encoding", "gzip")
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let mut config = quiet_config();
    config.gateway.url = server.url();
    config.gateway.job_name = "load-test".into();
    let aggregator = build(config);
    aggregator
        .add_session(ScriptedSession::new(1).with_scalar("cpu", 12.0).into_arc())
        .unwrap();

    assert!(aggregator.start().await);
    aggregator.tick(Utc::now()).await;
    aggregator.tick(Utc::now()).await;
    aggregator.stop().await;

    put.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn test_gateway_plain_body_with_auth() {
    let mut server = mockito::Server::new_async().await;
    server.mock("DELETE", "/metrics/job/default").with_status(202).create_async().await;
    let put = server
        .mock("PUT", "/metrics/job/default")
        .match_header("authorization", "Basic dXNlcjpwYXNz")
        .match_header("content-encoding", Matcher::Missing)
        .match_body(Matcher::Regex(r#"wst_cpu_mean\{[^}]*datetime="\d+"[^}]*\} 12\n"#.into()))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let mut config = quiet_config();
    config.gateway.url = server.url();
    config.gateway.auth = Some("user:pass".into());
    config.gateway.gzip = false;
    let aggregator = build(config);
    aggregator
        .add_session(ScriptedSession::new(1).with_scalar("cpu", 12.0).into_arc())
        .unwrap();

    aggregator.start().await;
    aggregator.tick(Utc::now()).await;
    put.assert_async().await;
    aggregator.stop().await;
}

#[tokio::test]
async fn test_gateway_failure_does_not_stop_other_sinks() {
    let mut server = mockito::Server::new_async().await;
    server.mock("DELETE", Matcher::Any).with_status(500).create_async().await;
    server.mock("PUT", "/metrics/job/default").with_status(500).create_async().await;
    let push = server
        .mock("PUT", "/collected-stats")
        .with_status(200)
        .with_body(r#"{"message":"Collected stats added"}"#)
        .expect(1)
        .create_async()
        .await;

    let mut config = quiet_config();
    config.gateway.url = server.url();
    config.push.url = server.url();
    let aggregator = build(config);
    aggregator
        .add_session(ScriptedSession::new(1).with_scalar("cpu", 12.0).into_arc())
        .unwrap();

    aggregator.start().await;
    let outcome = aggregator.tick(Utc::now()).await;
    assert!(matches!(
        outcome,
        rtcperf_core::runtime::TickOutcome::Completed { failed_sinks: 1, .. }
    ));
    push.assert_async().await;
    aggregator.stop().await;
}

#[tokio::test]
async fn test_push_sends_raw_series_with_basic_auth() {
    let mut server = mockito::Server::new_async().await;
    let push = server
        .mock("PUT", "/collected-stats")
        .match_header("authorization", ADMIN_AUTH)
        .match_header("content-type", "application/json")
        .match_header("content-encoding", Matcher::Missing)
        .match_body(Matcher::PartialJson(json!({
            "id": "worker-7",
            "stats": { "cpu": { "all": [10.0, 30.0] } },
            "config": { "url": "https://meet.example/room", "pages": 2 }
        })))
        .with_status(200)
        .with_body(r#"{"message":"Collected stats added"}"#)
        .expect(1)
        .create_async()
        .await;

    let mut config = quiet_config();
    config.push.url = server.url();
    config.push.id = "worker-7".into();
    let aggregator = build(config);
    for (id, cpu) in [(1, 10.0), (2, 30.0)] {
        let session = ScriptedSession::new(id)
            .with_scalar("cpu", cpu)
            .with_page("https://meet.example/room", 1)
            .into_arc();
        aggregator.add_session(session).unwrap();
    }

    aggregator.start().await;
    aggregator.tick(Utc::now()).await;
    push.assert_async().await;
    aggregator.stop().await;
}

#[tokio::test]
async fn test_push_compresses_large_bodies() {
    let mut server = mockito::Server::new_async().await;
    let push = server
        .mock("PUT", "/collected-stats")
        .match_header("authorization", ADMIN_AUTH)
        .match_header("content-encoding", "gzip")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let mut config = quiet_config();
    config.push.url = server.url();
    let aggregator = build(config);
    for id in 0..3000_u32 {
        let session = ScriptedSession::new(u64::from(id))
            .with_scalar("cpu", f64::from(id) * 1.234_567)
            .into_arc();
        aggregator.add_session(session).unwrap();
    }

    aggregator.start().await;
    aggregator.tick(Utc::now()).await;
    push.assert_async().await;
    aggregator.stop().await;
}

#[tokio::test]
async fn test_csv_writes_header_once_and_a_row_per_tick() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("stats");
    let mut config = quiet_config();
    config.stats.stats_path = dir.to_string_lossy().into_owned();
    let aggregator = build(config);
    aggregator
        .add_session(ScriptedSession::new(1).with_scalar("cpu", 12.5).into_arc())
        .unwrap();

    let start = Utc::now();
    aggregator.start_at(start).await;
    aggregator.tick(start + ChronoDuration::seconds(15)).await;
    aggregator.tick(start + ChronoDuration::seconds(30)).await;
    aggregator.stop().await;

    let file = dir.join(format!("{}.csv", start.format("%Y-%m-%d_%H.%M.%S")));
    let content = std::fs::read_to_string(&file).expect("csv written");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("datetime,"));
    assert!(lines[0].contains("cpu_length,cpu_sum,cpu_mean,cpu_stdev,cpu_5p,cpu_95p,cpu_min,cpu_max"));
    assert!(lines[1].contains(",1,12.500,12.500,"));
}

#[tokio::test]
async fn test_report_file_json() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("reports/alerts.json");
    let mut config = config_with_rules(r#"{"cpu": {"tags": ["perf"], "p95": {"$lt": 25}}}"#);
    config.alerts.report_filename = path.to_string_lossy().into_owned();
    let aggregator = build(config);
    for (id, cpu) in [(1, 10.0), (2, 20.0), (3, 30.0)] {
        aggregator
            .add_session(ScriptedSession::new(id).with_scalar("cpu", cpu).into_arc())
            .unwrap();
    }

    let start = Utc::now();
    aggregator.start_at(start).await;
    for secs in [15, 30, 45] {
        aggregator.tick(start + ChronoDuration::seconds(secs)).await;
    }
    aggregator.stop().await;

    let content = std::fs::read_to_string(&path).expect("report written");
    let report: serde_json::Value = serde_json::from_str(&content).expect("valid json");
    let entry = &report["reports"]["cpu p95 < 25"];
    assert_eq!(entry["totalFails"], 3);
    assert_eq!(entry["totalFailsTime"], 30.0);
    assert_eq!(entry["totalFailsPerc"], 67.0);
    assert_eq!(entry["failAmount"], 16.0);
    assert_eq!(report["tags"]["perf"], 16.0);
}
