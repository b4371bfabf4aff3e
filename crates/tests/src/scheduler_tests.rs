//! Timing tests for the drift-corrected scheduler.
//!
//! All tests run on paused tokio time, so sleeps complete instantly and the
//! recorded instants are exact to the timer's millisecond resolution.

use rtcperf_core::scheduler::Scheduler;
use std::{
    convert::Infallible,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::time::Instant;

type Spans = Arc<Mutex<Vec<(Instant, Instant)>>>;

/// Runs `ticks` invocations of a callback taking `work`, returning each
/// invocation's start and end.
async fn run_ticks(interval: Duration, work: Duration, ticks: usize) -> Vec<(Instant, Instant)> {
    let spans: Spans = Arc::new(Mutex::new(Vec::new()));
    let scheduler = Scheduler::new("timing", interval);

    let recorded = Arc::clone(&spans);
    scheduler.start(move |_now| {
        let recorded = Arc::clone(&recorded);
        async move {
            let started = Instant::now();
            tokio::time::sleep(work).await;
            recorded.lock().unwrap().push((started, Instant::now()));
            Ok::<(), Infallible>(())
        }
    });

    while spans.lock().unwrap().len() < ticks {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    scheduler.stop().await;

    let spans = spans.lock().unwrap().clone();
    spans
}

#[tokio::test(start_paused = true)]
async fn test_slow_callback_drift_stays_bounded() {
    let spans = run_ticks(Duration::from_millis(1000), Duration::from_millis(300), 10).await;
    assert!(spans.len() >= 10);

    // Gaps shrink from 1150 ms towards the interval, so ten ticks span about 9.3 s.
    let span = spans[9].0.duration_since(spans[0].0).as_millis();
    assert!((9250..=9350).contains(&span), "ten ticks took {span} ms");

    for pair in spans.windows(2) {
        let gap = pair[1].0.duration_since(pair[0].0).as_millis();
        assert!((995..=1160).contains(&gap), "gap of {gap} ms");
    }
}

#[tokio::test(start_paused = true)]
async fn test_invocations_never_overlap() {
    let spans = run_ticks(Duration::from_millis(100), Duration::from_millis(250), 8).await;

    for pair in spans.windows(2) {
        let (_, previous_end) = pair[0];
        let (next_start, _) = pair[1];
        assert!(next_start >= previous_end, "tick started before the previous one finished");
    }
}

#[tokio::test(start_paused = true)]
async fn test_fast_callback_keeps_the_interval() {
    let spans = run_ticks(Duration::from_millis(500), Duration::ZERO, 6).await;

    for pair in spans.windows(2) {
        let gap = pair[1].0.duration_since(pair[0].0).as_millis();
        assert!((499..=502).contains(&gap), "gap of {gap} ms");
    }
}
