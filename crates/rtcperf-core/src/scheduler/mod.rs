//! Drift-corrected periodic task runner.
//!
//! A [`Scheduler`] calls an async callback once per interval until stopped.
//! The next tick is only armed after the callback has completed, so
//! invocations never overlap even when a callback overruns its interval.
//! Callback errors and panics are logged and never end the loop.

mod drift;

pub use drift::DriftCorrector;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::{fmt::Display, future::Future, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::Instant};
use tracing::{debug, error, info, warn};

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Periodic runner owning at most one background task.
pub struct Scheduler {
    name: String,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        let name = name.into();
        debug!(scheduler = %name, interval_ms = interval.as_millis(), "Scheduler created");
        Self { name, interval, running: Mutex::new(None) }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().as_ref().is_some_and(|r| !r.task.is_finished())
    }

    /// Starts ticking. Returns `false` without side effects when already running.
    ///
    /// Each invocation receives the wall-clock time at which it fired. The
    /// callback runs on its own task so that a panic is contained to one tick.
    pub fn start<F, Fut, E>(&self, mut callback: F) -> bool
    where
        F: FnMut(DateTime<Utc>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            return false;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let name = self.name.clone();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            info!(scheduler = %name, interval_ms = interval.as_millis(), "Scheduler started");
            let mut drift = DriftCorrector::new(interval);

            loop {
                let delay = drift.next_delay(Instant::now());
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                let started = Instant::now();
                let tick = tokio::spawn(callback(Utc::now()));
                match tick.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(scheduler = %name, error = %e, "Scheduler callback failed"),
                    Err(e) if e.is_panic() => {
                        error!(scheduler = %name, error = ?e, "Scheduler callback panicked - recovering");
                    }
                    Err(_) => warn!(scheduler = %name, "Scheduler callback was cancelled"),
                }

                let elapsed = started.elapsed();
                if elapsed > interval {
                    warn!(
                        scheduler = %name,
                        elapsed_ms = elapsed.as_millis(),
                        interval_ms = interval.as_millis(),
                        "Scheduler callback overran its interval"
                    );
                } else {
                    debug!(
                        scheduler = %name,
                        elapsed_ms = elapsed.as_millis(),
                        drift_ms = drift.error_sum_ms(),
                        "Scheduler tick complete"
                    );
                }

                if *shutdown_rx.borrow() {
                    break;
                }
            }

            info!(scheduler = %name, "Scheduler stopped");
        });

        *running = Some(Running { shutdown, task });
        true
    }

    /// Stops ticking and waits for an in-flight callback to finish.
    ///
    /// No callback fires after this returns. Must not be awaited from inside
    /// the scheduler's own callback.
    pub async fn stop(&self) {
        let Some(Running { shutdown, task }) = self.running.lock().take() else {
            return;
        };
        let _ = shutdown.send(true);
        if let Err(e) = task.await {
            if e.is_panic() {
                error!(scheduler = %self.name, error = ?e, "Scheduler task panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.task.abort();
        }
    }
}
