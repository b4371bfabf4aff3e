use std::time::Duration;
use tokio::time::Instant;

/// Damped correction of timer drift.
///
/// Every time the next tick is armed, the gap since the previous arming is
/// compared to the interval. The difference, clamped to one interval either
/// way, is added to a running error sum and the next delay is shortened by
/// half of that sum. Over many ticks the average period converges to the
/// interval, whatever the callback's own runtime.
#[derive(Debug, Clone)]
pub struct DriftCorrector {
    interval_ms: f64,
    last: Option<Instant>,
    error_sum_ms: f64,
}

impl DriftCorrector {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval_ms: interval.as_secs_f64() * 1000.0, last: None, error_sum_ms: 0.0 }
    }

    /// Records an arming at `now` and returns how long to wait before the next tick.
    pub fn next_delay(&mut self, now: Instant) -> Duration {
        if let Some(last) = self.last {
            let gap_ms = now.duration_since(last).as_secs_f64() * 1000.0;
            let drift = (gap_ms - self.interval_ms).clamp(-self.interval_ms, self.interval_ms);
            self.error_sum_ms += drift;
        }
        self.last = Some(now);

        let delay_ms = (self.interval_ms - self.error_sum_ms / 2.0).max(0.0);
        Duration::from_secs_f64(delay_ms / 1000.0)
    }

    /// Accumulated drift in milliseconds.
    #[must_use]
    pub fn error_sum_ms(&self) -> f64 {
        self.error_sum_ms
    }
}
