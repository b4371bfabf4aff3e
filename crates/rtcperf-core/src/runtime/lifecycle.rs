//! Aggregator lifecycle: source registration, start and stop.

use super::{
    builder::{AggregatorBuilder, AggregatorError},
    pipeline::{Pipeline, Sources, TickOutcome},
};
use crate::{
    alerts::AlertReportBook,
    config::AppConfig,
    ingest::{ExternalConfig, ExternalStats, Session},
    scheduler::Scheduler,
    stats::CollectedStats,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// The stats aggregator of one load-test process.
///
/// Owns the registered sessions, the external pushes and the per-run
/// pipeline. Once started, a [`Scheduler`] runs one tick per interval:
/// collect every source, publish a snapshot, evaluate alert rules, export.
/// All methods take `&self`; share it behind an [`Arc`].
pub struct Aggregator {
    config: AppConfig,
    sources: Arc<Sources>,
    pipeline: Arc<Mutex<Pipeline>>,
    scheduler: Scheduler,
    snapshot_tx: watch::Sender<Arc<CollectedStats>>,
    sink_names: Vec<&'static str>,
    next_session_id: AtomicU64,
    running: AtomicBool,
}

impl Aggregator {
    #[must_use]
    pub fn builder() -> AggregatorBuilder {
        AggregatorBuilder::new()
    }

    pub(super) fn new(
        config: AppConfig,
        sources: Arc<Sources>,
        pipeline: Pipeline,
        scheduler: Scheduler,
        snapshot_tx: watch::Sender<Arc<CollectedStats>>,
        sink_names: Vec<&'static str>,
    ) -> Self {
        let next_session_id = AtomicU64::new(config.stats.start_session_id);
        Self {
            config,
            sources,
            pipeline: Arc::new(Mutex::new(pipeline)),
            scheduler,
            snapshot_tx,
            sink_names,
            next_session_id,
            running: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Names of the active sinks, in export order.
    #[must_use]
    pub fn sink_names(&self) -> &[&'static str] {
        &self.sink_names
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Reserves `tabs` consecutive session ids and returns the first.
    pub fn consume_session_id(&self, tabs: u64) -> u64 {
        self.next_session_id.fetch_add(tabs.max(1), Ordering::SeqCst)
    }

    /// Registers a session to be pulled every tick.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::DuplicateSession`] if a session with the same
    /// id is already registered.
    pub fn add_session(&self, session: Arc<dyn Session>) -> Result<(), AggregatorError> {
        let id = session.id();
        let mut sessions = self.sources.sessions.write();
        if sessions.contains_key(&id) {
            return Err(AggregatorError::DuplicateSession(id));
        }
        sessions.insert(id, session);
        debug!(session_id = id, sessions = sessions.len(), "Session added");
        Ok(())
    }

    /// Unregisters a session. It is not stopped.
    pub fn remove_session(&self, id: u64) -> Option<Arc<dyn Session>> {
        let removed = self.sources.sessions.write().remove(&id);
        if removed.is_some() {
            debug!(session_id = id, "Session removed");
        }
        removed
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sources.sessions.read().len()
    }

    #[must_use]
    pub fn external_count(&self) -> usize {
        self.sources.external.len()
    }

    /// Stores pre-aggregated stats pushed by another producer.
    ///
    /// A later push with the same `id` replaces this one. The payload is
    /// merged on every tick until it is older than the stats timeout.
    pub fn add_external_collected_stats(
        &self,
        id: impl Into<String>,
        stats: ExternalStats,
        config: ExternalConfig,
    ) {
        self.add_external_collected_stats_at(id, stats, config, Utc::now());
    }

    /// Like [`add_external_collected_stats`](Self::add_external_collected_stats)
    /// with an explicit arrival time.
    pub fn add_external_collected_stats_at(
        &self,
        id: impl Into<String>,
        stats: ExternalStats,
        config: ExternalConfig,
        now: DateTime<Utc>,
    ) {
        self.sources.external.insert(id, stats, config, now);
    }

    /// Receives the collected stats after every tick.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<CollectedStats>> {
        self.snapshot_tx.subscribe()
    }

    /// The most recently published stats.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CollectedStats> {
        Arc::clone(&self.snapshot_tx.borrow())
    }

    /// A copy of the current run's alert reports.
    pub async fn reports(&self) -> AlertReportBook {
        self.pipeline.lock().await.reports().clone()
    }

    /// Start of the current (or last) run.
    pub async fn start_time(&self) -> DateTime<Utc> {
        self.pipeline.lock().await.start_time()
    }

    /// Starts a run: opens the sinks and schedules ticks.
    ///
    /// Returns `false` and does nothing when already running.
    pub async fn start(&self) -> bool {
        self.start_at(Utc::now()).await
    }

    /// Like [`start`](Self::start) with an explicit run start.
    pub async fn start_at(&self, start: DateTime<Utc>) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Aggregator already running, ignoring start");
            return false;
        }

        self.pipeline.lock().await.begin(start).await;

        let pipeline = Arc::clone(&self.pipeline);
        let sources = Arc::clone(&self.sources);
        self.scheduler.start(move |now| {
            let pipeline = Arc::clone(&pipeline);
            let sources = Arc::clone(&sources);
            async move {
                pipeline.lock().await.run_tick(now, &sources).await;
                Ok::<(), Infallible>(())
            }
        });

        info!(interval_ms = self.scheduler.interval().as_millis(), "Aggregator started");
        true
    }

    /// Runs one tick immediately, serialized with scheduled ones.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        self.pipeline.lock().await.run_tick(now, &self.sources).await
    }

    /// Stops the run.
    ///
    /// Waits for an in-flight tick, stops and drops every session, drops the
    /// external pushes, closes the sinks and clears the run's data. Calling it
    /// when not running is a no-op.
    pub async fn stop(&self) {
        if self
            .running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Aggregator not running, ignoring stop");
            return;
        }

        info!("Stopping aggregator");
        self.scheduler.stop().await;

        let sessions: Vec<Arc<dyn Session>> =
            std::mem::take(&mut *self.sources.sessions.write()).into_values().collect();
        let results = join_all(sessions.iter().map(|s| async move { (s.id(), s.stop().await) })).await;
        for (id, result) in results {
            if let Err(e) = result {
                warn!(session_id = id, error = %e, "Failed to stop session");
            }
        }
        self.sources.external.clear();

        self.pipeline.lock().await.end().await;
        info!(sessions = sessions.len(), "Aggregator stopped");
    }
}
