//! Per-tick ingestion: reset, pull every session, merge external pushes.

use super::{external::MergeOutcome, fold_session_stats, ExternalStore, Session, SourceError};
use crate::{metrics, stats::CollectedStats};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};
use url::Url;

/// Run-config document sent with every remote push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    pub url: String,
    pub pages: usize,
    /// Run start in milliseconds since the epoch.
    pub start_time: i64,
}

/// Strips user and password from a URL. Unparsable input is returned as is.
#[must_use]
pub fn hide_auth(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.to_string()
        }
        Err(_) => raw.to_string(),
    }
}

/// Counts of what one ingestion pass saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectOutcome {
    pub sessions_ok: usize,
    pub sessions_failed: usize,
    pub external: MergeOutcome,
}

/// Folds every source into the run's [`CollectedStats`] once per tick.
#[derive(Debug, Clone)]
pub struct Collector {
    pull_timeout: Duration,
    external_timeout: Duration,
}

impl Collector {
    /// `pull_timeout` bounds each session pull; `external_timeout` is the
    /// maximum age of an external push.
    #[must_use]
    pub fn new(pull_timeout: Duration, external_timeout: Duration) -> Self {
        Self { pull_timeout, external_timeout }
    }

    /// Resets `stats` and refills it from `sessions` and `external`.
    ///
    /// Sessions are pulled concurrently and all pulls are awaited before
    /// anything is merged. A failed or timed-out pull is logged and skipped for
    /// this tick only.
    pub async fn collect(
        &self,
        now: DateTime<Utc>,
        sessions: &[Arc<dyn Session>],
        external: &ExternalStore,
        stats: &mut CollectedStats,
        run: &mut RunInfo,
    ) -> CollectOutcome {
        stats.reset();
        run.pages = 0;

        let timeout = self.pull_timeout;
        let pulls = sessions.iter().map(|session| async move {
            let result = match tokio::time::timeout(timeout, session.update_stats(now)).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout(timeout)),
            };
            (session, result)
        });

        let mut outcome = CollectOutcome::default();
        for (session, result) in join_all(pulls).await {
            if let Some(url) = session.url().filter(|u| !u.is_empty()) {
                run.url = hide_auth(&url);
            }
            run.pages += session.pages();

            match result {
                Ok(batch) => {
                    fold_session_stats(stats, &batch);
                    outcome.sessions_ok += 1;
                }
                Err(e) => {
                    warn!(session_id = session.id(), error = %e, "Session stats collection failed");
                    metrics::record_source_error("session", &e);
                    outcome.sessions_failed += 1;
                }
            }
        }

        outcome.external = external.merge_into(stats, run, now, self.external_timeout);
        debug!(
            sessions_ok = outcome.sessions_ok,
            sessions_failed = outcome.sessions_failed,
            external_merged = outcome.external.merged,
            external_expired = outcome.external.expired,
            "Stats collected"
        );
        outcome
    }
}
