//! Ingestion of session pulls and external pushes into [`CollectedStats`](crate::stats::CollectedStats).

pub mod collector;
pub mod errors;
pub mod external;
pub mod source;

pub use collector::{hide_auth, CollectOutcome, Collector, RunInfo};
pub use errors::SourceError;
pub use external::{ExternalConfig, ExternalStats, ExternalStore, MergeOutcome};
pub use source::{fold_session_stats, parse_track_key, KeyedValue, MetricValue, Session, SessionStats};
