use std::time::Duration;
use thiserror::Error;

/// A producer failed to deliver its data for one tick.
///
/// Never fatal: the producer is skipped for the tick and stays registered.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("stats collection failed: {0}")]
    Failed(String),

    #[error("stats collection timed out after {0:?}")]
    Timeout(Duration),

    #[error("source unavailable")]
    Unavailable,
}
