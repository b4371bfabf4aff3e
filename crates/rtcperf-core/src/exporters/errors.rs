use thiserror::Error;

/// A sink failed to write or send one tick's output.
///
/// Logged with the sink's name and never retried; the next tick resends fresh data.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("render failed: {0}")]
    Render(String),
}
