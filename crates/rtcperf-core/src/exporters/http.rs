//! HTTP plumbing shared by the gateway and remote push sinks.

use super::ExportError;
use flate2::{write::GzEncoder, Compression};
use reqwest::{Client, ClientBuilder, RequestBuilder};
use std::{io::Write, time::Duration};

/// Bodies strictly larger than this are gzip-compressed by the remote push sink.
pub const GZIP_THRESHOLD_BYTES: usize = 16 * 1024;

/// Builds the client used by one sink.
///
/// # Errors
///
/// Returns [`ExportError::Http`] if the TLS backend cannot be initialised.
pub fn build_client(timeout: Duration) -> Result<Client, ExportError> {
    let client = ClientBuilder::new()
        .pool_idle_timeout(Duration::from_secs(30))
        .connect_timeout(timeout)
        .timeout(timeout)
        .use_rustls_tls()
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!("rtcperf/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            tracing::error!(error = %e, "failed to build http client");
            ExportError::Http(e)
        })?;
    Ok(client)
}

/// Gzip-compresses `body` at the default level.
///
/// # Errors
///
/// Returns [`ExportError::Io`] if the encoder fails.
pub fn gzip(body: &[u8]) -> Result<Vec<u8>, ExportError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 4), Compression::default());
    encoder.write_all(body)?;
    Ok(encoder.finish()?)
}

/// Sends a request and maps any non-success status to [`ExportError::Status`].
///
/// # Errors
///
/// Returns [`ExportError::Http`] on transport failures and [`ExportError::Status`]
/// when the sink answers with an error status.
pub async fn send(request: RequestBuilder) -> Result<String, ExportError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_success() {
        Ok(body)
    } else {
        Err(ExportError::Status { status: status.as_u16(), body })
    }
}

/// Splits `user:password`. A value without a colon is a user with an empty password.
#[must_use]
pub fn split_basic_auth(auth: &str) -> (String, String) {
    match auth.split_once(':') {
        Some((user, password)) => (user.to_string(), password.to_string()),
        None => (auth.to_string(), String::new()),
    }
}
