//! Remote push of raw series to another aggregator.

use super::{
    http::{build_client, gzip, send, GZIP_THRESHOLD_BYTES},
    ExportError, Exporter, TickContext,
};
use crate::ingest::RunInfo;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Serialize;
use std::{collections::BTreeMap, time::Duration};
use tracing::debug;

const TIMEOUT: Duration = Duration::from_secs(10);
const AUTH_USER: &str = "admin";

/// Body of `PUT /collected-stats`.
#[derive(Debug, Serialize)]
pub struct PushBody<'a> {
    pub id: &'a str,
    pub stats: BTreeMap<String, BTreeMap<String, Vec<f64>>>,
    pub config: &'a RunInfo,
}

/// Sends every non-empty series of the tick, best effort.
pub struct PushExporter {
    client: Client,
    url: String,
    id: String,
    secret: String,
}

impl PushExporter {
    /// # Errors
    ///
    /// Returns [`ExportError::Http`] if the HTTP client cannot be built.
    pub fn new(url: &str, id: &str, secret: &str) -> Result<Self, ExportError> {
        Ok(Self {
            client: build_client(TIMEOUT)?,
            url: format!("{}/collected-stats", url.trim_end_matches('/')),
            id: id.to_string(),
            secret: secret.to_string(),
        })
    }

    /// Serialized body, gzip-compressed when above the size threshold.
    ///
    /// Returns the bytes and whether they are compressed.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] on serialization or compression failure.
    pub fn encode_body(&self, ctx: &TickContext<'_>) -> Result<(Vec<u8>, bool), ExportError> {
        let body = PushBody { id: &self.id, stats: ctx.stats.raw_values(), config: ctx.run };
        let json = serde_json::to_vec(&body)?;
        if json.len() > GZIP_THRESHOLD_BYTES {
            Ok((gzip(&json)?, true))
        } else {
            Ok((json, false))
        }
    }
}

#[async_trait]
impl Exporter for PushExporter {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn export(&mut self, ctx: &TickContext<'_>) -> Result<(), ExportError> {
        let (body, compressed) = self.encode_body(ctx)?;
        let mut request = self
            .client
            .put(&self.url)
            .basic_auth(AUTH_USER, Some(&self.secret))
            .header(header::CONTENT_TYPE, "application/json");
        if compressed {
            request = request.header(header::CONTENT_ENCODING, "gzip");
        }
        let response = send(request.body(body)).await?;
        debug!(url = %self.url, compressed, response = %response, "Stats pushed");
        Ok(())
    }
}
