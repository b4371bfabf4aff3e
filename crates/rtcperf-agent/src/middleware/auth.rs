//! Basic authentication for the ingestion endpoint.
//!
//! Producers authenticate as user `admin` with the shared push secret, the
//! same credentials the remote push sink sends.

#![allow(clippy::missing_errors_doc)]

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use subtle::ConstantTimeEq;

pub const INGEST_USER: &str = "admin";

/// Expected `user:password` pair.
#[derive(Clone)]
pub struct BasicAuthState {
    credentials: Arc<String>,
}

impl BasicAuthState {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self { credentials: Arc::new(format!("{INGEST_USER}:{secret}")) }
    }
}

/// Rejects requests without valid `Authorization: Basic` credentials.
///
/// Comparison is constant-time. Returns `401 Unauthorized` with a
/// `WWW-Authenticate` challenge when the header is missing or wrong.
pub async fn basic_auth_middleware(
    State(auth): State<BasicAuthState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(|v| STANDARD.decode(v.trim()).ok());

    match provided {
        Some(decoded) if decoded.ct_eq(auth.credentials.as_bytes()).into() => {
            Ok(next.run(request).await)
        }
        _ => {
            tracing::debug!(uri = %request.uri(), "Rejected unauthenticated request");
            Err(unauthorized())
        }
    }
}

fn unauthorized() -> Response {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header("WWW-Authenticate", "Basic realm=\"rtcperf\"")
        .body(Body::empty())
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
