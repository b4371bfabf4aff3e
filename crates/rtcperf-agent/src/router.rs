use crate::middleware::{basic_auth_middleware, BasicAuthState};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rtcperf_core::{
    ingest::{ExternalConfig, ExternalStats},
    runtime::Aggregator,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::debug;

/// Largest accepted ingestion body, after decompression.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub metrics: PrometheusHandle,
}

/// Body of `PUT /collected-stats`.
#[derive(Debug, Deserialize)]
pub struct PushRequest {
    pub id: String,
    pub stats: ExternalStats,
    #[serde(default)]
    pub config: ExternalConfig,
}

/// Builds the agent's HTTP app.
///
/// `/collected-stats` requires basic auth as `admin:<secret>` and accepts
/// gzip-encoded bodies. `/health` and `/metrics` are public.
pub fn create_app(state: AppState, secret: &str) -> Router {
    let ingest = Router::new()
        .route(
            "/collected-stats",
            get(handle_get_collected_stats).put(handle_put_collected_stats),
        )
        .route_layer(middleware::from_fn_with_state(
            BasicAuthState::new(secret),
            basic_auth_middleware,
        ))
        .layer(RequestDecompressionLayer::new())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state.clone());

    let public = Router::new()
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .with_state(state);

    public.merge(ingest)
}

/// Stores a producer's pre-aggregated stats until they expire.
pub async fn handle_put_collected_stats(
    State(state): State<AppState>,
    Json(request): Json<PushRequest>,
) -> impl IntoResponse {
    debug!(source_id = %request.id, metrics = request.stats.len(), "PUT /collected-stats");
    state.aggregator.add_external_collected_stats(request.id, request.stats, request.config);
    Json(serde_json::json!({ "message": "Collected stats added" }))
}

/// Summaries of the last tick: metric to label to stats.
pub async fn handle_get_collected_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.aggregator.snapshot().summaries())
}

pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let aggregator = &state.aggregator;
    let body = serde_json::json!({
        "status": if aggregator.is_running() { "running" } else { "stopped" },
        "sessions": aggregator.session_count(),
        "external": aggregator.external_count(),
        "sinks": aggregator.sink_names(),
    });
    let status =
        if aggregator.is_running() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(body))
}

pub async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}
