//! HTTP surface — batch sync and SSE stream endpoints.
//!
//! Authentication lives upstream; the requester identity arrives in the
//! `X-Requester-Id` header set by that layer.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::StreamExt;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::pipeline::Dispatcher;
use crate::stream::{event_stream, render_event};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub config: PipelineConfig,
}

/// Build the service router. CORS is permissive for development, matching
/// the browser clients this serves.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/emails/sync", get(sync_emails))
        .route("/emails/stream", get(stream_emails))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    /// Provider-specific search expression; falls back to the configured
    /// default when absent.
    pub q: Option<String>,
}

fn requester_id(headers: &HeaderMap) -> String {
    headers
        .get("x-requester-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Batch mode: run the pipeline to completion and return a JSON array.
async fn sync_emails(
    State(state): State<AppState>,
    Query(params): Query<EmailQuery>,
    headers: HeaderMap,
) -> Response {
    let requester = requester_id(&headers);
    let query = params.q.unwrap_or_else(|| state.config.default_query.clone());

    match state.dispatcher.collect(&requester, &query).await {
        Ok(results) => Json(results).into_response(),
        Err(e) => {
            error!(error = %e, "Sync pipeline failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"error": "listing_failed"})),
            )
                .into_response()
        }
    }
}

/// Stream mode: results are pushed as they complete, with heartbeats
/// keeping the connection open. Dropping the connection cancels the
/// session and the workers behind it.
async fn stream_emails(
    State(state): State<AppState>,
    Query(params): Query<EmailQuery>,
    headers: HeaderMap,
) -> Response {
    let requester = requester_id(&headers);
    let query = params.q.unwrap_or_else(|| state.config.default_query.clone());
    info!(requester = %requester, "Stream session opened");

    let cancel = CancellationToken::new();
    let rx = state
        .dispatcher
        .stream(requester, query, cancel.child_token());

    let events = event_stream(rx, state.config.heartbeat, cancel.clone());

    // Dropping the response body (client disconnect) drops the guard,
    // which cancels the session and with it the worker pool.
    let guard = cancel.drop_guard();
    let frames = events.map(move |event| {
        let _session = &guard;
        Ok::<_, Infallible>(render_event(&event))
    });

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}
