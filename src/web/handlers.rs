//! HTTP handlers for the relay API.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{self, HeaderName};
use axum::response::sse::Sse;
use axum::response::{Html, IntoResponse};
use axum::Json;
use futures_util::stream::StreamExt;

use super::api::HealthResponse;
use crate::monitor::MonitorController;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Monitoring lifecycle and broker.
    pub monitor: Arc<MonitorController>,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(monitor: Arc<MonitorController>) -> Self {
        Self { monitor }
    }
}

/// GET /events - SSE stream of journal records.
///
/// The stream starts with a `connected` frame and only carries records
/// written after the client attached.
pub async fn get_events_sse(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.monitor.attach_session();
    let stream = session
        .into_stream()
        .map(|frame| Ok::<_, Infallible>(frame.to_sse_event()));

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            // Keeps reverse proxies from buffering the stream
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream),
    )
}

/// GET /health - Monitoring status.
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let broker = state.monitor.broker();
    Json(HealthResponse::new(
        state.monitor.status(),
        broker.subscriber_count(),
        broker.published_count(),
    ))
}

/// GET / - Minimal page that prints incoming frames.
pub async fn get_index() -> Html<&'static str> {
    Html(include_str!("index.html"))
}
