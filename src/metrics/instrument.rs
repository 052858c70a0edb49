//! Request instrumentation middleware.

use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::metrics::MetricsRecorder;
use crate::state::AppState;

/// Times every inbound request and records it, labeled by method, matched
/// route and status code. Failed requests are recorded like successful ones;
/// the timer stops when the inner handler has produced its response.
pub async fn track_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().as_str().to_string();
    // Label by the route template rather than the raw path, so
    // `/welcome?x=1` and `/welcome` land in the same series.
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let started = Instant::now();
    let response = next.run(request).await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    state
        .metrics
        .record_http_request(&method, &route, response.status().as_u16(), elapsed_ms);

    response
}
