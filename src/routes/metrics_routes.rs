//! Metrics exposition endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::metrics::{exposition, MetricsRecorder};
use crate::state::AppState;

/// Creates the metrics route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Handler for the /metrics endpoint.
///
/// Always available, whatever the connection state: the metrics describe the
/// service even while the backend is down.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.record_metrics_read();
    let metrics_text = state.metrics.render();

    (
        StatusCode::OK,
        [("Content-Type", exposition::CONTENT_TYPE)],
        metrics_text,
    )
}
