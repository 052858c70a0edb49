//! Health check endpoints.

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// Registers health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Liveness check: a 200 means the process is serving, regardless of the
/// backend connection.
async fn health_check() -> impl IntoResponse {
    Response::new(Body::from("OK"))
}
