//! HTTP route definitions and handlers.

mod health_routes;
mod metrics_routes;
mod welcome_routes;

use axum::middleware;
use axum::Router;

use crate::metrics::instrument;
use crate::state::AppState;

/// Creates the application router with all configured routes, wrapped in the
/// request instrumentation middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(welcome_routes::routes())
        .merge(metrics_routes::routes())
        .merge(health_routes::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            instrument::track_requests,
        ))
        .with_state(state)
}
