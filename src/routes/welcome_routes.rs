//! The data endpoint, served only while the backend connection is up.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tracing::{debug, error};

use crate::metrics::MetricsRecorder;
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

/// Registers the data route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/welcome", get(welcome))
}

/// Serves a greeting derived from the oldest backend record.
///
/// Responds 503 whenever the connection slot is not ready; the request never
/// waits for a connection to appear.
async fn welcome(State(state): State<AppState>) -> Result<impl IntoResponse, HTTPError> {
    debug!("Client request received");

    let Some(records) = state.supervisor.current_handle() else {
        state.metrics.record_unavailable();
        return Err(HTTPError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "The database connection is not ready",
        ));
    };

    match records.first_user().await {
        Ok(Some(user)) => {
            state.metrics.record_app_call();
            Ok((
                StatusCode::OK,
                format!(
                    "Hello Client! There is one record in the database for {}",
                    user.name
                ),
            ))
        }
        Ok(None) => Err(HTTPError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "There are no records in the database yet",
        )),
        Err(e) if e.is_connection_lost() => {
            // The handle died under us; let the supervisor tear it down and
            // tell the caller the same thing as any other disconnected state.
            state.supervisor.report_connection_lost();
            state.metrics.record_unavailable();
            error!(error = %e, "Lost the database connection while serving a request");
            Err(HTTPError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "The database connection was lost",
            ))
        }
        Err(e) => {
            error!(error = %e, "Failed to read from the database");
            Err(HTTPError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read from the database",
            ))
        }
    }
}
