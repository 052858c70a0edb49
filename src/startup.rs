//! Application startup and server initialization.
//!
//! Wires the metric set, the connection supervisor and the HTTP server
//! together, seeds the demo record once the backend first becomes reachable,
//! and runs until interrupted.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::connection::{ConnectionState, ConnectionSupervisor};
use crate::metrics::Metrics;
use crate::routes;
use crate::state::AppState;
use crate::store::MongoConnector;

/// The record the data endpoint serves out of the box.
const DEMO_USER_NAME: &str = "Pedro Tavares";

/// Initializes and runs the application server.
///
/// # Errors
///
/// Returns an error for startup configuration problems (metric registration,
/// bind failure) or a runtime serve error. Backend connection failures are
/// never returned from here; the supervisor retries them forever.
pub async fn run(config: Arc<Config>) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = Metrics::new(&config.metrics.duration_buckets_ms)?;

    let connector = Arc::new(MongoConnector::new(config.backend.clone()));
    let supervisor = Arc::new(ConnectionSupervisor::start(
        connector,
        config.retry.policy(),
        config.retry.probe_interval(),
        Arc::new(metrics.clone()),
    ));

    spawn_seeder(supervisor.clone());

    let state = AppState {
        config: config.clone(),
        supervisor: supervisor.clone(),
        metrics,
    };
    let app = routes::create_router(state);

    info!("Starting server on {}", config.bind_address);
    let listener = TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    supervisor.stop();
    Ok(())
}

/// One-shot initializer that waits for the first Connected state and then
/// idempotently seeds the demo record. Deliberately outside the supervisor:
/// it is product-demo behavior, not part of the connection lifecycle.
fn spawn_seeder(supervisor: Arc<ConnectionSupervisor>) {
    let mut state_rx = supervisor.subscribe();
    tokio::spawn(async move {
        if state_rx
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .is_err()
        {
            return;
        }
        let Some(records) = supervisor.current_handle() else {
            return;
        };
        match records.seed_user(DEMO_USER_NAME).await {
            Ok(()) => info!("{} saved to the database", DEMO_USER_NAME),
            Err(e) => warn!(error = %e, "Failed to seed the demo record"),
        }
    });
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Failed to listen for the interrupt signal");
    }
}
