//! Shared application state.

use std::sync::Arc;

use crate::config::Config;
use crate::connection::ConnectionSupervisor;
use crate::metrics::Metrics;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request handler; holds the configuration, the connection
/// supervisor and the metric set.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<Config>,
    /// Owner of the single backend connection slot.
    pub supervisor: Arc<ConnectionSupervisor>,
    /// Process-wide metric set.
    pub metrics: Metrics,
}
