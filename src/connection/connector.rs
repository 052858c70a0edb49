//! The connector abstraction the supervisor drives.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::store::Records;

/// Errors from a connection attempt. Always transient from the supervisor's
/// point of view: every variant is retried indefinitely.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid backend URI: {0}")]
    InvalidUri(String),
    #[error("backend unreachable: {0}")]
    Unreachable(String),
}

/// Establishes one backend connection and hands back the data-access handle
/// for it. Implemented for the real MongoDB backend and by fakes in tests, so
/// the supervisor's state machine can be exercised without real I/O.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Arc<dyn Records>, ConnectError>;
}
