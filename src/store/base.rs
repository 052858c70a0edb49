//! The data-access seam between request handling and the backend.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from Connected-state backend operations.
///
/// `ConnectionLost` means the handle itself has broken and the supervisor
/// should tear it down; anything else is a plain query failure that leaves
/// the connection state untouched.
#[derive(Debug, Error)]
pub enum DataAccessError {
    #[error("backend query failed: {0}")]
    Query(String),
    #[error("backend connection lost: {0}")]
    ConnectionLost(String),
}

impl DataAccessError {
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, DataAccessError::ConnectionLost(_))
    }
}

/// A user record as served by the data endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
}

/// The operations the service needs from an established backend connection.
/// One implementor per live connection; handed out by the supervisor.
#[async_trait]
pub trait Records: Send + Sync {
    /// Fetches the oldest user record, if any exist.
    async fn first_user(&self) -> Result<Option<UserRecord>, DataAccessError>;

    /// Idempotently ensures the named demo user exists.
    async fn seed_user(&self, name: &str) -> Result<(), DataAccessError>;

    /// Cheap liveness probe of the underlying connection.
    async fn ping(&self) -> Result<(), DataAccessError>;
}
