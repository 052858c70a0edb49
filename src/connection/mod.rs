//! Backend connection lifecycle: the supervisor state machine, the backoff
//! policy between attempts, and the connector seam it drives.

mod backoff;
mod connector;
mod supervisor;

pub use backoff::BackoffPolicy;
pub use connector::{ConnectError, Connector};
pub use supervisor::{ConnectionState, ConnectionSupervisor};
