//! Backend data access: the `Records` trait the service consumes and the
//! MongoDB implementation behind it.

mod base;
pub mod mongodb_store;

pub use base::{DataAccessError, Records, UserRecord};
pub use mongodb_store::{MongoConnector, MongoDBConfig};
