use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, to_bson};
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, FindOneOptions, UpdateOptions};
use mongodb::{Client, Collection, Database};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::connection::{ConnectError, Connector};
use crate::store::{DataAccessError, Records, UserRecord};

/// The config struct for MongoDB connections.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
#[serde(default)]
pub struct MongoDBConfig {
    pub uri: String,
    pub database: String,
    pub app_name: String,
    /// Upper bound on how long one connect attempt may take before it counts
    /// as failed.
    pub connect_timeout_ms: u64,
}

impl Default for MongoDBConfig {
    fn default() -> Self {
        MongoDBConfig {
            uri: "mongodb://localhost:27017/test".to_string(),
            database: "test".to_string(),
            app_name: "tetherd".to_string(),
            connect_timeout_ms: 5000,
        }
    }
}

/// Document shape for user records.
#[derive(Serialize, Deserialize, Clone, Debug)]
struct UserDocument {
    _id: ObjectId,
    name: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

impl UserDocument {
    fn new(name: &str) -> Self {
        UserDocument {
            _id: ObjectId::new(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// A concrete `Records` implementation bound to one established MongoDB
/// connection.
pub struct MongoRecords {
    database: Database,
    users: Collection<UserDocument>,
}

impl MongoRecords {
    fn new(database: Database) -> Self {
        let users = database.collection::<UserDocument>("users");
        MongoRecords { database, users }
    }

    fn doc_to_user(doc: &UserDocument) -> UserRecord {
        UserRecord {
            name: doc.name.clone(),
        }
    }
}

#[async_trait]
impl Records for MongoRecords {
    async fn first_user(&self) -> Result<Option<UserRecord>, DataAccessError> {
        let options = FindOneOptions::builder()
            .sort(doc! { "created_at": 1 })
            .build();
        let doc = self
            .users
            .find_one(doc! {}, options)
            .await
            .map_err(classify)?;
        Ok(doc.as_ref().map(Self::doc_to_user))
    }

    async fn seed_user(&self, name: &str) -> Result<(), DataAccessError> {
        let seed = UserDocument::new(name);
        let seed = to_bson(&seed)
            .map_err(|e| DataAccessError::Query(format!("Failed to encode seed document: {}", e)))?;
        let result = self
            .users
            .update_one(
                doc! { "name": name },
                doc! { "$setOnInsert": seed },
                UpdateOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(classify)?;
        if result.upserted_id.is_some() {
            debug!(name, "Inserted seed user record");
        } else {
            debug!(name, "Seed user record already present");
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), DataAccessError> {
        self.database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map(|_| ())
            .map_err(classify)
    }
}

/// Distinguishes a broken connection from an ordinary query failure so the
/// supervisor only tears down the slot when the transport itself died.
fn classify(e: mongodb::error::Error) -> DataAccessError {
    match e.kind.as_ref() {
        ErrorKind::Io(_)
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::ConnectionPoolCleared { .. } => DataAccessError::ConnectionLost(e.to_string()),
        _ => DataAccessError::Query(e.to_string()),
    }
}

/// Connector that establishes MongoDB connections from the configured URI.
pub struct MongoConnector {
    config: MongoDBConfig,
}

impl MongoConnector {
    pub fn new(config: MongoDBConfig) -> Self {
        MongoConnector { config }
    }
}

#[async_trait]
impl Connector for MongoConnector {
    async fn connect(&self) -> Result<Arc<dyn Records>, ConnectError> {
        let mut client_options = ClientOptions::parse(&self.config.uri)
            .await
            .map_err(|e| ConnectError::InvalidUri(format!("Failed to parse MongoDB URI: {}", e)))?;
        client_options.app_name = Some(self.config.app_name.clone());
        client_options.server_selection_timeout =
            Some(Duration::from_millis(self.config.connect_timeout_ms));

        let client = Client::with_options(client_options).map_err(|e| {
            ConnectError::InvalidUri(format!("Failed to create MongoDB client: {}", e))
        })?;
        let database = client.database(&self.config.database);

        // The client is lazy; a ping is what actually proves the backend is
        // reachable before the handle is handed to the supervisor.
        database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| ConnectError::Unreachable(e.to_string()))?;

        info!(database = %self.config.database, "MongoDB connection established");
        Ok(Arc::new(MongoRecords::new(database)))
    }
}
