use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use figment::providers::{Format, Yaml};
use figment::Figment;
use tokio::time::sleep;

use tetherd::config::Config;
use tetherd::connection::{ConnectError, ConnectionSupervisor, Connector};
use tetherd::metrics::Metrics;
use tetherd::routes::create_router;
use tetherd::state::AppState;
use tetherd::store::{DataAccessError, Records, UserRecord};

const TEST_CONFIG: &str = r#"
bind_address: "127.0.0.1:0"
retry:
  strategy: fixed
  base_ms: 5
  probe_interval_secs: 60
logging:
  level: "debug"
  format: "json"
"#;

pub fn load_test_config() -> Config {
    Figment::new()
        .merge(Yaml::string(TEST_CONFIG))
        .extract()
        .expect("Failed to parse test config YAML")
}

/// What a fake backend returns for data queries.
#[derive(Clone)]
pub enum QueryBehavior {
    User(String),
    Empty,
    ConnectionLost,
}

pub struct FakeRecords {
    behavior: QueryBehavior,
}

#[async_trait]
impl Records for FakeRecords {
    async fn first_user(&self) -> Result<Option<UserRecord>, DataAccessError> {
        match &self.behavior {
            QueryBehavior::User(name) => Ok(Some(UserRecord { name: name.clone() })),
            QueryBehavior::Empty => Ok(None),
            QueryBehavior::ConnectionLost => Err(DataAccessError::ConnectionLost(
                "socket closed".to_string(),
            )),
        }
    }

    async fn seed_user(&self, _name: &str) -> Result<(), DataAccessError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), DataAccessError> {
        Ok(())
    }
}

/// Fails the first `fail_first` connect attempts, then hands out records with
/// the configured query behavior.
pub struct FakeConnector {
    fail_first: AtomicU32,
    behavior: QueryBehavior,
}

impl FakeConnector {
    pub fn new(fail_first: u32, behavior: QueryBehavior) -> Arc<Self> {
        Arc::new(FakeConnector {
            fail_first: AtomicU32::new(fail_first),
            behavior,
        })
    }

    pub fn always_failing() -> Arc<Self> {
        Self::new(u32::MAX, QueryBehavior::Empty)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<Arc<dyn Records>, ConnectError> {
        sleep(Duration::from_millis(1)).await;
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(ConnectError::Unreachable("fake backend down".to_string()));
        }
        Ok(Arc::new(FakeRecords {
            behavior: self.behavior.clone(),
        }))
    }
}

pub fn build_app(connector: Arc<dyn Connector>) -> (Router, AppState) {
    let config = Arc::new(load_test_config());
    let metrics =
        Metrics::new(&config.metrics.duration_buckets_ms).expect("metric registration failed");
    let supervisor = Arc::new(ConnectionSupervisor::start(
        connector,
        config.retry.policy(),
        config.retry.probe_interval(),
        Arc::new(metrics.clone()),
    ));

    let state = AppState {
        config,
        supervisor,
        metrics,
    };
    (create_router(state.clone()), state)
}

pub fn counter_value(state: &AppState, name: &str) -> u64 {
    state
        .metrics
        .snapshot()
        .counter_value(name)
        .unwrap_or_else(|| panic!("counter {name} not registered"))
}

pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting until {what}"));
}
