use std::time::Duration;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use crate::connection::BackoffPolicy;
use crate::store::MongoDBConfig;

/// Main configuration: backend connection, retry behavior, metric buckets,
/// bind address and logging. Every field has a default, so the service runs
/// with no config file at all.
#[derive(Deserialize, Serialize, Debug, JsonSchema)]
#[serde(default)]
pub struct Config {
    pub bind_address: String,
    pub backend: MongoDBConfig,
    pub retry: RetryConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_address: "0.0.0.0:4000".to_string(),
            backend: MongoDBConfig::default(),
            retry: RetryConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// How reconnect attempts are spaced, and how often an established connection
/// is probed.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct RetryConfig {
    pub strategy: RetryStrategy,
    pub base_ms: u64,
    pub max_ms: u64,
    pub probe_interval_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            strategy: RetryStrategy::Fixed,
            base_ms: 5000,
            max_ms: 60_000,
            probe_interval_secs: 15,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    Fixed,
    Exponential,
}

impl RetryConfig {
    pub fn policy(&self) -> BackoffPolicy {
        match self.strategy {
            RetryStrategy::Fixed => BackoffPolicy::Fixed(Duration::from_millis(self.base_ms)),
            RetryStrategy::Exponential => BackoffPolicy::Exponential {
                base: Duration::from_millis(self.base_ms),
                cap: Duration::from_millis(self.max_ms),
            },
        }
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct MetricsConfig {
    /// Bucket upper bounds for the request duration histogram, in
    /// milliseconds. Must be strictly ascending.
    pub duration_buckets_ms: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            // Response times from 0.1ms to 500ms.
            duration_buckets_ms: vec![0.10, 5.0, 15.0, 50.0, 100.0, 200.0, 300.0, 400.0, 500.0],
        }
    }
}

/// Load config from "config.yaml" in the current directory, overridden by
/// TETHERD_-prefixed environment variables (nested keys joined with "__",
/// e.g. TETHERD_BACKEND__URI).
pub fn load_config() -> Config {
    let figment = Figment::new()
        .merge(Yaml::file("./config.yaml"))
        .merge(Env::prefixed("TETHERD_").split("__"));
    match figment.extract::<Config>() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema).unwrap());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = Config::default();
        assert_eq!(config.bind_address, "0.0.0.0:4000");
        assert_eq!(config.backend.uri, "mongodb://localhost:27017/test");
        assert_eq!(
            config.retry.policy(),
            BackoffPolicy::Fixed(Duration::from_millis(5000))
        );
        assert_eq!(config.metrics.duration_buckets_ms.len(), 9);
    }

    #[test]
    fn exponential_strategy_builds_a_capped_policy() {
        let retry = RetryConfig {
            strategy: RetryStrategy::Exponential,
            base_ms: 100,
            max_ms: 1000,
            probe_interval_secs: 5,
        };
        assert_eq!(
            retry.policy(),
            BackoffPolicy::Exponential {
                base: Duration::from_millis(100),
                cap: Duration::from_millis(1000),
            }
        );
    }

    #[test]
    fn yaml_fragments_override_defaults() {
        let config: Config = Figment::new()
            .merge(Yaml::string(
                r#"
bind_address: "127.0.0.1:9999"
retry:
  strategy: exponential
  base_ms: 250
"#,
            ))
            .extract()
            .unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9999");
        assert_eq!(config.retry.strategy, RetryStrategy::Exponential);
        assert_eq!(config.retry.base_ms, 250);
        // Untouched sections keep their defaults.
        assert_eq!(config.retry.max_ms, 60_000);
        assert_eq!(config.backend.database, "test");
    }
}
