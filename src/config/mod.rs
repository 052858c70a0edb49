mod config;
mod logging;

pub use config::{
    load_config, print_schema, Config, MetricsConfig, RetryConfig, RetryStrategy,
};
pub use logging::LoggingConfig;
