use std::sync::Arc;

use tetherd::config;
use tetherd::startup;
use tetherd::utils::logger::init_logging;

#[tokio::main]
async fn main() {
    // `tetherd --schema` prints the config JSON schema and exits.
    if std::env::args().any(|arg| arg == "--schema") {
        config::print_schema();
        return;
    }

    let config = Arc::new(config::load_config());
    init_logging(&config.logging);

    if let Err(e) = startup::run(config).await {
        tracing::error!(error = %e, "Server exited with an error");
        std::process::exit(1);
    }
}
