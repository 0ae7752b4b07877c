//! Pagebot Messenger - Main entry point.

use anyhow::Result;
use pagebot_common::config::Config;
use pagebot_common::logging::init_from_config;
use pagebot_messenger::start_server;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_from_config(&config.observability)?;

    tracing::info!("Pagebot Messenger v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Error loading configuration");
        return Err(e.into());
    }

    start_server(&config).await
}
