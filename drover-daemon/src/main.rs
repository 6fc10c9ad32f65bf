//! Drover Daemon binary
//!
//! Loads configuration from the environment and runs the supervision loop
//! until SIGTERM/SIGINT.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drover_daemon::config::Config;
use drover_daemon::shutdown;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drover_daemon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Drover daemon");

    let config = Config::from_env()?;
    config.validate()?;

    info!(
        "Loaded configuration: mode={:?}, bucket={}, poll_interval={:?}",
        config.mode, config.bucket, config.poll_interval
    );

    let shutdown = shutdown::install_shutdown_handler()?;

    drover_daemon::start(config, shutdown).await?;

    info!("Drover daemon stopped");
    Ok(())
}
