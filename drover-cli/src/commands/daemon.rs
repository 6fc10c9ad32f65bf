//! Daemon command handler
//!
//! Starts the supervision loop in the foreground, exactly as the
//! `drover-daemon` binary does.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drover_daemon::config::Config;
use drover_daemon::shutdown;

/// Run the daemon until SIGTERM/SIGINT
pub async fn handle_daemon(config: &Config) -> Result<()> {
    // Initialize tracing for the long-running process
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drover_daemon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let shutdown = shutdown::install_shutdown_handler()?;

    drover_daemon::start(config.clone(), shutdown).await
}
