//! artifact-sync CLI entry point.

mod cli;

use artifact_sync::{ServiceBuilder, ServiceOutcome, RESTART_EXIT_CODE};
use clap::Parser;
use cli::Cli;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("artifact-sync v{}", env!("CARGO_PKG_VERSION"));

    // Build configuration
    let config = cli.into_config()?;

    // Build and run the service
    let mut service = ServiceBuilder::new(config).build()?;

    match service.run().await? {
        ServiceOutcome::RestartRequested => {
            info!("exiting for restart");
            std::process::exit(RESTART_EXIT_CODE);
        }
        ServiceOutcome::Shutdown => {
            info!("Goodbye!");
            Ok(())
        }
    }
}
