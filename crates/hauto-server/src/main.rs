//! hautomate server
//!
//! Loads a configuration, builds the runtime and runs a core until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use hauto::{HautoConfig, Hautomate};
use hauto_config::load_config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hautomate", version, about = "Event-driven automation runtime")]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the clock speed from the configuration
    #[arg(long)]
    speed: Option<f64>,
}

fn setup_logging(config: &HautoConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => HautoConfig::default(),
    };
    if let Some(speed) = cli.speed {
        config.moment.speed = speed;
    }
    config.validate().context("Invalid configuration")?;

    setup_logging(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(config.worker_threads)
        .build()
        .context("Failed to build the tokio runtime")?;

    runtime.block_on(serve(config))
}

async fn serve(config: HautoConfig) -> Result<()> {
    info!(
        speed = config.moment.speed,
        resolution = config.moment.resolution,
        "Starting hautomate"
    );

    let core = Hautomate::new(config)?;
    tokio::spawn(shutdown_on_ctrl_c(core.clone()));

    core.run().await?;
    info!("hautomate stopped");
    Ok(())
}

async fn shutdown_on_ctrl_c(core: Arc<Hautomate>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }

    info!("Shutting down...");
    if let Err(e) = core.stop().await {
        error!(error = %e, "Failed to stop cleanly");
    }
}
