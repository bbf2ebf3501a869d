//! # Flood Sensor Daemon Entry Point
//!
//! Loads the configuration, fetches each station's metadata once and then polls the
//! latest readings on the scan interval, publishing entity state as JSON lines on
//! stdout. Logs go to stderr and are filtered with `RUST_LOG` (default `info`).
//!
//! Usage:
//!   flood-sensor                           # poll forever using flood-config.toml
//!   flood-sensor --config /etc/flood.toml  # alternative configuration file
//!   flood-sensor --once                    # one update cycle, print a table, exit
//!   flood-sensor --once --json             # one update cycle as JSON lines

#[cfg(test)]
mod tests;

use anyhow::Context;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use flood_sensor_lib::config::{Config, DEFAULT_CONFIG_PATH};
use flood_sensor_lib::flood_api::FloodClient;
use flood_sensor_lib::platform::{setup_platform, StatePublisher};
use flood_sensor_lib::renderer::draw_ascii;

/// Environment Agency flood-monitoring sensors
#[derive(Parser, Debug)]
#[command(name = "flood-sensor", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run a single update cycle and exit
    #[arg(long)]
    once: bool,

    /// Print JSON lines instead of a table (requires --once)
    #[arg(long, requires = "once")]
    json: bool,
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!("flood-sensor v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::load_from_path(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    // One thread: entities are updated strictly one after another
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(run(cli, config))
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let client = FloodClient::new(&config.api).context("failed to build HTTP client")?;
    let mut platform = setup_platform(&config, client)
        .await
        .context("sensor setup failed")?;

    info!(
        devices = platform.devices().len(),
        entities = platform.sensors().len(),
        "flood sensors ready"
    );
    for device in platform.devices().iter() {
        info!(device = %device.name, model = %device.model, "device registered");
    }

    if cli.once {
        platform.update_all().await;
        let snapshots = platform.snapshots();
        if cli.json {
            StatePublisher::new(io::stdout().lock()).publish(&snapshots)?;
        } else {
            draw_ascii(&snapshots);
        }
        return Ok(());
    }

    info!(
        interval_secs = platform.scan_interval().as_secs(),
        "starting poll loop, press Ctrl+C to stop"
    );
    let mut publisher = StatePublisher::new(io::stdout());
    platform.run(&mut publisher, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for Ctrl+C, running until killed");
        std::future::pending::<()>().await;
    }
}
