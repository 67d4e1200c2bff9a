//! Poseidon supervisor: polls the Poseidon unit a fixed number of times and
//! optionally drives the irrigation actuators.

use anyhow::{Context, Result};
use clap::Parser;
use poseidon_supervisor::{Supervisor, SupervisorConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Polling supervisor for the Poseidon Modbus TCP I/O unit.
#[derive(Parser, Debug)]
#[command(name = "poseidon-supervisor")]
#[command(about = "Polls a Poseidon unit over Modbus TCP")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "poseidon.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Override the number of poll cycles.
    #[arg(long)]
    cycles: Option<u32>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = SupervisorConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let mut log_config = config.logging.clone();
    if let Some(level) = &args.log_level {
        log_config.level = level.clone();
    }
    poseidon_common::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting poseidon-supervisor");
    info!("Loaded configuration from {:?}", args.config);

    let mut supervisor =
        Supervisor::from_config(&config).context("Failed to build the device session")?;

    supervisor.connect().with_context(|| {
        format!(
            "Failed to connect to device '{}' at {}",
            config.device.name,
            supervisor.session().endpoint().address()
        )
    })?;

    let cycles = args.cycles.unwrap_or(config.polling.cycles);
    let interval = Duration::from_secs(config.polling.interval_secs);
    let result = supervisor.run(cycles, interval);

    supervisor.shutdown();
    result.context("Polling stopped")?;

    info!("Poseidon supervisor stopped");
    Ok(())
}
