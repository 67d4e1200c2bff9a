//! Poseidon Common Library
//!
//! Process plumbing shared by the Poseidon binaries: reading the JSON5
//! configuration file and setting up `tracing` output.
//!
//! - [`config`] - JSON5 loading and the `logging` config section
//! - [`error`] - Errors raised before the device is ever contacted

pub mod config;
pub mod error;

pub use config::{LogFormat, LoggingConfig, load_config, parse_config};
pub use error::{Error, Result};

/// Install the global tracing subscriber for the supervisor process.
///
/// The `logging.level` value is an `EnvFilter` directive, so it can be a bare
/// level or per-target (`"poseidon_supervisor=debug,info"`). `RUST_LOG`
/// overrides it when set. Text output suits an operator terminal; JSON output
/// emits one object per poll log line for collection on a gateway box.
///
/// Fails if a subscriber is already installed.
///
/// # Example
///
/// ```no_run
/// use poseidon_common::{LogFormat, LoggingConfig, init_tracing};
///
/// let config = LoggingConfig {
///     level: "poseidon_supervisor=debug,warn".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// # Ok::<(), poseidon_common::Error>(())
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Logging(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Logging(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
