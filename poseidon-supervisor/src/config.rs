//! Configuration for the Poseidon supervisor.

use poseidon_common::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::error::MapError;
use crate::register_map::{DeviceVariant, RegisterBinding, RegisterMap};
use crate::transport::Endpoint;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] poseidon_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid register map: {0}")]
    RegisterMap(#[from] MapError),
}

/// Complete supervisor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Device connection and register layout
    pub device: DeviceConfig,

    /// Polling loop settings
    #[serde(default)]
    pub polling: PollingConfig,

    /// Irrigation control settings
    #[serde(default)]
    pub control: ControlConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration for the Poseidon unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device name (used in logs)
    #[serde(default = "default_device_name")]
    pub name: String,

    /// Host address (IP or hostname)
    pub host: String,

    /// TCP port (default: 502)
    #[serde(default = "default_modbus_port")]
    pub port: u16,

    /// Modbus unit/slave ID (1-247). Defaults to the variant's usual id.
    #[serde(default)]
    pub unit_id: Option<u8>,

    /// Known register layout to use
    #[serde(default)]
    pub variant: DeviceVariant,

    /// Custom register map replacing the variant's layout
    #[serde(default)]
    pub registers: Option<Vec<RegisterBinding>>,

    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-request response timeout in milliseconds
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Extra connection attempts made by the driver (default: none)
    #[serde(default)]
    pub connect_retries: u32,

    /// Delay between connection attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_device_name() -> String {
    "poseidon".to_string()
}

fn default_modbus_port() -> u16 {
    502
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_response_timeout_ms() -> u64 {
    1000
}

fn default_retry_delay_ms() -> u64 {
    1000
}

/// Fixed-count polling loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Number of refresh cycles to run
    #[serde(default = "default_cycles")]
    pub cycles: u32,

    /// Delay between cycles in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_cycles() -> u32 {
    5
}

fn default_interval_secs() -> u64 {
    2
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            cycles: default_cycles(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// Irrigation control settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Drive the valve and pump from sensor readings
    #[serde(default)]
    pub enabled: bool,

    /// Minimum temperature for using rainwater
    #[serde(default = "default_frost_threshold")]
    pub frost_threshold_celsius: f64,

    /// Litres per water meter pulse
    #[serde(default = "default_litres_per_pulse")]
    pub litres_per_pulse: f64,

    /// Whether irrigation is currently requested
    #[serde(default)]
    pub irrigation_demand: bool,
}

fn default_frost_threshold() -> f64 {
    1.0
}

fn default_litres_per_pulse() -> f64 {
    1.0
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            frost_threshold_celsius: default_frost_threshold(),
            litres_per_pulse: default_litres_per_pulse(),
            irrigation_demand: false,
        }
    }
}

impl SupervisorConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: SupervisorConfig = poseidon_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON5 document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: SupervisorConfig = poseidon_common::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let device = &self.device;

        if device.host.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Device '{}': host cannot be empty",
                device.name
            )));
        }

        if let Some(unit_id) = device.unit_id {
            if unit_id == 0 || unit_id > 247 {
                return Err(ConfigError::Validation(format!(
                    "Device '{}': unit_id must be 1-247",
                    device.name
                )));
            }
        }

        if device.connect_timeout_ms == 0 || device.response_timeout_ms == 0 {
            return Err(ConfigError::Validation(format!(
                "Device '{}': timeouts must be greater than zero",
                device.name
            )));
        }

        if !self.control.litres_per_pulse.is_finite() || self.control.litres_per_pulse < 0.0 {
            return Err(ConfigError::Validation(
                "control.litres_per_pulse must be a non-negative number".to_string(),
            ));
        }

        device.register_map()?;
        Ok(())
    }
}

impl DeviceConfig {
    /// Unit id to address, falling back to the variant default.
    pub fn unit_id(&self) -> u8 {
        self.unit_id.unwrap_or_else(|| self.variant.default_unit_id())
    }

    /// Register map for this device: the custom list if given, else the variant's.
    pub fn register_map(&self) -> Result<RegisterMap, MapError> {
        match &self.registers {
            Some(bindings) => RegisterMap::new(bindings.clone()),
            None => Ok(self.variant.register_map()),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port, self.unit_id()).with_timeouts(
            Duration::from_millis(self.connect_timeout_ms),
            Duration::from_millis(self.response_timeout_ms),
        )
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
