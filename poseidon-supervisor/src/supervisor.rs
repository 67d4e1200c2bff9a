//! Driver around a [`DeviceSession`]: connect with bounded retry, run poll
//! cycles and apply the control policy.
//!
//! Retry lives here, not in the session, so the session keeps its
//! one-attempt-per-call contract.

use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{ConfigError, SupervisorConfig};
use crate::control::ControlPolicy;
use crate::error::{ConnectError, UpdateError};
use crate::register_map::Signal;
use crate::session::{DeviceSession, SensorSnapshot, WaterSource};
use crate::transport::{Connector, TcpConnector};

/// What one poll cycle observed and commanded.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub snapshot: SensorSnapshot,
    pub consumption_litres: f64,
    /// Sensor signals that kept a stale value this cycle.
    pub stale: Vec<Signal>,
    /// Valve command sent, if control is enabled.
    pub water_source: Option<WaterSource>,
    /// Pump command sent, if control is enabled.
    pub pump_on: Option<bool>,
    /// Actuator writes the device rejected.
    pub failed_writes: Vec<Signal>,
}

/// Polling supervisor for one device.
pub struct Supervisor<C: Connector = TcpConnector> {
    name: String,
    session: DeviceSession<C>,
    policy: ControlPolicy,
    control_enabled: bool,
    irrigation_demand: bool,
    connect_retries: u32,
    retry_delay: Duration,
}

impl Supervisor<TcpConnector> {
    /// Build a Modbus TCP supervisor from configuration.
    pub fn from_config(config: &SupervisorConfig) -> Result<Self, ConfigError> {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> Supervisor<C> {
    pub fn with_connector(config: &SupervisorConfig, connector: C) -> Result<Self, ConfigError> {
        let device = &config.device;
        let session =
            DeviceSession::with_connector(device.endpoint(), device.register_map()?, connector);

        Ok(Self {
            name: device.name.clone(),
            session,
            policy: ControlPolicy::from(&config.control),
            control_enabled: config.control.enabled,
            irrigation_demand: config.control.irrigation_demand,
            connect_retries: device.connect_retries,
            retry_delay: device.retry_delay(),
        })
    }

    pub fn session(&self) -> &DeviceSession<C> {
        &self.session
    }

    /// Open the session, trying up to `1 + connect_retries` times.
    pub fn connect(&mut self) -> Result<(), ConnectError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.session.open() {
                Ok(()) => return Ok(()),
                Err(e) if attempt <= self.connect_retries => {
                    warn!(
                        "Device '{}': connection attempt {}/{} failed: {}",
                        self.name,
                        attempt,
                        self.connect_retries + 1,
                        e
                    );
                    std::thread::sleep(self.retry_delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run one refresh cycle and, when enabled, drive the actuators.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, UpdateError> {
        let report = self.session.refresh_all()?;
        let snapshot = *self.session.snapshot();
        let consumption_litres = self.policy.consumption_litres(&snapshot);

        info!(
            "Device '{}': temperature {:.1} °C, tank {}, counter {} pulses ({:.1} L)",
            self.name,
            snapshot.temperature_celsius,
            if snapshot.tank_full { "FULL" } else { "EMPTY" },
            snapshot.pulse_count,
            consumption_litres
        );

        let mut outcome = CycleOutcome {
            snapshot,
            consumption_litres,
            stale: report.failed_signals().collect(),
            water_source: None,
            pump_on: None,
            failed_writes: Vec::new(),
        };

        if self.control_enabled {
            let source = self.policy.water_source(&snapshot);
            if let Err(e) = self.session.set_water_source(source) {
                error!("Device '{}': {}", self.name, e);
                outcome.failed_writes.push(Signal::SourceValve);
            }
            outcome.water_source = Some(source);

            let pump_on = self.policy.pump_on(&snapshot, self.irrigation_demand);
            if let Err(e) = self.session.set_pump(pump_on) {
                error!("Device '{}': {}", self.name, e);
                outcome.failed_writes.push(Signal::PumpRelay);
            }
            outcome.pump_on = Some(pump_on);
        }

        Ok(outcome)
    }

    /// Run a fixed number of cycles with a fixed delay between them.
    ///
    /// Each cycle logs its own readings; only the last outcome is returned,
    /// so memory does not grow with `cycles`. Zero cycles yields `None`.
    pub fn run(
        &mut self,
        cycles: u32,
        interval: Duration,
    ) -> Result<Option<CycleOutcome>, UpdateError> {
        let mut last = None;

        for cycle in 1..=cycles {
            info!("Device '{}': cycle {}/{}", self.name, cycle, cycles);
            last = Some(self.run_cycle()?);

            if cycle < cycles {
                std::thread::sleep(interval);
            }
        }

        Ok(last)
    }

    /// Close the session.
    pub fn shutdown(&mut self) {
        self.session.close();
    }
}
