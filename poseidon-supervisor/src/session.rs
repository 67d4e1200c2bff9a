//! Device session: connection lifecycle, per-signal polling and actuator writes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{ConnectError, ReadError, SignalError, UpdateError, WriteError};
use crate::register_map::{RegisterBinding, RegisterMap, Signal, Value};
use crate::transport::{Connector, Endpoint, ModbusTransport, TcpConnector};

/// Last successfully decoded sensor values.
///
/// Fields are updated independently: a failed read leaves the previous value
/// of that field in place and does not touch the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SensorSnapshot {
    /// Outside temperature in °C (raw degrees or tenths, per the decode rule).
    pub temperature_celsius: f64,
    /// Rainwater tank full switch.
    pub tank_full: bool,
    /// Water meter pulses.
    pub pulse_count: u32,
}

impl SensorSnapshot {
    fn apply(&mut self, signal: Signal, value: Value) {
        match signal {
            Signal::ExternalTemperature => self.temperature_celsius = value.as_f64(),
            Signal::TankFull => self.tank_full = value.as_bool(),
            Signal::PulseCounter => self.pulse_count = value.as_u32(),
            Signal::PumpRelay | Signal::SourceValve => {}
        }
    }
}

/// Outcome of one [`DeviceSession::refresh_all`] cycle.
#[derive(Debug)]
pub struct RefreshReport {
    /// When the cycle started.
    pub refreshed_at: DateTime<Utc>,
    /// Signals whose cached value was replaced.
    pub updated: Vec<Signal>,
    /// Signals that kept their previous value, with the reason.
    pub failed: Vec<(Signal, SignalError)>,
}

impl RefreshReport {
    fn new() -> Self {
        Self {
            refreshed_at: Utc::now(),
            updated: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// True when every sensor signal was refreshed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_signals(&self) -> impl Iterator<Item = Signal> + '_ {
        self.failed.iter().map(|(signal, _)| *signal)
    }
}

/// Coil-driven outputs of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actuator {
    Pump,
    SourceValve,
}

impl Actuator {
    pub fn signal(&self) -> Signal {
        match self {
            Actuator::Pump => Signal::PumpRelay,
            Actuator::SourceValve => Signal::SourceValve,
        }
    }
}

/// Water supply selected by the source valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WaterSource {
    /// Valve off.
    Municipal,
    /// Valve on.
    Rainwater,
}

impl WaterSource {
    pub fn from_use_rain(use_rain: bool) -> Self {
        if use_rain {
            WaterSource::Rainwater
        } else {
            WaterSource::Municipal
        }
    }

    /// Coil value driving the valve.
    pub fn uses_rain(&self) -> bool {
        matches!(self, WaterSource::Rainwater)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WaterSource::Municipal => "municipal",
            WaterSource::Rainwater => "rainwater",
        }
    }
}

/// A Modbus session with one Poseidon unit.
///
/// Created disconnected. Every wire operation fails fast with a
/// `NotConnected` error until [`open`](Self::open) succeeds. The session is
/// not meant to be shared between threads; callers serialize access.
///
/// A transport error on one operation does not close the session. Callers
/// seeing persistent failures should [`close`](Self::close) and reopen.
pub struct DeviceSession<C: Connector = TcpConnector> {
    endpoint: Endpoint,
    map: RegisterMap,
    connector: C,
    transport: Option<C::Transport>,
    snapshot: SensorSnapshot,
}

impl DeviceSession<TcpConnector> {
    /// Create a Modbus TCP session.
    pub fn new(endpoint: Endpoint, map: RegisterMap) -> Self {
        Self::with_connector(endpoint, map, TcpConnector)
    }
}

impl<C: Connector> DeviceSession<C> {
    /// Create a session that opens its transport through `connector`.
    pub fn with_connector(endpoint: Endpoint, map: RegisterMap, connector: C) -> Self {
        Self {
            endpoint,
            map,
            connector,
            transport: None,
            snapshot: SensorSnapshot::default(),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn register_map(&self) -> &RegisterMap {
        &self.map
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Connect to the device.
    ///
    /// An already open transport is released first. On failure the session
    /// stays disconnected.
    pub fn open(&mut self) -> Result<(), ConnectError> {
        self.close();

        let transport = self.connector.connect(&self.endpoint).inspect_err(|e| {
            error!("Failed to connect to Poseidon at {}: {}", self.endpoint.address(), e);
        })?;
        self.transport = Some(transport);

        info!(
            "Connected to Poseidon at {} (unit {})",
            self.endpoint.address(),
            self.endpoint.unit_id
        );
        Ok(())
    }

    /// Release the transport. Closing a closed session is a no-op.
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.disconnect() {
                warn!(
                    "Error while disconnecting from {}: {}",
                    self.endpoint.address(),
                    e
                );
            }
            info!("Disconnected from Poseidon at {}", self.endpoint.address());
        }
    }

    /// Poll every sensor signal once and update the cache.
    ///
    /// Only a disconnected session makes this fail. A signal that cannot be
    /// read or decoded is logged, reported in the returned [`RefreshReport`]
    /// and keeps its previous cached value.
    pub fn refresh_all(&mut self) -> Result<RefreshReport, UpdateError> {
        let transport = self.transport.as_mut().ok_or(UpdateError::NotConnected)?;
        let mut report = RefreshReport::new();

        for binding in self.map.sensor_bindings() {
            match read_binding(transport, binding) {
                Ok(value) => {
                    debug!("{} = {:?}", binding.signal, value);
                    self.snapshot.apply(binding.signal, value);
                    report.updated.push(binding.signal);
                }
                Err(e) => {
                    warn!(
                        "Failed to read {} ({} @ {}, fc {:02}): {}",
                        binding.signal,
                        binding.table.as_str(),
                        binding.address,
                        binding.table.read_function_code(),
                        e
                    );
                    report.failed.push((binding.signal, e));
                }
            }
        }

        Ok(report)
    }

    /// Last cached temperature in °C.
    pub fn temperature(&self) -> f64 {
        self.snapshot.temperature_celsius
    }

    /// Last cached tank level switch.
    pub fn is_tank_full(&self) -> bool {
        self.snapshot.tank_full
    }

    /// Last cached pulse counter.
    pub fn pulse_count(&self) -> u32 {
        self.snapshot.pulse_count
    }

    pub fn snapshot(&self) -> &SensorSnapshot {
        &self.snapshot
    }

    /// Switch the pump relay. The device acknowledgement is trusted; no read-back.
    pub fn set_pump(&mut self, on: bool) -> Result<(), WriteError> {
        self.write_coil(Signal::PumpRelay, on)?;
        info!("Pump set to {}", if on { "ON" } else { "OFF" });
        Ok(())
    }

    /// Switch the water source valve. Same contract as [`set_pump`](Self::set_pump).
    pub fn set_water_source(&mut self, source: WaterSource) -> Result<(), WriteError> {
        self.write_coil(Signal::SourceValve, source.uses_rain())?;
        info!("Water source switched to {}", source.as_str());
        Ok(())
    }

    /// Read the current coil state of an actuator (function 01).
    pub fn read_actuator(&mut self, actuator: Actuator) -> Result<bool, ReadError> {
        let transport = self.transport.as_mut().ok_or(ReadError::NotConnected)?;
        let signal = actuator.signal();

        read_binding(transport, self.map.binding(signal))
            .map(|value| value.as_bool())
            .map_err(|source| ReadError::Signal { signal, source })
    }

    fn write_coil(&mut self, signal: Signal, value: bool) -> Result<(), WriteError> {
        let transport = self.transport.as_mut().ok_or(WriteError::NotConnected)?;
        let binding = self.map.binding(signal);

        transport
            .write_single_coil(binding.address, value)
            .map_err(|source| {
                error!("Failed to write {} @ {}: {}", signal, binding.address, source);
                WriteError::Transport { signal, source }
            })
    }
}

impl<C: Connector> Drop for DeviceSession<C> {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_binding<T: ModbusTransport>(
    transport: &mut T,
    binding: &RegisterBinding,
) -> Result<Value, SignalError> {
    let words = transport.read_table(binding.table, binding.address, binding.count)?;
    Ok(binding.decode.decode(&words)?)
}
