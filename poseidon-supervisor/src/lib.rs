//! Polling supervisor for the Poseidon Modbus TCP I/O unit.
//!
//! The supervisor reads the outside temperature, the rainwater tank level
//! switch and the water meter pulse counter, and drives the pump relay and
//! the water source valve.
//!
//! # Register Layout
//!
//! | Signal | Table | Address | Words |
//! |---|---|---|---|
//! | `external_temperature` | input (poseidon) / holding (simulator) | 5 | 1 |
//! | `tank_full` | discrete | 100 | 1 |
//! | `pulse_counter` | input (poseidon) / holding (simulator) | 1 | 2 / 1 |
//! | `pump_relay` | coil | 151 | 1 |
//! | `source_valve` | coil | 152 | 1 |
//!
//! Layout differences between device families are expressed as a
//! [`RegisterMap`] value; the [`DeviceSession`] code is the same for all.

pub mod config;
pub mod control;
pub mod error;
pub mod register_map;
pub mod session;
pub mod supervisor;
pub mod transport;

pub use config::{ConfigError, SupervisorConfig};
pub use control::ControlPolicy;
pub use error::{
    ConnectError, DecodeError, MapError, ReadError, SignalError, TransportError, UpdateError,
    WriteError,
};
pub use register_map::{
    DecodeRule, DeviceVariant, RegisterBinding, RegisterMap, Signal, SourceTable, Value,
};
pub use session::{Actuator, DeviceSession, RefreshReport, SensorSnapshot, WaterSource};
pub use supervisor::{CycleOutcome, Supervisor};
pub use transport::{Connector, Endpoint, ModbusTransport, TcpConnector, TcpTransport};
