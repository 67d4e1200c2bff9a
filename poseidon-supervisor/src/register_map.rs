//! Register map: logical signals bound to Modbus tables, addresses and decode rules.
//!
//! The two known device families disagree on where the temperature and the
//! pulse counter live and on how they are encoded. Those differences are
//! carried entirely by the [`RegisterMap`] value handed to the session.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DecodeError, MapError};

/// Logical signals exposed by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Outside temperature sensor.
    ExternalTemperature,
    /// Rainwater tank full switch.
    TankFull,
    /// Water meter pulse counter.
    PulseCounter,
    /// Pump relay (actuator).
    PumpRelay,
    /// Water source valve (actuator): off = municipal, on = rainwater.
    SourceValve,
}

impl Signal {
    /// Every signal a complete map must bind.
    pub const ALL: [Signal; 5] = [
        Signal::ExternalTemperature,
        Signal::TankFull,
        Signal::PulseCounter,
        Signal::PumpRelay,
        Signal::SourceValve,
    ];

    /// Return the string name for this signal.
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::ExternalTemperature => "external_temperature",
            Signal::TankFull => "tank_full",
            Signal::PulseCounter => "pulse_counter",
            Signal::PumpRelay => "pump_relay",
            Signal::SourceValve => "source_valve",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Whether this signal is written rather than polled.
    pub fn is_actuator(&self) -> bool {
        matches!(self, Signal::PumpRelay | Signal::SourceValve)
    }

    fn accepts(&self, rule: DecodeRule) -> bool {
        match self {
            Signal::ExternalTemperature => matches!(rule, DecodeRule::I16 | DecodeRule::I16Tenths),
            Signal::TankFull => rule == DecodeRule::Bool,
            Signal::PulseCounter => matches!(rule, DecodeRule::U16 | DecodeRule::U32),
            Signal::PumpRelay | Signal::SourceValve => rule == DecodeRule::Bool,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Modbus data tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTable {
    /// Discrete output coils (read/write, 1-bit)
    Coil,
    /// Discrete input contacts (read-only, 1-bit)
    Discrete,
    /// Input registers (read-only, 16-bit)
    Input,
    /// Holding registers (read/write, 16-bit)
    Holding,
}

impl SourceTable {
    /// Return the string name for this table.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTable::Coil => "coil",
            SourceTable::Discrete => "discrete",
            SourceTable::Input => "input",
            SourceTable::Holding => "holding",
        }
    }

    /// Modbus function code used to read this table.
    pub fn read_function_code(&self) -> u8 {
        match self {
            SourceTable::Coil => 0x01,
            SourceTable::Discrete => 0x02,
            SourceTable::Holding => 0x03,
            SourceTable::Input => 0x04,
        }
    }
}

/// How raw 16-bit words turn into a typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeRule {
    /// Signed 16-bit integer, taken as is.
    I16,
    /// Signed 16-bit integer in tenths, divided by 10.
    I16Tenths,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer over 2 words, high word first.
    U32,
    /// Nonzero word is `true`.
    Bool,
}

impl DecodeRule {
    /// Return the string name for this rule.
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeRule::I16 => "i16",
            DecodeRule::I16Tenths => "i16_tenths",
            DecodeRule::U16 => "u16",
            DecodeRule::U32 => "u32",
            DecodeRule::Bool => "bool",
        }
    }

    /// Number of 16-bit words the rule consumes.
    pub fn word_count(&self) -> u16 {
        match self {
            DecodeRule::U32 => 2,
            DecodeRule::I16 | DecodeRule::I16Tenths | DecodeRule::U16 | DecodeRule::Bool => 1,
        }
    }

    /// Decode raw words read from the device.
    pub fn decode(&self, words: &[u16]) -> Result<Value, DecodeError> {
        let expected = self.word_count() as usize;
        if words.len() != expected {
            return Err(DecodeError::WordCount {
                expected,
                actual: words.len(),
            });
        }

        let value = match self {
            DecodeRule::I16 => Value::Float(words[0] as i16 as f64),
            DecodeRule::I16Tenths => Value::Float(words[0] as i16 as f64 / 10.0),
            DecodeRule::U16 => Value::Count(words[0] as u32),
            DecodeRule::U32 => Value::Count(((words[0] as u32) << 16) | (words[1] as u32)),
            DecodeRule::Bool => Value::Flag(words[0] != 0),
        };
        Ok(value)
    }
}

/// A decoded signal value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Float(f64),
    Count(u32),
    Flag(bool),
}

impl Value {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Float(v) => v,
            Value::Count(v) => v as f64,
            Value::Flag(v) => u8::from(v) as f64,
        }
    }

    pub fn as_u32(&self) -> u32 {
        match *self {
            Value::Float(v) => v as u32,
            Value::Count(v) => v,
            Value::Flag(v) => u32::from(v),
        }
    }

    pub fn as_bool(&self) -> bool {
        match *self {
            Value::Float(v) => v != 0.0,
            Value::Count(v) => v != 0,
            Value::Flag(v) => v,
        }
    }
}

/// Binding of one logical signal to its wire location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBinding {
    /// Logical signal name
    pub signal: Signal,

    /// Modbus table holding the signal
    pub table: SourceTable,

    /// Starting address (0-based)
    pub address: u16,

    /// Number of registers/bits to read (default: 1)
    #[serde(default = "default_count")]
    pub count: u16,

    /// Decode rule for the raw words
    pub decode: DecodeRule,
}

fn default_count() -> u16 {
    1
}

impl RegisterBinding {
    pub fn new(signal: Signal, table: SourceTable, address: u16, decode: DecodeRule) -> Self {
        Self {
            signal,
            table,
            address,
            count: decode.word_count(),
            decode,
        }
    }
}

/// Device families with a known register layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceVariant {
    /// Real Poseidon unit: input registers, temperature in tenths, 32-bit counter.
    #[default]
    Poseidon,
    /// Software simulator: holding registers, raw temperature, 16-bit counter.
    Simulator,
}

impl DeviceVariant {
    /// The register map for this variant.
    pub fn register_map(&self) -> RegisterMap {
        match self {
            DeviceVariant::Poseidon => RegisterMap::poseidon(),
            DeviceVariant::Simulator => RegisterMap::simulator(),
        }
    }

    /// Unit (slave) id the variant answers on out of the box.
    pub fn default_unit_id(&self) -> u8 {
        match self {
            DeviceVariant::Poseidon => 2,
            DeviceVariant::Simulator => 1,
        }
    }
}

const TEMPERATURE_ADDRESS: u16 = 5;
const TANK_FULL_ADDRESS: u16 = 100;
const PULSE_COUNTER_ADDRESS: u16 = 1;
const PUMP_RELAY_ADDRESS: u16 = 151;
const SOURCE_VALVE_ADDRESS: u16 = 152;

/// A validated table of signal bindings, one per [`Signal`], kept in
/// [`Signal::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterMap {
    bindings: Vec<RegisterBinding>,
}

impl RegisterMap {
    /// Build a map, checking that every signal is bound exactly once and
    /// that each binding is consistent with its decode rule.
    pub fn new(bindings: Vec<RegisterBinding>) -> Result<Self, MapError> {
        let mut slots: Vec<Option<RegisterBinding>> = vec![None; Signal::ALL.len()];

        for binding in bindings {
            validate_binding(&binding)?;
            let slot = &mut slots[binding.signal.index()];
            if slot.is_some() {
                return Err(MapError::DuplicateSignal(binding.signal));
            }
            *slot = Some(binding);
        }

        let bindings = slots
            .into_iter()
            .zip(Signal::ALL)
            .map(|(slot, signal)| slot.ok_or(MapError::MissingSignal(signal)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { bindings })
    }

    /// Layout of the real Poseidon unit.
    pub fn poseidon() -> Self {
        Self::with_sensor_layout(SourceTable::Input, DecodeRule::I16Tenths, DecodeRule::U32)
    }

    /// Layout of the software simulator.
    pub fn simulator() -> Self {
        Self::with_sensor_layout(SourceTable::Holding, DecodeRule::I16, DecodeRule::U16)
    }

    fn with_sensor_layout(
        registers: SourceTable,
        temperature: DecodeRule,
        counter: DecodeRule,
    ) -> Self {
        Self {
            bindings: vec![
                RegisterBinding::new(
                    Signal::ExternalTemperature,
                    registers,
                    TEMPERATURE_ADDRESS,
                    temperature,
                ),
                RegisterBinding::new(
                    Signal::TankFull,
                    SourceTable::Discrete,
                    TANK_FULL_ADDRESS,
                    DecodeRule::Bool,
                ),
                RegisterBinding::new(
                    Signal::PulseCounter,
                    registers,
                    PULSE_COUNTER_ADDRESS,
                    counter,
                ),
                RegisterBinding::new(
                    Signal::PumpRelay,
                    SourceTable::Coil,
                    PUMP_RELAY_ADDRESS,
                    DecodeRule::Bool,
                ),
                RegisterBinding::new(
                    Signal::SourceValve,
                    SourceTable::Coil,
                    SOURCE_VALVE_ADDRESS,
                    DecodeRule::Bool,
                ),
            ],
        }
    }

    /// Binding for a signal.
    pub fn binding(&self, signal: Signal) -> &RegisterBinding {
        &self.bindings[signal.index()]
    }

    /// Bindings polled on every refresh.
    pub fn sensor_bindings(&self) -> impl Iterator<Item = &RegisterBinding> {
        self.bindings.iter().filter(|b| !b.signal.is_actuator())
    }

    /// All bindings, in [`Signal::ALL`] order.
    pub fn bindings(&self) -> &[RegisterBinding] {
        &self.bindings
    }
}

fn validate_binding(binding: &RegisterBinding) -> Result<(), MapError> {
    let signal = binding.signal;

    if binding.count != binding.decode.word_count() {
        return Err(MapError::CountMismatch {
            signal,
            count: binding.count,
            rule: binding.decode.as_str(),
            expected: binding.decode.word_count(),
        });
    }

    if !signal.accepts(binding.decode) {
        return Err(MapError::IncompatibleRule {
            signal,
            rule: binding.decode.as_str(),
        });
    }

    if signal.is_actuator() && binding.table != SourceTable::Coil {
        return Err(MapError::NotACoil {
            signal,
            table: binding.table.as_str(),
        });
    }

    if binding.address as u32 + binding.count as u32 > u16::MAX as u32 + 1 {
        return Err(MapError::AddressOverflow {
            signal,
            address: binding.address,
            count: binding.count,
        });
    }

    Ok(())
}
