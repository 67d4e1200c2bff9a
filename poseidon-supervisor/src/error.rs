//! Error taxonomy for the device session.
//!
//! Precondition violations (a disconnected session) fail fast; per-signal
//! read faults are isolated inside a refresh; actuator write faults are always
//! surfaced to the caller.

use thiserror::Error;

use crate::register_map::Signal;

/// Failure to establish the Modbus TCP session.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Invalid device address '{0}'")]
    InvalidAddress(String),

    #[error("Connection to {addr} timed out")]
    Timeout { addr: String },

    #[error("Connection to {addr} failed: {source}")]
    Io {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a whole refresh cycle.
///
/// Individual signal failures never end up here; see [`SignalError`].
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Session is not connected")]
    NotConnected,
}

/// Failure of an actuator write.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Session is not connected")]
    NotConnected,

    #[error("Failed to write {signal}: {source}")]
    Transport {
        signal: Signal,
        #[source]
        source: TransportError,
    },
}

/// Failure of a single on-demand read.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Session is not connected")]
    NotConnected,

    #[error("Failed to read {signal}: {source}")]
    Signal {
        signal: Signal,
        #[source]
        source: SignalError,
    },
}

/// Failure of one signal inside a refresh cycle.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// A failed Modbus exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The device answered with a Modbus exception response.
    #[error("Modbus exception: {0}")]
    Exception(String),

    /// I/O, timeout or framing failure.
    #[error("Transport failure: {0}")]
    Transport(String),
}

/// Raw words that do not fit the configured decode rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Expected {expected} word(s), got {actual}")]
    WordCount { expected: usize, actual: usize },
}

/// Register map validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("Signal {0} is not bound")]
    MissingSignal(Signal),

    #[error("Signal {0} is bound more than once")]
    DuplicateSignal(Signal),

    #[error("Signal {signal}: register count {count} does not match {rule} ({expected} word(s))")]
    CountMismatch {
        signal: Signal,
        count: u16,
        rule: &'static str,
        expected: u16,
    },

    #[error("Signal {signal}: decode rule {rule} is not valid for this signal")]
    IncompatibleRule { signal: Signal, rule: &'static str },

    #[error("Signal {signal}: actuators must be bound to the coil table, not {table}")]
    NotACoil { signal: Signal, table: &'static str },

    #[error("Signal {signal}: address range {address}+{count} exceeds 65535")]
    AddressOverflow {
        signal: Signal,
        address: u16,
        count: u16,
    },
}
