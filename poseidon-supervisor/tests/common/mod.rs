//! In-memory Poseidon unit used by the integration tests.

#![allow(dead_code)]

use poseidon_supervisor::{ConnectError, Connector, Endpoint, ModbusTransport, TransportError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Register banks and fault injection shared between the test and the
/// transports the session opens.
#[derive(Debug, Default)]
pub struct DeviceState {
    pub holding: HashMap<u16, u16>,
    pub input: HashMap<u16, u16>,
    pub discrete: HashMap<u16, bool>,
    pub coils: HashMap<u16, bool>,

    /// Addresses whose reads fail, per table name ("holding", "input", ...).
    pub failing_reads: HashSet<(&'static str, u16)>,
    /// Coil addresses whose writes fail.
    pub failing_writes: HashSet<u16>,
    /// Remaining connection attempts to refuse.
    pub refuse_connections: u32,

    pub connect_attempts: u32,
    pub disconnects: u32,
    /// Every wire exchange, in order.
    pub requests: Vec<String>,
    /// Successful coil writes, in order.
    pub coil_writes: Vec<(u16, bool)>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap()
    }

    pub fn set_holding(&self, address: u16, value: u16) {
        self.state().holding.insert(address, value);
    }

    pub fn set_input(&self, address: u16, value: u16) {
        self.state().input.insert(address, value);
    }

    pub fn set_discrete(&self, address: u16, value: bool) {
        self.state().discrete.insert(address, value);
    }

    pub fn fail_read(&self, table: &'static str, address: u16) {
        self.state().failing_reads.insert((table, address));
    }

    pub fn heal_read(&self, table: &'static str, address: u16) {
        self.state().failing_reads.remove(&(table, address));
    }

    pub fn fail_write(&self, address: u16) {
        self.state().failing_writes.insert(address);
    }

    pub fn heal_write(&self, address: u16) {
        self.state().failing_writes.remove(&address);
    }

    pub fn refuse_connections(&self, count: u32) {
        self.state().refuse_connections = count;
    }

    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }
}

impl Connector for FakeDevice {
    type Transport = FakeTransport;

    fn connect(&self, endpoint: &Endpoint) -> Result<FakeTransport, ConnectError> {
        let mut state = self.state();
        state.connect_attempts += 1;

        if state.refuse_connections > 0 {
            state.refuse_connections -= 1;
            return Err(ConnectError::Io {
                addr: endpoint.address(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            });
        }

        Ok(FakeTransport {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeTransport {
    state: Arc<Mutex<DeviceState>>,
}

impl FakeTransport {
    fn read_words(
        &mut self,
        table: &'static str,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(format!("read {} {} {}", table, address, count));

        if state.failing_reads.contains(&(table, address)) {
            return Err(TransportError::Exception("IllegalDataAddress".to_string()));
        }

        let bank = match table {
            "holding" => &state.holding,
            _ => &state.input,
        };
        Ok((address..address + count)
            .map(|addr| bank.get(&addr).copied().unwrap_or(0))
            .collect())
    }

    fn read_bits(
        &mut self,
        table: &'static str,
        address: u16,
        count: u16,
    ) -> Result<Vec<bool>, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(format!("read {} {} {}", table, address, count));

        if state.failing_reads.contains(&(table, address)) {
            return Err(TransportError::Transport("Response timeout".to_string()));
        }

        let bank = match table {
            "coil" => &state.coils,
            _ => &state.discrete,
        };
        Ok((address..address + count)
            .map(|addr| bank.get(&addr).copied().unwrap_or(false))
            .collect())
    }
}

impl ModbusTransport for FakeTransport {
    fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        self.read_words("holding", address, count)
    }

    fn read_input_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        self.read_words("input", address, count)
    }

    fn read_discrete_inputs(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<bool>, TransportError> {
        self.read_bits("discrete", address, count)
    }

    fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>, TransportError> {
        self.read_bits("coil", address, count)
    }

    fn write_single_coil(&mut self, address: u16, value: bool) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(format!("write coil {} {}", address, value));

        if state.failing_writes.contains(&address) {
            return Err(TransportError::Exception("SlaveDeviceFailure".to_string()));
        }

        state.coils.insert(address, value);
        state.coil_writes.push((address, value));
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.state.lock().unwrap().disconnects += 1;
        Ok(())
    }
}
