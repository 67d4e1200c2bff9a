//! Modbus transport seam and its TCP implementation.
//!
//! [`DeviceSession`](crate::session::DeviceSession) only talks to the traits
//! in this module. [`TcpConnector`] is the production implementation, built on
//! the blocking `tokio-modbus` client; tests plug in an in-memory device.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tokio_modbus::client::sync::{self, tcp};
use tokio_modbus::prelude::{Slave, SyncReader, SyncWriter};
use tracing::debug;

use crate::error::{ConnectError, TransportError};
use crate::register_map::SourceTable;

/// Where and how to reach the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host address (IP or hostname)
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Modbus unit/slave id
    pub unit_id: u8,
    /// Limit on establishing the TCP connection
    pub connect_timeout: Duration,
    /// Limit on each request/response exchange
    pub response_timeout: Duration,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, unit_id: u8) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id,
            connect_timeout: Duration::from_secs(3),
            response_timeout: Duration::from_secs(1),
        }
    }

    pub fn with_timeouts(mut self, connect: Duration, response: Duration) -> Self {
        self.connect_timeout = connect;
        self.response_timeout = response;
        self
    }

    /// `host:port` form used in logs and errors.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// First address for `host:port`.
    ///
    /// IP literals never block. A hostname goes through the system resolver,
    /// which `connect_timeout` does not bound, so a hung resolver stalls
    /// [`Connector::connect`]. Configure an IP address to avoid that.
    fn resolve(&self) -> Result<SocketAddr, ConnectError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|_| ConnectError::InvalidAddress(self.address()))?
            .next()
            .ok_or_else(|| ConnectError::InvalidAddress(self.address()))
    }
}

/// Blocking Modbus exchanges against one unit.
///
/// [`read_table`](Self::read_table) returns bit tables as 0/1 words so every
/// decode rule sees the same shape.
pub trait ModbusTransport {
    /// Function 03.
    fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError>;

    /// Function 04.
    fn read_input_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError>;

    /// Function 02.
    fn read_discrete_inputs(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<bool>, TransportError>;

    /// Function 01.
    fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>, TransportError>;

    /// Function 05.
    fn write_single_coil(&mut self, address: u16, value: bool) -> Result<(), TransportError>;

    /// Release the link. Dropping the transport must also release it.
    fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Read `count` words from `table` starting at `address`.
    fn read_table(
        &mut self,
        table: SourceTable,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        match table {
            SourceTable::Holding => self.read_holding_registers(address, count),
            SourceTable::Input => self.read_input_registers(address, count),
            SourceTable::Discrete => self
                .read_discrete_inputs(address, count)
                .map(|bits| bits_to_words(&bits)),
            SourceTable::Coil => self
                .read_coils(address, count)
                .map(|bits| bits_to_words(&bits)),
        }
    }
}

fn bits_to_words(bits: &[bool]) -> Vec<u16> {
    bits.iter().map(|&bit| u16::from(bit)).collect()
}

/// Opens transports for a session.
pub trait Connector {
    type Transport: ModbusTransport;

    fn connect(&self, endpoint: &Endpoint) -> Result<Self::Transport, ConnectError>;
}

/// Modbus TCP connector using the blocking `tokio-modbus` client.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    fn connect(&self, endpoint: &Endpoint) -> Result<TcpTransport, ConnectError> {
        let addr = endpoint.resolve()?;
        let slave = Slave(endpoint.unit_id);

        debug!("Connecting to {} (unit {})", addr, endpoint.unit_id);

        let mut ctx = tcp::connect_slave_with_timeout(addr, slave, Some(endpoint.connect_timeout))
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::TimedOut => ConnectError::Timeout {
                    addr: endpoint.address(),
                },
                _ => ConnectError::Io {
                    addr: endpoint.address(),
                    source: e,
                },
            })?;
        ctx.set_timeout(Some(endpoint.response_timeout));

        Ok(TcpTransport { ctx })
    }
}

/// A live Modbus TCP link. Dropping it closes the socket.
pub struct TcpTransport {
    ctx: sync::Context,
}

impl ModbusTransport for TcpTransport {
    fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        map_modbus_result(self.ctx.read_holding_registers(address, count))
    }

    fn read_input_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        map_modbus_result(self.ctx.read_input_registers(address, count))
    }

    fn read_discrete_inputs(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<bool>, TransportError> {
        map_modbus_result(self.ctx.read_discrete_inputs(address, count))
    }

    fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>, TransportError> {
        map_modbus_result(self.ctx.read_coils(address, count))
    }

    fn write_single_coil(&mut self, address: u16, value: bool) -> Result<(), TransportError> {
        map_modbus_result(self.ctx.write_single_coil(address, value))
    }
}

/// Flatten the nested `tokio-modbus` result (transport error outside,
/// exception response inside).
fn map_modbus_result<T>(result: tokio_modbus::Result<T>) -> Result<T, TransportError> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(exception)) => Err(TransportError::Exception(format!("{:?}", exception))),
        Err(e) => Err(TransportError::Transport(e.to_string())),
    }
}
