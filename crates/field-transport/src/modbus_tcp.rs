use crate::{BusInfo, RegisterBus, Result, TransportError, UnitId};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use tokio_modbus::client::sync::{self, Reader, Writer};
use tokio_modbus::prelude::{Slave, SlaveContext};
use tracing::debug;

/// Modbus/TCP holding-register access over a single blocking session
pub struct ModbusTcpBus {
    addr: SocketAddr,
    ctx: Option<sync::Context>,
}

impl ModbusTcpBus {
    /// Resolve `host:port` and open one session to the gateway.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(map_io)?
            .next()
            .ok_or_else(|| TransportError::Io(format!("no address for {host}:{port}")))?;
        let ctx = sync::tcp::connect_slave(addr, Slave(0)).map_err(map_io)?;
        debug!(%addr, "modbus/tcp session opened");
        Ok(Self {
            addr,
            ctx: Some(ctx),
        })
    }

    /// Drop the session. Further requests fail with `Closed`.
    pub fn close(&mut self) {
        if self.ctx.take().is_some() {
            debug!(addr = %self.addr, "modbus/tcp session closed");
        }
    }

    fn session(&mut self, unit: UnitId) -> Result<&mut sync::Context> {
        let ctx = self.ctx.as_mut().ok_or(TransportError::Closed)?;
        ctx.set_slave(Slave(unit.raw()));
        Ok(ctx)
    }
}

impl Drop for ModbusTcpBus {
    fn drop(&mut self) {
        self.close();
    }
}

impl RegisterBus for ModbusTcpBus {
    fn write_registers(&mut self, address: u16, registers: &[u16], unit: UnitId) -> Result<()> {
        self.session(unit)?
            .write_multiple_registers(address, registers)
            .map_err(map_io)
    }

    fn read_registers(&mut self, address: u16, count: u16, unit: UnitId) -> Result<Vec<u16>> {
        let regs = self
            .session(unit)?
            .read_holding_registers(address, count)
            .map_err(map_io)?;
        if regs.len() != usize::from(count) {
            return Err(TransportError::InvalidBlock {
                expected: usize::from(count),
                actual: regs.len(),
            });
        }
        Ok(regs)
    }

    fn info(&self) -> BusInfo {
        BusInfo {
            name: self.addr.to_string(),
            driver: "modbus-tcp".to_string(),
        }
    }
}

fn map_io(e: io::Error) -> TransportError {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout,
        io::ErrorKind::Other | io::ErrorKind::InvalidData => {
            TransportError::Exception(e.to_string())
        }
        _ => TransportError::Io(e.to_string()),
    }
}
