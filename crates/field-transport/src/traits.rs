use crate::{BusInfo, Result, UnitId};

/// A minimal blocking register bus interface.
///
/// Every call is one request/response pair. Implementations never retry;
/// retry policy belongs to the caller.
pub trait RegisterBus {
    /// Write a contiguous run of holding registers starting at `address`.
    fn write_registers(&mut self, address: u16, registers: &[u16], unit: UnitId) -> Result<()>;

    /// Read `count` holding registers starting at `address`.
    fn read_registers(&mut self, address: u16, count: u16, unit: UnitId) -> Result<Vec<u16>>;

    /// Describe the backend for reporting.
    fn info(&self) -> BusInfo;
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn write_registers(&mut self, address: u16, registers: &[u16], unit: UnitId) -> Result<()> {
        (**self).write_registers(address, registers, unit)
    }

    fn read_registers(&mut self, address: u16, count: u16, unit: UnitId) -> Result<Vec<u16>> {
        (**self).read_registers(address, count, unit)
    }

    fn info(&self) -> BusInfo {
        (**self).info()
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for Box<B> {
    fn write_registers(&mut self, address: u16, registers: &[u16], unit: UnitId) -> Result<()> {
        (**self).write_registers(address, registers, unit)
    }

    fn read_registers(&mut self, address: u16, count: u16, unit: UnitId) -> Result<Vec<u16>> {
        (**self).read_registers(address, count, unit)
    }

    fn info(&self) -> BusInfo {
        (**self).info()
    }
}
