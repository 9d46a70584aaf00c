//! field-transport: register-addressed field-bus abstractions
//!
//! This crate provides the blocking request/response interface used to write and
//! read 16-bit holding registers on a greenhouse automation bus, with
//! feature-gated backends. The default build enables a `mock` backend so that
//! binaries and tests run on any host without a live bus.

mod types;
pub use types::{BusInfo, Timestamp, UnitId, WriteRecord};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::RegisterBus;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MockBus;

#[cfg(feature = "modbus-tcp")]
mod modbus_tcp;

#[cfg(feature = "modbus-tcp")]
pub use modbus_tcp::ModbusTcpBus;
