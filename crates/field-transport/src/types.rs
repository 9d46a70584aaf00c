use core::fmt;
use time::OffsetDateTime;

/// Bus unit (slave) identifier addressed by a request
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u8);

impl UnitId {
    pub fn raw(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit {}", self.0)
    }
}

impl From<u8> for UnitId {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

/// A register write as it went out on the bus
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WriteRecord {
    pub unit: UnitId,
    pub address: u16,
    pub registers: Vec<u16>,
    pub timestamp: Option<Timestamp>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timestamp(pub OffsetDateTime);

impl Timestamp {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }
}

/// Backend description, reported alongside each device run
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BusInfo {
    pub name: String,
    pub driver: String,
}

impl fmt::Display for BusInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.name, self.driver)
    }
}
