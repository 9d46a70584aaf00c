use crate::{BusInfo, RegisterBus, Result, Timestamp, TransportError, UnitId, WriteRecord};
use std::collections::{HashMap, VecDeque};

/// A simple in-process mock bus. Each bus instance is independent.
///
/// Writes land in an in-memory register map and are recorded in order. Reads
/// are served from a queue of scripted responses first, then from the map
/// (unset registers read as zero).
pub struct MockBus {
    name: String,
    registers: HashMap<(UnitId, u16), u16>,
    scripted_reads: VecDeque<Result<Vec<u16>>>,
    write_failures: VecDeque<TransportError>,
    writes: Vec<WriteRecord>,
    reads: usize,
}

impl MockBus {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            registers: HashMap::new(),
            scripted_reads: VecDeque::new(),
            write_failures: VecDeque::new(),
            writes: Vec::new(),
            reads: 0,
        }
    }

    /// Preload registers starting at `address` on `unit`.
    pub fn set_registers(&mut self, unit: UnitId, address: u16, values: &[u16]) {
        for (offset, value) in values.iter().enumerate() {
            let addr = address.wrapping_add(offset as u16);
            self.registers.insert((unit, addr), *value);
        }
    }

    pub fn register(&self, unit: UnitId, address: u16) -> u16 {
        self.registers.get(&(unit, address)).copied().unwrap_or(0)
    }

    /// Queue a block returned verbatim by the next read, regardless of address.
    pub fn push_read(&mut self, block: &[u16]) {
        self.scripted_reads.push_back(Ok(block.to_vec()));
    }

    pub fn push_read_error(&mut self, err: TransportError) {
        self.scripted_reads.push_back(Err(err));
    }

    /// Make the next write fail without touching the register map.
    pub fn fail_next_write(&mut self, err: TransportError) {
        self.write_failures.push_back(err);
    }

    pub fn writes(&self) -> &[WriteRecord] {
        &self.writes
    }

    pub fn last_write(&self) -> Option<&WriteRecord> {
        self.writes.last()
    }

    pub fn read_count(&self) -> usize {
        self.reads
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new("mock0")
    }
}

impl RegisterBus for MockBus {
    fn write_registers(&mut self, address: u16, registers: &[u16], unit: UnitId) -> Result<()> {
        if let Some(err) = self.write_failures.pop_front() {
            return Err(err);
        }
        self.set_registers(unit, address, registers);
        self.writes.push(WriteRecord {
            unit,
            address,
            registers: registers.to_vec(),
            timestamp: Some(Timestamp::now()),
        });
        Ok(())
    }

    fn read_registers(&mut self, address: u16, count: u16, unit: UnitId) -> Result<Vec<u16>> {
        self.reads += 1;
        if let Some(scripted) = self.scripted_reads.pop_front() {
            return scripted;
        }
        Ok((0..count)
            .map(|offset| self.register(unit, address.wrapping_add(offset)))
            .collect())
    }

    fn info(&self) -> BusInfo {
        BusInfo {
            name: self.name.clone(),
            driver: "mock".to_string(),
        }
    }
}
