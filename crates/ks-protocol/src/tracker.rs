//! Per-channel operation tracking.
//!
//! A [`Channel`] owns one bus session and the operation id counter of one
//! device. Commands are sent with [`Channel::send`]; the caller then polls with
//! [`Channel::poll`] until the outcome is terminal or its own attempt budget
//! runs out. Cadence and attempt limits are the caller's business.

use crate::addressing::{AddressMap, ChannelAddress};
use crate::decode::{decode_with, StatusBlock};
use crate::encode::Command;
use crate::error::Result;
use crate::metrics::ProtocolMetrics;
use crate::types::{CommandParams, DeviceClass, Opcode};
use field_transport::RegisterBus;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Operation id a fresh channel starts from. The first command carries `+1`.
pub const INITIAL_OPERATION_ID: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Fault(u16),
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    Idle,
    CommandSent(Opcode),
    Polling(Opcode),
    Terminal(Outcome),
}

impl TrackerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

/// Result of one status poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PollOutcome {
    /// The device has not caught up with the latest command yet
    Stale {
        expected: u16,
        observed: u16,
        block: StatusBlock,
    },
    InProgress(StatusBlock),
    /// Back at rest under the current operation id
    Settled(StatusBlock),
    Fault {
        fault_code: u16,
        block: StatusBlock,
    },
}

impl PollOutcome {
    pub fn block(&self) -> &StatusBlock {
        match self {
            Self::Stale { block, .. } | Self::Fault { block, .. } => block,
            Self::InProgress(block) | Self::Settled(block) => block,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled(_) | Self::Fault { .. })
    }
}

/// One device under test: its addresses, bus session and operation tracker
pub struct Channel<B> {
    address: ChannelAddress,
    bus: B,
    operation_id: u16,
    state: TrackerState,
    /// Opcode written under the current operation id, if the write went out
    outstanding: Option<Opcode>,
    metrics: Option<ProtocolMetrics>,
}

impl<B: RegisterBus> Channel<B> {
    pub fn new(bus: B, address: ChannelAddress) -> Self {
        Self {
            address,
            bus,
            operation_id: INITIAL_OPERATION_ID,
            state: TrackerState::Idle,
            outstanding: None,
            metrics: None,
        }
    }

    /// Resolve `class`/`index` against `map` and open a channel on `bus`.
    pub fn open(bus: B, map: &AddressMap, class: DeviceClass, index: i64) -> Result<Self> {
        let address = map.resolve(class, index)?;
        Ok(Self::new(bus, address))
    }

    pub fn with_initial_operation_id(mut self, id: u16) -> Self {
        self.operation_id = id;
        self
    }

    pub fn with_metrics(mut self, metrics: ProtocolMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn address(&self) -> &ChannelAddress {
        &self.address
    }

    pub fn class(&self) -> DeviceClass {
        self.address.class
    }

    pub fn operation_id(&self) -> u16 {
        self.operation_id
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Encode and write a command under a fresh operation id.
    ///
    /// An invalid command fails before the counter moves. A failed write keeps
    /// the tracker state but the id stays consumed. Any outstanding operation
    /// is superseded.
    pub fn send(&mut self, opcode: Opcode, params: &CommandParams) -> Result<Command> {
        let next = self.operation_id.wrapping_add(1);
        let cmd = Command::build(self.address.class, opcode, next, params)?;
        self.operation_id = next;
        self.outstanding = None;
        if let TrackerState::CommandSent(prev) | TrackerState::Polling(prev) = self.state {
            debug!(
                class = %self.address.class,
                index = self.address.index,
                superseded = %prev,
                "sending over an unfinished operation"
            );
        }
        debug!(
            unit = %self.address.unit_id,
            address = self.address.command_base,
            registers = ?cmd.registers,
            "write command"
        );
        let (base, unit) = (self.address.command_base, self.address.unit_id);
        self.bus.write_registers(base, &cmd.registers, unit)?;
        if let Some(m) = &self.metrics {
            m.commands_sent.inc();
        }
        self.outstanding = Some(opcode);
        self.state = TrackerState::CommandSent(opcode);
        Ok(cmd)
    }

    /// Read and judge the status block against the current operation id.
    ///
    /// The tracker only moves when a command went out under that id: a
    /// correlated busy block puts it (back) into `Polling`, a ready or fault
    /// block makes it terminal. Before the first successful write the
    /// outcome is reported and the state stays as it is.
    pub fn poll(&mut self, want_timing: bool) -> Result<PollOutcome> {
        let raw = self.bus.read_registers(
            self.address.status_base,
            self.address.status_len(),
            self.address.unit_id,
        )?;
        debug!(
            unit = %self.address.unit_id,
            address = self.address.status_base,
            registers = ?raw,
            "read status"
        );
        let block = decode_with(&raw, self.address.class, want_timing)?;
        if let Some(m) = &self.metrics {
            m.status_reads.inc();
        }

        if block.operation_id != self.operation_id {
            if let Some(m) = &self.metrics {
                m.stale_reads.inc();
            }
            return Ok(PollOutcome::Stale {
                expected: self.operation_id,
                observed: block.operation_id,
                block,
            });
        }

        let outcome = if let Some(fault_code) = block.fault_code {
            if let Some(m) = &self.metrics {
                m.faults.inc();
            }
            warn!(
                class = %self.address.class,
                index = self.address.index,
                operation_id = self.operation_id,
                fault_code,
                "device reported a fault"
            );
            self.finish(Outcome::Fault(fault_code));
            PollOutcome::Fault { fault_code, block }
        } else if block.state.is_ready() {
            self.finish(Outcome::Success);
            PollOutcome::Settled(block)
        } else {
            if let Some(op) = self.outstanding {
                self.state = TrackerState::Polling(op);
            }
            PollOutcome::InProgress(block)
        };
        Ok(outcome)
    }

    fn finish(&mut self, outcome: Outcome) {
        if self.outstanding.is_none() {
            return;
        }
        self.state = TrackerState::Terminal(outcome);
        info!(
            class = %self.address.class,
            index = self.address.index,
            operation_id = self.operation_id,
            state = ?self.state,
            "operation finished"
        );
    }

    /// Record that the caller gave up waiting. Only an outstanding command
    /// can time out.
    pub fn mark_timeout(&mut self) {
        if matches!(
            self.state,
            TrackerState::CommandSent(_) | TrackerState::Polling(_)
        ) {
            info!(
                class = %self.address.class,
                index = self.address.index,
                operation_id = self.operation_id,
                "operation timed out"
            );
            self.state = TrackerState::Terminal(Outcome::Timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::pack_i32;
    use crate::error::Error;
    use crate::metrics::MetricsHub;
    use crate::types::{Field, StateCode};
    use field_transport::{MockBus, TransportError, UnitId};

    fn channel(class: DeviceClass, index: i64) -> Result<Channel<MockBus>> {
        Channel::open(MockBus::default(), &AddressMap::default(), class, index)
    }

    #[test]
    fn operation_id_increments_per_send() -> Result<()> {
        let mut ch = channel(DeviceClass::Switch, 0)?;
        assert_eq!(ch.operation_id(), INITIAL_OPERATION_ID);
        for _ in 0..5 {
            ch.send(Opcode::Off, &CommandParams::new())?;
        }
        assert_eq!(ch.operation_id(), INITIAL_OPERATION_ID + 5);
        let ids: Vec<u16> = ch.bus().writes().iter().map(|w| w.registers[1]).collect();
        assert_eq!(ids, vec![2, 3, 4, 5, 6]);

        let mut ch = channel(DeviceClass::Dispenser, 0)?.with_initial_operation_id(100);
        for _ in 0..3 {
            ch.send(Opcode::OnceWater, &CommandParams::new())?;
        }
        assert_eq!(ch.operation_id(), 103);
        Ok(())
    }

    #[test]
    fn switch_on_then_ready() -> Result<()> {
        let mut ch = channel(DeviceClass::Switch, 1)?;
        let cmd = ch.send(Opcode::On, &CommandParams::new())?;
        assert_eq!(cmd.registers, vec![201, 2]);
        let write = ch.bus().last_write().cloned();
        assert_eq!(write.map(|w| (w.unit, w.address)), Some((UnitId(4), 507)));
        assert_eq!(ch.state(), TrackerState::CommandSent(Opcode::On));

        ch.bus_mut().push_read(&[2, 201, 0, 0]);
        let first = ch.poll(false)?;
        assert_eq!(first.block().operation_id, 2);
        assert_eq!(first.block().state, StateCode::Working);
        assert!(matches!(first, PollOutcome::InProgress(_)));
        assert_eq!(ch.state(), TrackerState::Polling(Opcode::On));

        ch.bus_mut().push_read(&[2, 0, 0, 0]);
        assert!(matches!(ch.poll(false)?, PollOutcome::Settled(_)));
        assert_eq!(ch.state(), TrackerState::Terminal(Outcome::Success));
        Ok(())
    }

    #[test]
    fn mismatched_id_is_stale_whatever_the_state() -> Result<()> {
        let mut ch = channel(DeviceClass::Retractable, 0)?;
        ch.send(Opcode::Open, &CommandParams::new())?;
        for state in [0u16, 1, 301, 302] {
            ch.bus_mut().push_read(&[1, state, 0, 0]);
            let out = ch.poll(true)?;
            assert!(
                matches!(out, PollOutcome::Stale { expected: 2, observed: 1, .. }),
                "{out:?}"
            );
        }
        assert_eq!(ch.state(), TrackerState::CommandSent(Opcode::Open));
        Ok(())
    }

    #[test]
    fn timed_open_encodes_duration() -> Result<()> {
        let mut ch = channel(DeviceClass::Retractable, 0)?;
        let cmd = ch.send(Opcode::TimedOpen, &CommandParams::new().with_duration(10))?;
        let (lo, hi) = pack_i32(10);
        assert_eq!(cmd.registers, vec![303, 2, lo, hi]);
        assert_eq!(ch.bus().last_write().map(|w| w.address), Some(567));

        let (rlo, rhi) = pack_i32(8);
        ch.bus_mut().push_read(&[2, 301, rlo, rhi]);
        let out = ch.poll(true)?;
        assert_eq!(out.block().remaining_secs, Some(8));
        Ok(())
    }

    #[test]
    fn dispenser_fault_is_terminal() -> Result<()> {
        let mut ch = channel(DeviceClass::Dispenser, 0)?;
        ch.send(Opcode::OnceWater, &CommandParams::new())?;
        ch.bus_mut().push_read(&[1, 0, 7, 2, 0, 0]);
        let out = ch.poll(true)?;
        assert!(matches!(out, PollOutcome::Fault { fault_code: 7, .. }));
        assert_eq!(ch.state(), TrackerState::Terminal(Outcome::Fault(7)));
        Ok(())
    }

    #[test]
    fn missing_parameter_leaves_channel_untouched() -> Result<()> {
        let mut ch = channel(DeviceClass::Switch, 0)?;
        let res = ch.send(Opcode::TimedOn, &CommandParams::new());
        assert!(matches!(
            res,
            Err(Error::MissingParameter {
                field: Field::Duration,
                ..
            })
        ));
        assert_eq!(ch.operation_id(), INITIAL_OPERATION_ID);
        assert_eq!(ch.state(), TrackerState::Idle);
        assert!(ch.bus().writes().is_empty());
        Ok(())
    }

    #[test]
    fn transport_failure_keeps_state() -> Result<()> {
        let mut ch = channel(DeviceClass::Switch, 0)?;
        ch.bus_mut().fail_next_write(TransportError::Timeout);
        let res = ch.send(Opcode::On, &CommandParams::new());
        assert!(matches!(res, Err(Error::Transport(TransportError::Timeout))));
        assert_eq!(ch.state(), TrackerState::Idle);
        assert_eq!(ch.operation_id(), INITIAL_OPERATION_ID + 1);

        ch.bus_mut().push_read_error(TransportError::Io("reset".into()));
        assert!(matches!(ch.poll(false), Err(Error::Transport(_))));
        assert_eq!(ch.state(), TrackerState::Idle);
        Ok(())
    }

    #[test]
    fn short_status_block_is_an_error() -> Result<()> {
        let mut ch = channel(DeviceClass::Switch, 0)?;
        ch.send(Opcode::On, &CommandParams::new())?;
        ch.bus_mut().push_read(&[2, 201]);
        assert!(matches!(
            ch.poll(false),
            Err(Error::Transport(TransportError::InvalidBlock { .. }))
        ));
        Ok(())
    }

    #[test]
    fn newer_command_supersedes_outstanding_one() -> Result<()> {
        let mut ch = channel(DeviceClass::Retractable, 2)?;
        ch.send(Opcode::TimedOpen, &CommandParams::new().with_duration(10))?;
        ch.bus_mut().push_read(&[2, 301, 10, 0]);
        ch.poll(true)?;
        ch.send(Opcode::TimedClose, &CommandParams::new().with_duration(10))?;
        // Device still reporting the earlier operation
        ch.bus_mut().push_read(&[2, 301, 9, 0]);
        assert!(ch.poll(true)?.is_stale());
        ch.bus_mut().push_read(&[3, 302, 10, 0]);
        assert!(matches!(ch.poll(true)?, PollOutcome::InProgress(_)));
        assert_eq!(ch.state(), TrackerState::Polling(Opcode::TimedClose));
        Ok(())
    }

    #[test]
    fn timeout_only_applies_while_outstanding() -> Result<()> {
        let mut ch = channel(DeviceClass::Switch, 0)?;
        ch.send(Opcode::On, &CommandParams::new())?;
        ch.mark_timeout();
        assert_eq!(ch.state(), TrackerState::Terminal(Outcome::Timeout));

        ch.send(Opcode::Off, &CommandParams::new())?;
        ch.bus_mut().push_read(&[3, 0, 0, 0]);
        ch.poll(false)?;
        ch.mark_timeout();
        assert_eq!(ch.state(), TrackerState::Terminal(Outcome::Success));
        Ok(())
    }

    #[test]
    fn metrics_count_traffic() -> anyhow::Result<()> {
        let hub = MetricsHub::new().map_err(anyhow::Error::msg)?;
        let mut ch = channel(DeviceClass::Switch, 0)?.with_metrics(hub.protocol.clone());
        ch.send(Opcode::On, &CommandParams::new())?;
        ch.bus_mut().push_read(&[1, 201, 0, 0]);
        ch.poll(false)?;
        ch.bus_mut().push_read(&[2, 5, 0, 0]);
        ch.poll(false)?;
        assert_eq!(hub.protocol.commands_sent.get(), 1);
        assert_eq!(hub.protocol.status_reads.get(), 2);
        assert_eq!(hub.protocol.stale_reads.get(), 1);
        assert_eq!(hub.protocol.faults.get(), 1);
        assert!(hub.encode_text().contains("ks_commands_sent 1"));
        Ok(())
    }

    #[test]
    fn reads_before_any_command_leave_idle() -> Result<()> {
        let mut ch = channel(DeviceClass::Switch, 0)?;
        ch.bus_mut().push_read(&[INITIAL_OPERATION_ID, 0, 0, 0]);
        assert!(matches!(ch.poll(false)?, PollOutcome::Settled(_)));
        assert_eq!(ch.state(), TrackerState::Idle);

        ch.bus_mut().push_read(&[INITIAL_OPERATION_ID, 4, 0, 0]);
        assert!(matches!(ch.poll(false)?, PollOutcome::Fault { .. }));
        assert_eq!(ch.state(), TrackerState::Idle);

        ch.mark_timeout();
        assert_eq!(ch.state(), TrackerState::Idle);
        assert!(ch.bus().writes().is_empty());
        Ok(())
    }

    #[test]
    fn busy_read_after_terminal_resumes_polling() -> Result<()> {
        let mut ch = channel(DeviceClass::Switch, 0)?;
        ch.send(Opcode::On, &CommandParams::new())?;
        ch.bus_mut().push_read(&[2, 0, 0, 0]);
        ch.poll(false)?;
        assert_eq!(ch.state(), TrackerState::Terminal(Outcome::Success));

        ch.bus_mut().push_read(&[2, 201, 0, 0]);
        assert!(matches!(ch.poll(false)?, PollOutcome::InProgress(_)));
        assert_eq!(ch.state(), TrackerState::Polling(Opcode::On));

        ch.mark_timeout();
        ch.bus_mut().push_read(&[2, 201, 0, 0]);
        ch.poll(false)?;
        assert_eq!(ch.state(), TrackerState::Polling(Opcode::On));
        Ok(())
    }

    #[test]
    fn failed_write_does_not_own_later_reads() -> Result<()> {
        let mut ch = channel(DeviceClass::Switch, 0)?;
        ch.send(Opcode::On, &CommandParams::new())?;
        ch.bus_mut().fail_next_write(TransportError::Timeout);
        assert!(ch.send(Opcode::Off, &CommandParams::new()).is_err());
        ch.bus_mut().push_read(&[3, 0, 0, 0]);
        assert!(matches!(ch.poll(false)?, PollOutcome::Settled(_)));
        assert_eq!(ch.state(), TrackerState::CommandSent(Opcode::On));
        Ok(())
    }
}
