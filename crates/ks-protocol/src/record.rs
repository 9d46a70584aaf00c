use crate::addressing::ChannelAddress;
use crate::encode::Command;
use crate::tracker::{PollOutcome, TrackerState};
use serde::Serialize;
use time::OffsetDateTime;

/// What was written, for the reporting side
#[derive(Debug, Clone, Serialize)]
pub struct CommandRecord {
    pub channel: ChannelAddress,
    pub opcode: &'static str,
    pub opcode_code: u16,
    pub operation_id: u16,
    pub registers: Vec<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

/// What a poll saw, for the reporting side
#[derive(Debug, Clone, Serialize)]
pub struct ObservationRecord {
    pub channel: ChannelAddress,
    pub outcome: PollOutcome,
    pub tracker: TrackerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl CommandRecord {
    pub fn new(channel: ChannelAddress, cmd: &Command, ts: Option<OffsetDateTime>) -> Self {
        Self {
            channel,
            opcode: cmd.opcode.as_str(),
            opcode_code: cmd.opcode.code(),
            operation_id: cmd.operation_id,
            registers: cmd.registers.clone(),
            ts: ts.and_then(rfc3339),
        }
    }
}

impl ObservationRecord {
    pub fn new(
        channel: ChannelAddress,
        outcome: PollOutcome,
        tracker: TrackerState,
        ts: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            channel,
            outcome,
            tracker,
            ts: ts.and_then(rfc3339),
        }
    }
}

fn rfc3339(t: OffsetDateTime) -> Option<String> {
    t.format(&time::format_description::well_known::Rfc3339).ok()
}
