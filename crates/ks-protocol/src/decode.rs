use crate::codec::unpack_i32;
use crate::types::{DeviceClass, StateCode};
use field_transport::TransportError;
use serde::Serialize;

/// Register offsets of the fields inside a class's status block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLayout {
    pub len: usize,
    pub operation_id: usize,
    pub state: usize,
    /// Actuators report the fault in the state register itself
    pub fault_code: usize,
    /// Low word of the remaining-time pair; the high word follows it
    pub remaining: usize,
    pub area: Option<usize>,
}

impl StatusLayout {
    pub const fn for_class(class: DeviceClass) -> Self {
        match class {
            DeviceClass::Switch | DeviceClass::Retractable => Self {
                len: 4,
                operation_id: 0,
                state: 1,
                fault_code: 1,
                remaining: 2,
                area: None,
            },
            DeviceClass::Dispenser => Self {
                len: 6,
                operation_id: 3,
                state: 0,
                fault_code: 2,
                remaining: 4,
                area: Some(1),
            },
        }
    }
}

/// A decoded status block. Correlation with the tracked operation is not
/// judged here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusBlock {
    pub operation_id: u16,
    pub state: StateCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_secs: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<u16>,
}

/// Decode a status block including timing fields.
pub fn decode(raw: &[u16], class: DeviceClass) -> Result<StatusBlock, TransportError> {
    decode_with(raw, class, true)
}

/// Decode a status block. Timing fields of in-progress states are only
/// extracted when `want_timing` is set.
pub fn decode_with(
    raw: &[u16],
    class: DeviceClass,
    want_timing: bool,
) -> Result<StatusBlock, TransportError> {
    let layout = StatusLayout::for_class(class);
    if raw.len() != layout.len {
        return Err(TransportError::InvalidBlock {
            expected: layout.len,
            actual: raw.len(),
        });
    }
    let state = StateCode::from_code(raw[layout.state]);
    let mut block = StatusBlock {
        operation_id: raw[layout.operation_id],
        state,
        fault_code: None,
        remaining_secs: None,
        area: None,
    };
    if state.is_fault() {
        block.fault_code = Some(raw[layout.fault_code]);
    } else if state.is_transitioning() && want_timing {
        block.remaining_secs = Some(unpack_i32(
            raw[layout.remaining],
            raw[layout.remaining + 1],
        ));
        block.area = layout.area.map(|idx| raw[idx]);
    }
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::pack_i32;

    #[test]
    fn switch_working_block() -> Result<(), TransportError> {
        let block = decode_with(&[2, 201, 0, 0], DeviceClass::Switch, false)?;
        assert_eq!(block.operation_id, 2);
        assert_eq!(block.state, StateCode::Working);
        assert_eq!(block.remaining_secs, None);
        assert_eq!(block.fault_code, None);
        Ok(())
    }

    #[test]
    fn retractable_remaining_time_when_requested() -> Result<(), TransportError> {
        let (lo, hi) = pack_i32(7);
        let block = decode(&[5, 301, lo, hi], DeviceClass::Retractable)?;
        assert_eq!(block.state, StateCode::Opening);
        assert_eq!(block.remaining_secs, Some(7));
        assert_eq!(block.area, None);
        Ok(())
    }

    #[test]
    fn ready_state_has_no_timing() -> Result<(), TransportError> {
        let block = decode(&[5, 0, 3, 0], DeviceClass::Retractable)?;
        assert_eq!(block.state, StateCode::Ready);
        assert_eq!(block.remaining_secs, None);
        Ok(())
    }

    #[test]
    fn dispenser_fault_carries_code_only() -> Result<(), TransportError> {
        let block = decode(&[1, 2, 7, 3, 10, 0], DeviceClass::Dispenser)?;
        assert_eq!(block.operation_id, 3);
        assert_eq!(block.state, StateCode::Error);
        assert_eq!(block.fault_code, Some(7));
        assert_eq!(block.remaining_secs, None);
        assert_eq!(block.area, None);
        Ok(())
    }

    #[test]
    fn dispenser_supplying_reports_area_and_time() -> Result<(), TransportError> {
        let (lo, hi) = pack_i32(25);
        let block = decode(&[402, 3, 0, 9, lo, hi], DeviceClass::Dispenser)?;
        assert_eq!(block.operation_id, 9);
        assert_eq!(block.state, StateCode::Supplying);
        assert_eq!(block.area, Some(3));
        assert_eq!(block.remaining_secs, Some(25));
        Ok(())
    }

    #[test]
    fn actuator_fault_code_is_the_state_register() -> Result<(), TransportError> {
        let block = decode(&[4, 4, 0, 0], DeviceClass::Switch)?;
        assert_eq!(block.state, StateCode::CurrentError);
        assert_eq!(block.fault_code, Some(4));
        Ok(())
    }

    #[test]
    fn short_block_is_transport_error() {
        assert_eq!(
            decode(&[2, 201, 0], DeviceClass::Switch),
            Err(TransportError::InvalidBlock {
                expected: 4,
                actual: 3
            })
        );
    }
}
