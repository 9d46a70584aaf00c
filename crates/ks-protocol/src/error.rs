use crate::types::{DeviceClass, Field, Opcode};
use field_transport::TransportError;
use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{opcode} requires a {field} parameter")]
    MissingParameter { opcode: Opcode, field: Field },
    #[error("{opcode} is not accepted by {class} devices")]
    UnsupportedOpcode { class: DeviceClass, opcode: Opcode },
    #[error("{class} index {index} out of range (valid: 0..{count})")]
    IndexOutOfRange {
        class: DeviceClass,
        index: i64,
        count: usize,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}
