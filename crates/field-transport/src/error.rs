use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("timeout")]
    Timeout,
    #[error("device exception: {0}")]
    Exception(String),
    #[error("invalid register block: expected {expected} registers, got {actual}")]
    InvalidBlock { expected: usize, actual: usize },
    #[error("bus session closed")]
    Closed,
}
