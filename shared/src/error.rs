use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the frame transport and message validation.
///
/// None of these are retried; the owner of the connection tears it down.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection lost: {0}")]
    Connection(#[from] io::Error),
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("payload could not be (de)serialized: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("no traffic for {0:?}")]
    Timeout(Duration),
}

impl FrameError {
    pub fn protocol(reason: impl Into<String>) -> Self {
        FrameError::Protocol(reason.into())
    }

    /// True for an orderly close by the peer rather than a fault.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, FrameError::Connection(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}
