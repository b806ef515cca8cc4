//! Error types

use std::path::PathBuf;
use thiserror::Error;

/// Reasons an inbound datagram is discarded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("payload is not valid UTF-8")]
    NotUtf8,

    #[error("unknown message prefix: {0:?}")]
    UnknownPrefix(String),

    #[error("expected 3 colon-separated fields, got {0}")]
    FieldCount(usize),

    #[error("not a decimal integer: {0:?}")]
    InvalidInteger(String),
}

/// Indicator and button I/O failures
#[derive(Error, Debug)]
pub enum HalError {
    #[error("indicator slot {0} out of range")]
    SlotOutOfRange(u8),

    #[error("GPIO error: {0}")]
    Gpio(String),
}

/// Coordinator errors
#[derive(Error, Debug)]
pub enum SwarmError {
    #[error("failed to bind UDP port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("hardware error: {0}")]
    Hardware(#[from] HalError),

    #[error("session log {path:?}: {source}")]
    SessionLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no session log open")]
    NoSession,

    #[error("control channel closed")]
    ControlChannelClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
