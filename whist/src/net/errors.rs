//! Network error types for framing, server, and client operations.

use std::{io, string::FromUtf8Error};

use thiserror::Error;

use super::config::ConfigError;

/// Errors that can occur while setting up, sending, or receiving frames
#[derive(Debug, Error)]
pub enum NetError {
    /// The listening socket could not be opened
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The client could not reach the server
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Payload is longer than the seven digit length field can express
    #[error("frame payload size {actual} exceeds maximum {max}")]
    FrameTooLarge { actual: usize, max: usize },

    /// The peer closed the connection part way through a frame
    #[error("truncated frame: expected {expected} bytes, received {received}")]
    TruncatedFrame { expected: usize, received: usize },

    /// The peer closed the connection at a frame boundary
    #[error("peer closed the connection")]
    PeerClosed,

    /// Header bytes did not match `HEAD ddddddd:`
    #[error("invalid frame header: {0:?}")]
    InvalidHeader(String),

    /// Payload bytes were not UTF-8
    #[error("frame payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    /// Transport failure while writing
    #[error("failed to send frame: {0}")]
    Send(#[source] io::Error),

    /// Transport failure while reading or accepting
    #[error("failed to receive frame: {0}")]
    Receive(#[source] io::Error),

    /// The caller referenced a slot that was never connected
    #[error("unknown slot {slot} ({slots} connected)")]
    UnknownSlot { slot: usize, slots: usize },

    /// A server operation was called with unusable settings
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for network operations
pub type Result<T> = std::result::Result<T, NetError>;

#[cfg(test)]
mod tests {
    use super::NetError;

    #[test]
    fn error_messages_carry_context() {
        let err = NetError::FrameTooLarge {
            actual: 10_000_000,
            max: 9_999_999,
        };
        assert_eq!(
            err.to_string(),
            "frame payload size 10000000 exceeds maximum 9999999"
        );

        let err = NetError::UnknownSlot { slot: 7, slots: 4 };
        assert_eq!(err.to_string(), "unknown slot 7 (4 connected)");
    }
}
