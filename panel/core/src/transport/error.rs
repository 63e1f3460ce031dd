//! Transport errors

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur talking to the backend
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection to the backend failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection was closed while a request was outstanding
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to hand a command to the writer
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Transport not in the expected state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Message serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Frame checksum mismatch - data corruption detected
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum carried by the frame
        expected: u32,
        /// Checksum of the received payload
        actual: u32,
    },

    /// Frame exceeds the size limit
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Payload size
        size: usize,
        /// Limit
        max: usize,
    },

    /// The backend answered `success: false`; carries its message verbatim
    #[error("{0}")]
    RequestFailed(String),

    /// No result arrived in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The result did not have the expected shape
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    /// IO error from the underlying socket
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether the byte stream can no longer be trusted
    #[must_use]
    pub fn is_fatal_frame_error(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. } | Self::FrameTooLarge { .. })
    }
}
