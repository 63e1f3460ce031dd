//! Frame Protocol
//!
//! Wire format for panel-backend messages: length-prefixed JSON with a CRC32
//! checksum.
//!
//! # Frame Format
//!
//! ```text
//! +----------------+----------------+------------------------------------------+
//! | Length (4)     | Checksum (4)   | JSON Payload (variable)                  |
//! | big-endian u32 | CRC32 (BE)     | Command or ServerFrame                   |
//! +----------------+----------------+------------------------------------------+
//! ```
//!
//! Length counts the payload only. A frame whose checksum verifies is consumed
//! even if its JSON does not decode, so one malformed message does not wedge
//! the stream. A bad checksum or an oversized length leaves the stream
//! unsynchronized and is fatal for the connection.

use serde::{de::DeserializeOwned, Serialize};

use super::TransportError;

/// Maximum frame payload size (10 MB)
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Minimum buffer capacity for the decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Frame header size: 4 bytes length + 4 bytes checksum
const HEADER_SIZE: usize = 8;

#[inline]
fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Encode a message into a frame
///
/// # Errors
///
/// Returns `TransportError::SerializationError` if serialization fails and
/// `TransportError::FrameTooLarge` if the payload exceeds [`MAX_FRAME_SIZE`].
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, TransportError> {
    let json =
        serde_json::to_vec(msg).map_err(|e| TransportError::SerializationError(e.to_string()))?;

    if json.len() > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: json.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + json.len());
    buf.extend_from_slice(&(json.len() as u32).to_be_bytes());
    buf.extend_from_slice(&crc32fast::hash(&json).to_be_bytes());
    buf.extend_from_slice(&json);
    Ok(buf)
}

/// Incremental frame decoder
///
/// Buffers incoming bytes and yields complete messages.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Bytes before this position are consumed
    read_pos: usize,
    /// Largest payload accepted
    max_frame_size: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder accepting frames up to [`MAX_FRAME_SIZE`]
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Create a decoder with a custom frame size limit
    #[must_use]
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
            max_frame_size,
        }
    }

    /// Append bytes to the buffer
    pub fn push(&mut self, data: &[u8]) {
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Number of unconsumed bytes
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Try to decode the next frame
    ///
    /// Returns:
    /// - `Ok(Some(msg))` if a complete frame was decoded
    /// - `Ok(None)` if more data is needed
    /// - `Err(ChecksumMismatch)` / `Err(FrameTooLarge)`: the stream cannot be
    ///   resynchronized
    /// - `Err(SerializationError)` for a verified frame whose JSON does not
    ///   decode: the frame is skipped and decoding may continue
    pub fn decode<T: DeserializeOwned>(&mut self) -> Result<Option<T>, TransportError> {
        if self.available() < HEADER_SIZE {
            return Ok(None);
        }

        let header = &self.buffer[self.read_pos..self.read_pos + HEADER_SIZE];
        let len = read_u32(&header[..4]) as usize;
        let expected = read_u32(&header[4..]);

        if len > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        if self.available() < HEADER_SIZE + len {
            return Ok(None);
        }

        let payload_start = self.read_pos + HEADER_SIZE;
        let payload_end = payload_start + len;
        let payload = &self.buffer[payload_start..payload_end];

        let actual = crc32fast::hash(payload);
        if actual != expected {
            return Err(TransportError::ChecksumMismatch { expected, actual });
        }

        let decoded = serde_json::from_slice(payload)
            .map_err(|e| TransportError::SerializationError(e.to_string()));
        self.read_pos = payload_end;
        decoded.map(Some)
    }

    /// Drop all buffered bytes
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
    }
}
