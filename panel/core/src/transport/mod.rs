//! Transport Layer for Panel-Backend IPC
//!
//! Carries [`Command`](crate::protocol::Command)s to the agent backend and
//! [`ServerFrame`](crate::protocol::ServerFrame)s back over one persistent
//! connection.
//!
//! # Design Philosophy
//!
//! The transport separates the wire from the turn logic. The streaming client
//! and the turn controller only see [`AgentBackend`](crate::backend::AgentBackend);
//! the Unix socket implementation here multiplexes request/response pairs and
//! push subscriptions over a single stream.
//!
//! # Security
//!
//! - Unix domain sockets only, no network exposure
//! - Frame size is bounded before any buffer is allocated
//! - CRC32 checksum on every frame

pub mod config;
mod error;
pub mod frame;
#[cfg(unix)]
pub mod unix_socket;

pub use config::{default_socket_path, TransportConfig};
pub use error::TransportError;
pub use frame::{encode, FrameDecoder};

#[cfg(unix)]
pub use unix_socket::UnixSocketBackend;
