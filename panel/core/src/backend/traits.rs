//! Agent Backend Trait
//!
//! # Design Philosophy
//!
//! The backend exposes exactly what a turn needs:
//! - a request/response `send` for the non-streaming fallback
//! - a `send_stream` that opens a push subscription for one turn
//! - session create/rename for conversation bookkeeping
//!
//! Implementations own connection management. A subscription opened with
//! [`StreamOptions::once`] must never be re-issued after a reconnect, since
//! re-issuing it would run the turn again on the backend.

use async_trait::async_trait;

use super::Subscription;
use crate::message::ConversationId;
use crate::protocol::{SendParams, SendReply, SessionCreated, StreamOptions};
use crate::transport::TransportError;

/// Agent backend trait
///
/// Implement this trait to drive the panel from a different transport.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Get the backend name (e.g., "unix-socket")
    fn name(&self) -> &str;

    /// Send a turn and wait for the complete reply
    async fn send(&self, params: &SendParams) -> Result<SendReply, TransportError>;

    /// Send a turn and subscribe to its push events
    ///
    /// The returned subscription yields events in arrival order until the
    /// terminal `stream_end`, or ends early if the connection is lost.
    async fn send_stream(
        &self,
        params: &SendParams,
        options: StreamOptions,
    ) -> Result<Subscription, TransportError>;

    /// Create a new session
    async fn create_session(
        &self,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> Result<SessionCreated, TransportError>;

    /// Set a session's title
    async fn rename_session(
        &self,
        conversation_id: &ConversationId,
        title: &str,
    ) -> Result<(), TransportError>;
}
