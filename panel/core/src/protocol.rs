//! Backend Wire Protocol
//!
//! Commands sent from the panel to the agent backend, and the frames the
//! backend sends back over the same connection.
//!
//! # Shape
//!
//! ```text
//! panel ──► Command { id, command: send | send_stream | create_session
//!                                | rename_session | unsubscribe }
//! panel ◄── ServerFrame::Result { id, success, result?, error? }
//! panel ◄── ServerFrame::Event  { subscription, event: PushEvent }
//! ```
//!
//! A `send_stream` command opens a push subscription whose ID is the
//! command's own ID. Its events end with `stream_end`; the success variant
//! does not repeat the text, so the final content is whatever the chunks
//! added up to.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::message::{ConversationId, MessageId};

/// Correlates a command with its result frame
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new unique request ID
    #[must_use]
    pub fn new() -> Self {
        Self(format!("req_{}", Uuid::new_v4().simple()))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies a push subscription (equal to the opening command's ID)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub String);

impl From<&RequestId> for SubscriptionId {
    fn from(id: &RequestId) -> Self {
        Self(id.0.clone())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attachment as carried by `send` / `send_stream`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentPayload {
    /// File name
    pub filename: String,
    /// MIME type
    pub mime_type: String,
    /// Base64-encoded content
    pub content: String,
    /// Size in bytes (of the decoded content)
    pub size: u64,
}

/// Parameters of one user turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendParams {
    /// Target conversation
    pub conversation_id: ConversationId,
    /// User text
    pub text: String,
    /// Selected provider
    #[serde(default)]
    pub provider: Option<String>,
    /// Selected model
    #[serde(default)]
    pub model: Option<String>,
    /// Attachments (ready only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentPayload>,
    /// Ask the backend for debug output
    #[serde(default)]
    pub debug: bool,
}

/// Options for opening a push subscription
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamOptions {
    /// Whether the transport may re-issue the subscription after a reconnect
    pub resubscribe: bool,
}

impl StreamOptions {
    /// A subscription that must never be replayed. Replaying `send_stream`
    /// would run the turn a second time on the backend.
    #[must_use]
    pub fn once() -> Self {
        Self { resubscribe: false }
    }
}

/// Command body, tagged by `type`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandBody {
    /// Request/response turn
    Send {
        /// Turn parameters
        request: SendParams,
    },
    /// Streaming turn; opens a push subscription
    SendStream {
        /// Turn parameters
        request: SendParams,
        /// Whether the transport may replay this after a reconnect
        resubscribe: bool,
    },
    /// Create a new session
    CreateSession {
        /// Provider for the session
        #[serde(default)]
        provider: Option<String>,
        /// Model for the session
        #[serde(default)]
        model: Option<String>,
    },
    /// Set a session's title
    RenameSession {
        /// Session to rename
        conversation_id: ConversationId,
        /// New title
        title: String,
    },
    /// Stop pushing events for a subscription
    Unsubscribe {
        /// Subscription to close
        subscription: SubscriptionId,
    },
}

/// A command as written to the wire
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Request ID, echoed in the result frame
    pub id: RequestId,
    /// What to do
    pub command: CommandBody,
}

impl Command {
    /// Wrap a body with a fresh request ID
    #[must_use]
    pub fn new(command: CommandBody) -> Self {
        Self {
            id: RequestId::new(),
            command,
        }
    }
}

/// Push event of a streaming turn, tagged by `type`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    /// Echo of the user's message
    UserMessage {
        /// Echoed text
        #[serde(default)]
        content: Option<String>,
    },
    /// The assistant message has been created
    StreamStart {
        /// ID of the assistant message
        message_id: MessageId,
    },
    /// A piece of response text
    StreamChunk {
        /// Text to append
        chunk: String,
    },
    /// Progress hint (e.g. "Calling tool X")
    Status {
        /// Human-readable label
        message: String,
    },
    /// The agent invoked a tool
    ToolCall {
        /// Tool name
        name: String,
        /// Tool arguments
        #[serde(default)]
        args: Value,
    },
    /// A tool returned
    ToolResult {
        /// Tool name
        name: String,
        /// Tool output
        #[serde(default)]
        result: Value,
    },
    /// The turn ended
    StreamEnd {
        /// Whether the turn succeeded
        success: bool,
        /// Error message when `success` is false
        #[serde(default)]
        error: Option<String>,
    },
}

impl PushEvent {
    /// Whether this event ends the subscription
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::StreamEnd { .. })
    }
}

/// Frame sent by the backend, tagged by `type`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Result of a command
    Result {
        /// ID of the command this answers
        id: RequestId,
        /// Whether the command succeeded
        success: bool,
        /// Command-specific result
        #[serde(default)]
        result: Option<Value>,
        /// Error message when `success` is false
        #[serde(default)]
        error: Option<String>,
    },
    /// Push event for an open subscription
    Event {
        /// Subscription the event belongs to
        subscription: SubscriptionId,
        /// The event
        event: PushEvent,
    },
}

/// Result of `send`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReply {
    /// Raw response content (prose or a structured JSON object)
    pub response: String,
}

/// Result of `create_session`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCreated {
    /// The new session's ID
    pub conversation_id: ConversationId,
    /// Title chosen by the backend, if any
    #[serde(default)]
    pub title: Option<String>,
}
