//! Conversation Messages
//!
//! The message model shared by the conversation store, the streaming client
//! and the turn controller.
//!
//! # Lifecycle
//!
//! ```text
//! streaming turn:      Pending ──► Streaming ──► Completed
//!                                       └──────► Error
//! non-streaming turn:  Pending ──► Completed | Error
//! user message:        Completed (never streamed)
//! ```
//!
//! A message is identified by its [`MessageId`] for its whole life; the id is
//! the only key used to patch it. While a message is streaming its text is
//! only ever appended to. Ephemeral progress hints (tool calls, "thinking")
//! live in [`Message::annotation`] and are never folded into the text.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::protocol::AttachmentPayload;

/// Prefix that marks a failed turn's text apart from normal assistant output
pub const ERROR_PREFIX: &str = "Error: ";

/// Message identifier
///
/// Assigned by the backend (`stream_start`) or generated client-side for
/// user messages and synthetic error turns.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique client-side message ID
    #[must_use]
    pub fn new() -> Self {
        Self(format!("msg_{}", Uuid::new_v4().simple()))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Conversation (backend session) identifier
///
/// Opaque to the panel: the backend assigns it when a session is created.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// Agent response
    Assistant,
}

/// Lifecycle status of a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Created, nothing received yet
    Pending,
    /// Receiving chunks
    Streaming,
    /// Final text received
    Completed,
    /// Turn failed
    Error,
}

impl MessageStatus {
    /// Whether the message can no longer change
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Upload status of an attachment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentStatus {
    /// Queued for upload
    Pending,
    /// Upload in progress
    Uploading,
    /// Uploaded and processed
    Ready,
    /// Upload or processing failed
    Error,
}

impl AttachmentStatus {
    /// Whether the upload has reached a terminal state (`ready` or `error`)
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }
}

/// A file attached to a message
///
/// Produced by the upload collaborator. Only `ready` attachments are sent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Server- or client-assigned file ID
    pub id: String,
    /// Original file name
    pub filename: String,
    /// MIME type (e.g. `image/png`)
    pub mime_type: String,
    /// Size in bytes
    pub size: u64,
    /// Upload status
    pub status: AttachmentStatus,
    /// Optional inline preview (e.g. a data URL for images)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// Raw file content
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Attachment {
    /// Create a `ready` attachment from in-memory content
    pub fn ready(
        id: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            mime_type: mime_type.into(),
            size: data.len() as u64,
            status: AttachmentStatus::Ready,
            preview: None,
            data,
        }
    }

    /// Set the upload status
    #[must_use]
    pub fn with_status(mut self, status: AttachmentStatus) -> Self {
        self.status = status;
        self
    }

    /// Build the wire payload (base64 content)
    #[must_use]
    pub fn to_payload(&self) -> AttachmentPayload {
        AttachmentPayload {
            filename: self.filename.clone(),
            mime_type: self.mime_type.clone(),
            content: BASE64.encode(&self.data),
            size: self.size,
        }
    }
}

/// A message in the conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID (sole patch key)
    pub id: MessageId,
    /// Who sent this message
    pub role: MessageRole,
    /// Message text
    pub text: String,
    /// Lifecycle status
    pub status: MessageStatus,
    /// Mirrors `status == Streaming` for renderers
    pub is_streaming: bool,
    /// Suggested automation, opaque to the panel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation: Option<Value>,
    /// Suggested dashboard, opaque to the panel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<Value>,
    /// Error text for failed turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Attached files, in the order the user added them
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Display timestamp
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Ephemeral status hint shown after the text while streaming
    #[serde(skip)]
    pub annotation: Option<String>,
}

impl Message {
    fn base(id: MessageId, role: MessageRole, status: MessageStatus) -> Self {
        Self {
            id,
            role,
            text: String::new(),
            status,
            is_streaming: status == MessageStatus::Streaming,
            automation: None,
            dashboard: None,
            error: None,
            attachments: Vec::new(),
            timestamp: Some(Utc::now()),
            annotation: None,
        }
    }

    /// A user message. User messages are never streamed.
    pub fn user(text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            text: text.into(),
            attachments,
            ..Self::base(MessageId::new(), MessageRole::User, MessageStatus::Completed)
        }
    }

    /// An empty assistant message that will receive streamed chunks
    #[must_use]
    pub fn placeholder(id: MessageId) -> Self {
        Self::base(id, MessageRole::Assistant, MessageStatus::Streaming)
    }

    /// An assistant message waiting on a non-streaming reply
    #[must_use]
    pub fn pending(id: MessageId) -> Self {
        Self::base(id, MessageRole::Assistant, MessageStatus::Pending)
    }

    /// A synthetic assistant message for a turn that failed before (or
    /// without) producing a placeholder
    pub fn failed(id: MessageId, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            text: error_text(&error),
            error: Some(error),
            ..Self::base(id, MessageRole::Assistant, MessageStatus::Error)
        }
    }

    /// Text as it should be displayed: the text plus any status annotation
    #[must_use]
    pub fn rendered_text(&self) -> String {
        match &self.annotation {
            Some(note) if self.text.is_empty() => note.clone(),
            Some(note) => format!("{}\n\n{note}", self.text),
            None => self.text.clone(),
        }
    }

    /// Merge a partial update into this message
    pub fn apply(&mut self, patch: MessagePatch) {
        match patch.text {
            Some(TextEdit::Append(chunk)) => self.text.push_str(&chunk),
            Some(TextEdit::Replace(text)) => self.text = text,
            None => {}
        }
        if let Some(status) = patch.status {
            self.status = status;
            self.is_streaming = status == MessageStatus::Streaming;
        }
        if patch.automation.is_some() {
            self.automation = patch.automation;
        }
        if patch.dashboard.is_some() {
            self.dashboard = patch.dashboard;
        }
        if patch.error.is_some() {
            self.error = patch.error;
        }
        if let Some(annotation) = patch.annotation {
            self.annotation = annotation;
        }
    }
}

/// Text for a failed turn, prefixed so it reads apart from normal output
#[must_use]
pub fn error_text(error: &str) -> String {
    format!("{ERROR_PREFIX}{error}")
}

/// How a patch changes a message's text
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextEdit {
    /// Append to the existing text
    Append(String),
    /// Replace the text entirely (terminal transitions only)
    Replace(String),
}

/// Partial update for [`ConversationStore::patch_message`](crate::store::ConversationStore::patch_message)
///
/// Unset fields leave the message untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessagePatch {
    /// Text change
    pub text: Option<TextEdit>,
    /// New status (also updates `is_streaming`)
    pub status: Option<MessageStatus>,
    /// Structured automation payload
    pub automation: Option<Value>,
    /// Structured dashboard payload
    pub dashboard: Option<Value>,
    /// Error text
    pub error: Option<String>,
    /// `Some(None)` clears the annotation, `Some(Some(_))` replaces it
    pub annotation: Option<Option<String>>,
}

impl MessagePatch {
    /// An empty patch
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of text
    #[must_use]
    pub fn append_text(mut self, chunk: impl Into<String>) -> Self {
        self.text = Some(TextEdit::Append(chunk.into()));
        self
    }

    /// Replace the text
    #[must_use]
    pub fn replace_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(TextEdit::Replace(text.into()));
        self
    }

    /// Set the status
    #[must_use]
    pub fn status(mut self, status: MessageStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the error text
    #[must_use]
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Replace or clear the status annotation
    #[must_use]
    pub fn annotation(mut self, annotation: Option<String>) -> Self {
        self.annotation = Some(annotation);
        self
    }

    /// Attach structured payloads
    #[must_use]
    pub fn payloads(mut self, automation: Option<Value>, dashboard: Option<Value>) -> Self {
        self.automation = automation;
        self.dashboard = dashboard;
        self
    }
}
