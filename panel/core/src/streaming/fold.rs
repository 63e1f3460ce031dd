//! Event folding for one turn

use crate::message::{error_text, Message, MessageId, MessagePatch, MessageStatus};
use crate::protocol::PushEvent;
use crate::response::parse_response;
use crate::store::ConversationStore;

use super::TurnOutcome;

/// Fallback when a failed `stream_end` carries no message
const UNKNOWN_STREAM_ERROR: &str = "Unknown error";

/// Whether the turn continues after an event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Wait for more events
    Continue,
    /// Terminal event handled
    Done(TurnOutcome),
}

/// Accumulated state of one turn
///
/// Tracks the assistant message the turn writes into and the raw text
/// received so far. The raw buffer is what gets parsed at the end; the
/// message text is for display.
#[derive(Debug, Default)]
pub struct TurnFold {
    /// The assistant message for this turn, once known
    message_id: Option<MessageId>,
    /// Concatenated chunks
    buffer: String,
}

impl TurnFold {
    /// Fold for a streaming turn (message created on `stream_start`)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold that writes into an existing message
    #[must_use]
    pub fn for_message(message_id: MessageId) -> Self {
        Self {
            message_id: Some(message_id),
            buffer: String::new(),
        }
    }

    /// The assistant message, if one exists yet
    #[must_use]
    pub fn message_id(&self) -> Option<&MessageId> {
        self.message_id.as_ref()
    }

    /// Raw text received so far
    #[must_use]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Apply one event
    pub fn apply(&mut self, store: &mut ConversationStore, event: PushEvent) -> Flow {
        match event {
            PushEvent::StreamStart { message_id } => {
                match self.message_id.clone() {
                    None => {
                        store.append_message(Message::placeholder(message_id.clone()));
                        self.message_id = Some(message_id);
                    }
                    Some(current) if current == message_id => {
                        tracing::debug!(message_id = %message_id, "Duplicate stream_start ignored");
                    }
                    Some(current) => {
                        tracing::debug!(
                            current = %current,
                            announced = %message_id,
                            "stream_start after content; keeping current message"
                        );
                    }
                }
                Flow::Continue
            }
            PushEvent::StreamChunk { chunk } => {
                let id = self.ensure_placeholder(store);
                self.buffer.push_str(&chunk);
                store.patch_message(&id, MessagePatch::new().append_text(chunk).annotation(None));
                Flow::Continue
            }
            PushEvent::Status { message } => {
                let id = self.ensure_placeholder(store);
                store.patch_message(
                    &id,
                    MessagePatch::new().annotation(Some(format!("_{message}…_"))),
                );
                Flow::Continue
            }
            PushEvent::ToolCall { name, args } => {
                tracing::debug!(tool = %name, args = %args, "Tool call");
                Flow::Continue
            }
            PushEvent::ToolResult { name, result } => {
                tracing::debug!(tool = %name, result = %result, "Tool result");
                Flow::Continue
            }
            PushEvent::UserMessage { .. } => Flow::Continue,
            PushEvent::StreamEnd {
                success: true,
                ..
            } => {
                let content = std::mem::take(&mut self.buffer);
                Flow::Done(self.complete(store, &content))
            }
            PushEvent::StreamEnd {
                success: false,
                error,
            } => {
                let error = error.unwrap_or_else(|| UNKNOWN_STREAM_ERROR.to_string());
                Flow::Done(self.fail(store, &error))
            }
        }
    }

    /// Finish the turn with the agent's full content
    ///
    /// Parses `content`; prose and unparseable JSON are shown as-is.
    pub fn complete(&mut self, store: &mut ConversationStore, content: &str) -> TurnOutcome {
        let id = self.ensure_message(store, MessageStatus::Pending);
        let parsed = parse_response(content);
        let text = if parsed.text.is_empty() {
            content.to_string()
        } else {
            parsed.text
        };

        store.patch_message(
            &id,
            MessagePatch::new()
                .replace_text(text.clone())
                .status(MessageStatus::Completed)
                .annotation(None)
                .payloads(parsed.automation, parsed.dashboard),
        );
        tracing::debug!(message_id = %id, chars = text.chars().count(), "Turn completed");

        TurnOutcome::Completed {
            message_id: id,
            text,
        }
    }

    /// Finish the turn with an error
    ///
    /// Marks the turn's message as failed (creating one if the turn never got
    /// that far) and surfaces the error on the conversation. Partial text is
    /// kept ahead of the error.
    pub fn fail(&mut self, store: &mut ConversationStore, error: &str) -> TurnOutcome {
        let id = match self.message_id.clone() {
            Some(id) if store.message(&id).is_some() => {
                let partial = store.message(&id).map(|m| m.text.clone()).unwrap_or_default();
                let text = if partial.is_empty() {
                    error_text(error)
                } else {
                    format!("{partial}\n\n{}", error_text(error))
                };
                store.patch_message(
                    &id,
                    MessagePatch::new()
                        .replace_text(text)
                        .status(MessageStatus::Error)
                        .error(error)
                        .annotation(None),
                );
                id
            }
            _ => {
                let message = Message::failed(MessageId::new(), error);
                let id = message.id.clone();
                store.append_message(message);
                self.message_id = Some(id.clone());
                id
            }
        };

        store.set_error(Some(error.to_string()));
        tracing::warn!(message_id = %id, error = %error, "Turn failed");

        TurnOutcome::Failed {
            message_id: id,
            error: error.to_string(),
        }
    }

    /// The streaming message for this turn, created on demand
    fn ensure_placeholder(&mut self, store: &mut ConversationStore) -> MessageId {
        self.ensure_message(store, MessageStatus::Streaming)
    }

    fn ensure_message(&mut self, store: &mut ConversationStore, status: MessageStatus) -> MessageId {
        if let Some(id) = &self.message_id {
            if store.message(id).is_some() {
                return id.clone();
            }
        }

        let id = self.message_id.clone().unwrap_or_default();
        let message = match status {
            MessageStatus::Streaming => Message::placeholder(id.clone()),
            _ => Message::pending(id.clone()),
        };
        tracing::debug!(message_id = %id, "Created assistant message before stream_start");
        store.append_message(message);
        self.message_id = Some(id.clone());
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunk(text: &str) -> PushEvent {
        PushEvent::StreamChunk {
            chunk: text.to_string(),
        }
    }

    fn start(id: &str) -> PushEvent {
        PushEvent::StreamStart {
            message_id: MessageId::from(id),
        }
    }

    fn end_ok() -> PushEvent {
        PushEvent::StreamEnd {
            success: true,
            error: None,
        }
    }

    #[test]
    fn test_status_annotation_not_in_text() {
        let mut store = ConversationStore::new();
        let mut fold = TurnFold::new();

        fold.apply(&mut store, start("m1"));
        fold.apply(&mut store, chunk("Hel"));
        fold.apply(
            &mut store,
            PushEvent::Status {
                message: "Calling tool lights".into(),
            },
        );

        let msg = store.message(&MessageId::from("m1")).unwrap();
        assert_eq!(msg.text, "Hel");
        assert_eq!(msg.rendered_text(), "Hel\n\n_Calling tool lights…_");

        fold.apply(&mut store, chunk("lo"));
        let msg = store.message(&MessageId::from("m1")).unwrap();
        assert_eq!(msg.rendered_text(), "Hello");
        assert_eq!(fold.buffer(), "Hello");
    }

    #[test]
    fn test_chunk_before_start_creates_placeholder() {
        let mut store = ConversationStore::new();
        let mut fold = TurnFold::new();

        fold.apply(&mut store, chunk("early"));
        fold.apply(&mut store, start("m1"));
        fold.apply(&mut store, chunk(" text"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.messages()[0].text, "early text");
        assert!(store.message(&MessageId::from("m1")).is_none());
    }

    #[test]
    fn test_success_end_parses_buffer() {
        let mut store = ConversationStore::new();
        let mut fold = TurnFold::new();
        fold.apply(&mut store, start("m1"));
        fold.apply(&mut store, chunk(r#"{"request_type":"final_response","#));
        fold.apply(&mut store, chunk(r#""response":"Done."}"#));

        let flow = fold.apply(&mut store, end_ok());

        assert_eq!(
            flow,
            Flow::Done(TurnOutcome::Completed {
                message_id: MessageId::from("m1"),
                text: "Done.".into()
            })
        );
        let msg = store.message(&MessageId::from("m1")).unwrap();
        assert_eq!(msg.text, "Done.");
        assert_eq!(msg.status, MessageStatus::Completed);
        assert!(!msg.is_streaming);
    }

    #[test]
    fn test_failure_keeps_partial_text() {
        let mut store = ConversationStore::new();
        let mut fold = TurnFold::new();
        fold.apply(&mut store, start("m1"));
        fold.apply(&mut store, chunk("Partial"));

        fold.apply(
            &mut store,
            PushEvent::StreamEnd {
                success: false,
                error: Some("boom".into()),
            },
        );

        let msg = store.message(&MessageId::from("m1")).unwrap();
        assert_eq!(msg.text, "Partial\n\nError: boom");
        assert_eq!(msg.error.as_deref(), Some("boom"));
        assert_eq!(store.error(), Some("boom"));
    }

    #[test]
    fn test_fail_without_message_appends_synthetic() {
        let mut store = ConversationStore::new();
        let mut fold = TurnFold::new();

        let outcome = fold.fail(&mut store, "Connection closed");

        assert!(!outcome.is_completed());
        assert_eq!(store.len(), 1);
        assert_eq!(store.messages()[0].text, "Error: Connection closed");
        assert_eq!(store.messages()[0].status, MessageStatus::Error);
    }

    #[test]
    fn test_empty_success_completes_empty_message() {
        let mut store = ConversationStore::new();
        let mut fold = TurnFold::new();

        let flow = fold.apply(&mut store, end_ok());

        assert!(matches!(flow, Flow::Done(TurnOutcome::Completed { ref text, .. }) if text.is_empty()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.messages()[0].status, MessageStatus::Completed);
    }
}
