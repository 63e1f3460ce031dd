//! Turn Controller
//!
//! Orchestrates one user submission: validation, conversation bootstrap,
//! the user entry, the assistant turn and the bookkeeping afterwards.
//!
//! # Flow
//!
//! ```text
//! submit(text, attachments)
//!   ├─ busy?                   → rejected, nothing changes
//!   ├─ empty?                  → rejected, conversation error
//!   ├─ attachment uploading?   → rejected, conversation error
//!   ├─ ensure_conversation()   → create session if needed (or reject)
//!   ├─ busy = true, error cleared, user message appended
//!   ├─ run_streaming_turn() | run_single_turn()
//!   ├─ busy = false
//!   └─ preview / derived title / backend rename
//! ```
//!
//! The controller borrows the store mutably for the whole turn, so a second
//! submission cannot interleave with a running one.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::backend::AgentBackend;
use crate::config::ChatConfig;
use crate::message::{Attachment, AttachmentStatus, ConversationId, Message};
use crate::protocol::SendParams;
use crate::render_cache::RenderCache;
use crate::store::ConversationStore;
use crate::streaming::{run_single_turn, run_streaming_turn, TurnOutcome};

/// Why a submission was not started
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnRejected {
    /// A turn is already running
    #[error("A response is already in progress")]
    Busy,

    /// Nothing to send
    #[error("Message is empty")]
    EmptyInput,

    /// An attachment has not finished uploading
    #[error("Attachment {filename} is still uploading")]
    AttachmentsNotReady {
        /// The first attachment that is not ready
        filename: String,
    },

    /// No conversation exists and none can be created
    #[error("No active conversation")]
    NoConversation,

    /// The backend refused to create a session
    #[error("Failed to create conversation: {0}")]
    SessionCreation(String),
}

impl TurnRejected {
    /// Whether the rejection is shown as the conversation error
    ///
    /// Busy submissions are dropped silently.
    #[must_use]
    pub fn is_surfaced(&self) -> bool {
        !matches!(self, Self::Busy)
    }
}

/// A user submission
#[derive(Clone, Debug, Default)]
pub struct UserTurn {
    /// Text as typed
    pub text: String,
    /// Files attached to the message
    pub attachments: Vec<Attachment>,
}

impl UserTurn {
    /// A text-only submission
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    /// Attach files
    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Orchestrates user turns against one backend
pub struct TurnController<B: AgentBackend + ?Sized> {
    /// The agent backend
    backend: Arc<B>,
    /// Provider, model, streaming and derivation settings
    settings: ChatConfig,
    /// Render cache shared with the view
    render_cache: Arc<Mutex<RenderCache>>,
}

impl<B: AgentBackend + ?Sized> TurnController<B> {
    /// Create a controller with its own render cache
    pub fn new(backend: Arc<B>, settings: ChatConfig) -> Self {
        Self {
            backend,
            settings,
            render_cache: Arc::new(Mutex::new(RenderCache::new())),
        }
    }

    /// Share a render cache with the view
    #[must_use]
    pub fn with_render_cache(mut self, render_cache: Arc<Mutex<RenderCache>>) -> Self {
        self.render_cache = render_cache;
        self
    }

    /// The render cache this controller invalidates
    #[must_use]
    pub fn render_cache(&self) -> Arc<Mutex<RenderCache>> {
        Arc::clone(&self.render_cache)
    }

    /// Current settings
    #[must_use]
    pub fn settings(&self) -> &ChatConfig {
        &self.settings
    }

    /// Submit a user turn and run it to completion
    ///
    /// # Errors
    ///
    /// Returns [`TurnRejected`] if the turn was not started. Surfaced
    /// rejections are also set as the conversation error. Once started, a
    /// turn always returns `Ok`; failures are reported through the outcome
    /// and the store.
    pub async fn submit(
        &self,
        store: &mut ConversationStore,
        turn: UserTurn,
    ) -> Result<TurnOutcome, TurnRejected> {
        if store.is_busy() {
            tracing::debug!("Submission ignored: turn in progress");
            return Err(TurnRejected::Busy);
        }
        let trimmed = turn.text.trim();
        if trimmed.is_empty() {
            return Err(surface(store, TurnRejected::EmptyInput));
        }
        if let Some(unready) = turn.attachments.iter().find(|a| !a.status.is_settled()) {
            return Err(surface(
                store,
                TurnRejected::AttachmentsNotReady {
                    filename: unready.filename.clone(),
                },
            ));
        }

        let conversation_id = self.ensure_conversation(store).await?;
        let title_source = trimmed.to_string();

        store.set_busy(true);
        store.set_error(None);

        let (ready, failed): (Vec<_>, Vec<_>) = turn
            .attachments
            .into_iter()
            .partition(|a| a.status == AttachmentStatus::Ready);
        if !failed.is_empty() {
            tracing::debug!(dropped = failed.len(), "Failed attachments left out of the turn");
        }

        let params = SendParams {
            conversation_id: conversation_id.clone(),
            text: turn.text.clone(),
            provider: self.settings.default_provider.clone(),
            model: self.settings.default_model.clone(),
            attachments: ready.iter().map(Attachment::to_payload).collect(),
            debug: self.settings.debug,
        };
        store.append_message(Message::user(turn.text, ready));

        tracing::info!(
            conversation_id = %conversation_id,
            streaming = self.settings.streaming,
            attachments = params.attachments.len(),
            "Turn started"
        );

        let outcome = if self.settings.streaming {
            run_streaming_turn(self.backend.as_ref(), store, &params).await
        } else {
            run_single_turn(self.backend.as_ref(), store, &params).await
        };

        store.set_busy(false);
        self.finalize(store, &conversation_id, &title_source, &outcome).await;

        Ok(outcome)
    }

    /// Return the active conversation, creating a session if there is none
    ///
    /// # Errors
    ///
    /// `NoConversation` if no default provider is configured,
    /// `SessionCreation` if the backend refuses. Both are surfaced.
    pub async fn ensure_conversation(
        &self,
        store: &mut ConversationStore,
    ) -> Result<ConversationId, TurnRejected> {
        if let Some(id) = store.conversation_id() {
            return Ok(id.clone());
        }

        let Some(provider) = self.settings.default_provider.as_deref() else {
            return Err(surface(store, TurnRejected::NoConversation));
        };

        match self
            .backend
            .create_session(Some(provider), self.settings.default_model.as_deref())
            .await
        {
            Ok(created) => {
                tracing::info!(
                    conversation_id = %created.conversation_id,
                    provider,
                    "Conversation created"
                );
                let id = created.conversation_id.clone();
                store.set_conversation(created.conversation_id, created.title);
                Ok(id)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create conversation");
                Err(surface(store, TurnRejected::SessionCreation(e.to_string())))
            }
        }
    }

    /// Start over with an empty conversation
    ///
    /// Drops the store's contents and the previous conversation's render
    /// cache entries. Returns the conversation that was dropped.
    ///
    /// # Errors
    ///
    /// `Busy` while a turn is running.
    pub fn new_conversation(
        &self,
        store: &mut ConversationStore,
    ) -> Result<Option<ConversationId>, TurnRejected> {
        if store.is_busy() {
            return Err(TurnRejected::Busy);
        }
        let previous = store.clear();
        if let Some(ref id) = previous {
            self.render_cache.lock().invalidate(id);
            tracing::info!(conversation_id = %id, "Conversation closed");
        }
        Ok(previous)
    }

    /// Preview and title bookkeeping after the terminal event
    async fn finalize(
        &self,
        store: &mut ConversationStore,
        conversation_id: &ConversationId,
        user_text: &str,
        outcome: &TurnOutcome,
    ) {
        if let TurnOutcome::Completed { text, .. } = outcome {
            let preview = truncate_chars(text.trim(), self.settings.preview_max_chars);
            store.set_preview((!preview.is_empty()).then_some(preview));
        }

        if !store.has_default_title() {
            return;
        }
        let title = derive_title(user_text, self.settings.title_max_chars);
        if title.is_empty() {
            return;
        }
        store.set_title(title.clone());
        if let Err(e) = self.backend.rename_session(conversation_id, &title).await {
            tracing::warn!(conversation_id = %conversation_id, error = %e, "Failed to rename conversation");
        }
    }
}

/// Record a surfaced rejection on the store
fn surface(store: &mut ConversationStore, rejection: TurnRejected) -> TurnRejected {
    if rejection.is_surfaced() {
        store.set_error(Some(rejection.to_string()));
    }
    rejection
}

/// First `max_chars` characters of `text`
fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Title for a conversation, from its first user message
///
/// Whitespace runs collapse to single spaces; the result is cut at
/// `max_chars` characters with `…` appended when something was cut.
#[must_use]
pub fn derive_title(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut title: String = collapsed.chars().take(max_chars).collect();
    title.truncate(title.trim_end().len());
    title.push('…');
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_short_title_unchanged() {
        assert_eq!(derive_title("Turn on the lights", 40), "Turn on the lights");
    }

    #[test]
    fn test_long_title_truncated_with_ellipsis() {
        let text = "Please create an automation that turns off every light at midnight";
        let title = derive_title(text, 40);
        assert_eq!(title, "Please create an automation that turns o…");
        assert_eq!(title.chars().count(), 41);
    }

    #[test]
    fn test_cut_at_space_drops_trailing_space() {
        assert_eq!(derive_title("abcd efgh", 5), "abcd…");
    }

    #[test]
    fn test_title_is_char_boundary_safe() {
        let text = "ñ".repeat(50);
        let title = derive_title(&text, 40);
        assert_eq!(title.chars().count(), 41);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn test_title_collapses_whitespace() {
        assert_eq!(derive_title("  hello \n\n world  ", 40), "hello world");
    }

    #[test]
    fn test_quiet_rejections() {
        assert!(!TurnRejected::Busy.is_surfaced());
        assert!(TurnRejected::EmptyInput.is_surfaced());
        assert!(TurnRejected::NoConversation.is_surfaced());
        assert_eq!(TurnRejected::NoConversation.to_string(), "No active conversation");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 100), "hi");
    }
}
