//! Conversation Store
//!
//! Canonical, observable state of the active conversation: the ordered
//! message log plus the busy flag, the surfaced error and summary metadata.
//!
//! # Design Philosophy
//!
//! The store holds no policy. It appends, patches and flips flags; deciding
//! *when* to do so belongs to the turn controller and the streaming client.
//! Both reach the store through `&mut`, so a running turn owns it for its
//! whole duration and no locking is involved.
//!
//! Observers call [`ConversationStore::subscribe`] and receive
//! [`StoreChange`] values. Message changes carry a snapshot of the message so
//! a view can render without borrowing the store while a turn is running.

use std::collections::HashMap;

use tokio::sync::broadcast;

use crate::message::{ConversationId, Message, MessageId, MessagePatch, MessageStatus};

/// Title every conversation starts with until one is chosen
pub const DEFAULT_TITLE: &str = "New Conversation";

/// Change notifications buffered per observer before it starts lagging
const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// A change to the store, as seen by observers
#[derive(Clone, Debug, PartialEq)]
pub enum StoreChange {
    /// A message was appended
    MessageAppended(Message),
    /// A message was patched (snapshot after the patch)
    MessageUpdated(Message),
    /// Busy flag changed
    BusyChanged(bool),
    /// Surfaced error changed
    ErrorChanged(Option<String>),
    /// The store now belongs to a (new) conversation
    ConversationChanged(ConversationId),
    /// Title or preview changed
    MetadataChanged {
        /// Current title
        title: String,
        /// Current preview
        preview: Option<String>,
    },
    /// Everything was dropped
    Cleared {
        /// Conversation the store held before clearing
        conversation_id: Option<ConversationId>,
    },
}

/// State of the active conversation
#[derive(Debug)]
pub struct ConversationStore {
    /// Backend session this store mirrors (None until created)
    conversation_id: Option<ConversationId>,
    /// Display title
    title: String,
    /// Short preview of the latest reply
    preview: Option<String>,
    /// Messages in display order
    messages: Vec<Message>,
    /// Position of each message in `messages`
    index: HashMap<MessageId, usize>,
    /// A turn is in flight
    busy: bool,
    /// Conversation-level error banner
    error: Option<String>,
    /// Change fan-out
    changes: broadcast::Sender<StoreChange>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    /// Create an empty store with no conversation
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            conversation_id: None,
            title: DEFAULT_TITLE.to_string(),
            preview: None,
            messages: Vec::new(),
            index: HashMap::new(),
            busy: false,
            error: None,
            changes,
        }
    }

    /// Create a store already bound to a conversation
    #[must_use]
    pub fn for_conversation(conversation_id: ConversationId) -> Self {
        let mut store = Self::new();
        store.conversation_id = Some(conversation_id);
        store
    }

    /// Receive future changes
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Notify observers; snapshots are only built when someone listens
    fn notify(&self, change: impl FnOnce() -> StoreChange) {
        if self.changes.receiver_count() > 0 {
            // A send error only means every receiver went away meanwhile
            let _ = self.changes.send(change());
        }
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Append a message at the end
    ///
    /// Returns `false` (and changes nothing) if a message with the same ID
    /// already exists, so an event observed twice cannot corrupt the order.
    pub fn append_message(&mut self, message: Message) -> bool {
        if self.index.contains_key(&message.id) {
            tracing::debug!(message_id = %message.id, "Duplicate message ignored");
            return false;
        }
        if message.status == MessageStatus::Streaming {
            self.warn_if_streaming(&message.id);
        }

        self.index.insert(message.id.clone(), self.messages.len());
        self.messages.push(message);
        self.notify(|| StoreChange::MessageAppended(self.messages[self.messages.len() - 1].clone()));
        true
    }

    /// Merge a partial update into a message
    ///
    /// Returns `false` if no message has that ID, e.g. a late event arriving
    /// after the conversation was switched.
    pub fn patch_message(&mut self, id: &MessageId, patch: MessagePatch) -> bool {
        let Some(&pos) = self.index.get(id) else {
            tracing::debug!(message_id = %id, "Patch for unknown message ignored");
            return false;
        };
        if patch.status == Some(MessageStatus::Streaming)
            && self.messages[pos].status != MessageStatus::Streaming
        {
            self.warn_if_streaming(id);
        }

        self.messages[pos].apply(patch);
        self.notify(|| StoreChange::MessageUpdated(self.messages[pos].clone()));
        true
    }

    fn warn_if_streaming(&self, incoming: &MessageId) {
        if let Some(current) = self.streaming_message() {
            tracing::warn!(
                current = %current.id,
                incoming = %incoming,
                "Second streaming message in one conversation"
            );
        }
    }

    /// All messages in display order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get a message by ID
    #[must_use]
    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.index.get(id).map(|&pos| &self.messages[pos])
    }

    /// The message currently streaming, if any
    #[must_use]
    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.status == MessageStatus::Streaming)
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether there are no messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    // ========================================================================
    // Flags
    // ========================================================================

    /// Set the busy flag. Setting the current value is a no-op.
    pub fn set_busy(&mut self, busy: bool) {
        if self.busy != busy {
            self.busy = busy;
            self.notify(|| StoreChange::BusyChanged(busy));
        }
    }

    /// Whether a turn is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Set or clear the conversation-level error
    pub fn set_error(&mut self, error: Option<String>) {
        if self.error != error {
            self.error = error;
            self.notify(|| StoreChange::ErrorChanged(self.error.clone()));
        }
    }

    /// The surfaced error, if any
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    // ========================================================================
    // Conversation & metadata
    // ========================================================================

    /// Bind the store to a conversation
    ///
    /// `title` is the backend's title for it; `None` keeps the placeholder.
    pub fn set_conversation(&mut self, conversation_id: ConversationId, title: Option<String>) {
        self.conversation_id = Some(conversation_id.clone());
        self.notify(|| StoreChange::ConversationChanged(conversation_id));
        if let Some(title) = title {
            self.set_title(title);
        }
    }

    /// The conversation this store mirrors
    #[must_use]
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    /// Current title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Whether the title is still the placeholder
    #[must_use]
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    /// Set the title
    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if self.title != title {
            self.title = title;
            self.notify_metadata();
        }
    }

    /// Current preview
    #[must_use]
    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    /// Set the preview
    pub fn set_preview(&mut self, preview: Option<String>) {
        if self.preview != preview {
            self.preview = preview;
            self.notify_metadata();
        }
    }

    fn notify_metadata(&self) {
        self.notify(|| StoreChange::MetadataChanged {
            title: self.title.clone(),
            preview: self.preview.clone(),
        });
    }

    /// Drop all messages, flags and metadata
    ///
    /// Returns the conversation the store held, so callers can invalidate
    /// anything keyed by it.
    pub fn clear(&mut self) -> Option<ConversationId> {
        let previous = self.conversation_id.take();
        self.messages.clear();
        self.index.clear();
        self.busy = false;
        self.error = None;
        self.title = DEFAULT_TITLE.to_string();
        self.preview = None;
        self.notify(|| StoreChange::Cleared {
            conversation_id: previous.clone(),
        });
        previous
    }
}
