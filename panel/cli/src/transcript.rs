//! Transcript view
//!
//! Turns store changes into lines for a plain terminal. Assistant messages
//! are printed once, when they reach a terminal status; status hints are
//! printed as they arrive. Message text goes through the shared render cache
//! with a renderer that strips terminal control sequences.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use panel_core::render_cache::{RenderCache, Renderer};
use panel_core::{ConversationId, Message, MessageId, MessageRole, StoreChange, DEFAULT_TITLE};

/// Prefix of assistant output
const AGENT_PREFIX: &str = "agent> ";

/// Renderer that drops control characters so backend text cannot drive the
/// terminal (escape sequences, carriage returns, bells)
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalRenderer;

impl Renderer for TerminalRenderer {
    fn render(&self, source: &str) -> String {
        source
            .chars()
            .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
            .collect()
    }
}

/// Line-oriented view of one store
pub struct Transcript {
    /// Shared with the turn controller, which invalidates it
    cache: Arc<Mutex<RenderCache>>,
    /// Conversation the store currently belongs to
    conversation_id: Option<ConversationId>,
    /// Assistant messages already printed
    printed: HashSet<MessageId>,
    /// Last status hint printed
    last_annotation: Option<String>,
    /// Error text of the last failed message printed
    last_failure: Option<String>,
    /// Last title printed
    title: String,
}

impl Transcript {
    /// Create a view rendering through `cache`
    pub fn new(cache: Arc<Mutex<RenderCache>>) -> Self {
        Self {
            cache,
            conversation_id: None,
            printed: HashSet::new(),
            last_annotation: None,
            last_failure: None,
            title: DEFAULT_TITLE.to_string(),
        }
    }

    /// Lines to print for one change
    pub fn on_change(&mut self, change: &StoreChange) -> Vec<String> {
        match change {
            StoreChange::ConversationChanged(id) => {
                self.conversation_id = Some(id.clone());
                vec![format!("[conversation {id}]")]
            }
            StoreChange::MessageAppended(message) | StoreChange::MessageUpdated(message) => {
                self.on_message(message)
            }
            StoreChange::ErrorChanged(Some(error)) => {
                if self.last_failure.as_deref() == Some(error.as_str()) {
                    Vec::new()
                } else {
                    vec![format!("! {}", TerminalRenderer.render(error))]
                }
            }
            StoreChange::MetadataChanged { title, .. } => {
                if *title == self.title {
                    return Vec::new();
                }
                self.title.clone_from(title);
                vec![format!("[title: {}]", TerminalRenderer.render(title))]
            }
            StoreChange::Cleared { conversation_id } => {
                // Renders made while catching up may have refilled the bucket
                if let Some(id) = conversation_id.as_ref().or(self.conversation_id.as_ref()) {
                    self.cache.lock().invalidate(id);
                }
                self.conversation_id = None;
                self.printed.clear();
                self.last_annotation = None;
                self.last_failure = None;
                self.title = DEFAULT_TITLE.to_string();
                vec!["[new conversation]".to_string()]
            }
            StoreChange::ErrorChanged(None) | StoreChange::BusyChanged(_) => Vec::new(),
        }
    }

    fn on_message(&mut self, message: &Message) -> Vec<String> {
        if message.role != MessageRole::Assistant || self.printed.contains(&message.id) {
            return Vec::new();
        }

        if !message.status.is_terminal() {
            return match &message.annotation {
                Some(note) if self.last_annotation.as_ref() != Some(note) => {
                    self.last_annotation = Some(note.clone());
                    vec![format!("  {}", TerminalRenderer.render(note))]
                }
                _ => Vec::new(),
            };
        }

        self.printed.insert(message.id.clone());
        self.last_annotation = None;
        self.last_failure.clone_from(&message.error);

        let rendered = match &self.conversation_id {
            Some(id) => self.cache.lock().render(id, &message.text, &TerminalRenderer),
            None => Arc::from(TerminalRenderer.render(&message.text)),
        };
        vec![format!("{AGENT_PREFIX}{rendered}")]
    }
}
