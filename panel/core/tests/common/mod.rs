//! Scripted in-memory backend for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use panel_core::backend::{AgentBackend, Subscription};
use panel_core::message::{ConversationId, MessageId, MessageStatus};
use panel_core::protocol::{
    PushEvent, SendParams, SendReply, SessionCreated, StreamOptions, SubscriptionId,
};
use panel_core::store::{ConversationStore, StoreChange};
use panel_core::transport::TransportError;

/// What the next `send_stream` does
pub enum StreamScript {
    /// Open, deliver these events, then close the channel
    Events(Vec<PushEvent>),
    /// Fail to open
    Fail(String),
}

/// Backend that replays scripted behavior and records every call
#[derive(Default)]
pub struct ScriptedBackend {
    streams: Mutex<VecDeque<StreamScript>>,
    replies: Mutex<VecDeque<Result<String, String>>>,
    session_error: Mutex<Option<String>>,
    session_title: Mutex<Option<String>>,
    rename_error: Mutex<Option<String>>,

    /// Subscriptions successfully opened
    pub streams_opened: AtomicUsize,
    /// Subscription releases (shared with release callbacks)
    pub releases: Arc<AtomicUsize>,
    /// `send` calls
    pub sends: AtomicUsize,
    /// `create_session` calls
    pub sessions_created: AtomicUsize,
    /// `rename_session` calls
    pub renames: Mutex<Vec<(ConversationId, String)>>,
    /// Parameters of the last turn
    pub last_params: Mutex<Option<SendParams>>,
    /// Options of the last `send_stream`
    pub last_options: Mutex<Option<StreamOptions>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(self, events: Vec<PushEvent>) -> Self {
        self.streams.lock().push_back(StreamScript::Events(events));
        self
    }

    pub fn with_failed_stream(self, error: &str) -> Self {
        self.streams.lock().push_back(StreamScript::Fail(error.to_string()));
        self
    }

    pub fn with_reply(self, reply: Result<&str, &str>) -> Self {
        self.replies
            .lock()
            .push_back(reply.map(str::to_string).map_err(str::to_string));
        self
    }

    pub fn with_session_error(self, error: &str) -> Self {
        *self.session_error.lock() = Some(error.to_string());
        self
    }

    pub fn with_session_title(self, title: &str) -> Self {
        *self.session_title.lock() = Some(title.to_string());
        self
    }

    pub fn with_rename_error(self, error: &str) -> Self {
        *self.rename_error.lock() = Some(error.to_string());
        self
    }

    pub fn opened(&self) -> usize {
        self.streams_opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, params: &SendParams) -> Result<SendReply, TransportError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock() = Some(params.clone());
        let reply = self.replies.lock().pop_front();
        match reply {
            Some(Ok(response)) => Ok(SendReply { response }),
            Some(Err(error)) => Err(TransportError::RequestFailed(error)),
            None => Err(TransportError::ConnectionClosed),
        }
    }

    async fn send_stream(
        &self,
        params: &SendParams,
        options: StreamOptions,
    ) -> Result<Subscription, TransportError> {
        *self.last_params.lock() = Some(params.clone());
        *self.last_options.lock() = Some(options);

        let script = self.streams.lock().pop_front();
        match script {
            Some(StreamScript::Events(events)) => {
                let n = self.streams_opened.fetch_add(1, Ordering::SeqCst) + 1;
                let (tx, rx) = mpsc::unbounded_channel();
                for event in events {
                    tx.send(event).ok();
                }
                let releases = Arc::clone(&self.releases);
                Ok(Subscription::new(
                    SubscriptionId(format!("sub-{n}")),
                    rx,
                    Box::new(move |_: &SubscriptionId| {
                        releases.fetch_add(1, Ordering::SeqCst);
                    }),
                ))
            }
            Some(StreamScript::Fail(error)) => Err(TransportError::ConnectionFailed(error)),
            None => Err(TransportError::InvalidState("no stream scripted".to_string())),
        }
    }

    async fn create_session(
        &self,
        _provider: Option<&str>,
        _model: Option<&str>,
    ) -> Result<SessionCreated, TransportError> {
        if let Some(error) = self.session_error.lock().clone() {
            return Err(TransportError::RequestFailed(error));
        }
        let n = self.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionCreated {
            conversation_id: ConversationId(format!("conv-{n}")),
            title: self.session_title.lock().clone(),
        })
    }

    async fn rename_session(
        &self,
        conversation_id: &ConversationId,
        title: &str,
    ) -> Result<(), TransportError> {
        self.renames
            .lock()
            .push((conversation_id.clone(), title.to_string()));
        match self.rename_error.lock().clone() {
            Some(error) => Err(TransportError::RequestFailed(error)),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Event helpers
// =============================================================================

pub fn start(id: &str) -> PushEvent {
    PushEvent::StreamStart {
        message_id: MessageId::from(id),
    }
}

pub fn chunk(text: &str) -> PushEvent {
    PushEvent::StreamChunk {
        chunk: text.to_string(),
    }
}

pub fn status(message: &str) -> PushEvent {
    PushEvent::Status {
        message: message.to_string(),
    }
}

pub fn end_ok() -> PushEvent {
    PushEvent::StreamEnd {
        success: true,
        error: None,
    }
}

pub fn end_err(error: &str) -> PushEvent {
    PushEvent::StreamEnd {
        success: false,
        error: Some(error.to_string()),
    }
}

/// Drain buffered store changes
pub fn drain(rx: &mut tokio::sync::broadcast::Receiver<StoreChange>) -> Vec<StoreChange> {
    let mut changes = Vec::new();
    while let Ok(change) = rx.try_recv() {
        changes.push(change);
    }
    changes
}

/// Number of messages currently streaming
pub fn streaming_count(store: &ConversationStore) -> usize {
    store
        .messages()
        .iter()
        .filter(|m| m.status == MessageStatus::Streaming)
        .count()
}
