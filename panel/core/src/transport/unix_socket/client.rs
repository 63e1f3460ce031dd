//! Unix Socket Backend Client
//!
//! Connects to the agent backend and multiplexes requests and push
//! subscriptions over one stream.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::backend::{AgentBackend, Subscription};
use crate::message::ConversationId;
use crate::protocol::{
    Command, CommandBody, PushEvent, RequestId, SendParams, SendReply, ServerFrame,
    SessionCreated, StreamOptions, SubscriptionId,
};
use crate::transport::config::TransportConfig;
use crate::transport::frame::{encode, FrameDecoder};
use crate::transport::TransportError;

/// Commands queued for the writer task
const OUTBOUND_BUFFER: usize = 64;

/// Read buffer size
const READ_CHUNK: usize = 4096;

/// Result frame as handed to the waiting request
#[derive(Debug)]
struct Reply {
    success: bool,
    result: Option<Value>,
    error: Option<String>,
}

/// State shared between the backend handle and its tasks
#[derive(Default)]
struct Shared {
    /// Requests waiting for their result frame
    pending: Mutex<HashMap<RequestId, oneshot::Sender<Reply>>>,
    /// Open push subscriptions
    subscriptions: Mutex<HashMap<SubscriptionId, mpsc::UnboundedSender<PushEvent>>>,
    /// Whether the connection is up
    connected: AtomicBool,
}

impl Shared {
    /// Fail everything in flight after the connection went away
    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let pending = std::mem::take(&mut *self.pending.lock());
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        if !pending.is_empty() || !subscriptions.is_empty() {
            tracing::warn!(
                pending = pending.len(),
                subscriptions = subscriptions.len(),
                "Connection lost with work in flight"
            );
        }
    }

    fn route(&self, frame: ServerFrame) {
        match frame {
            ServerFrame::Result {
                id,
                success,
                result,
                error,
            } => {
                let waiter = self.pending.lock().remove(&id);
                match waiter {
                    Some(tx) => {
                        // The requester may have timed out meanwhile
                        let _ = tx.send(Reply {
                            success,
                            result,
                            error,
                        });
                    }
                    None => tracing::debug!(request_id = %id, "Result for unknown request dropped"),
                }
            }
            ServerFrame::Event {
                subscription,
                event,
            } => {
                let terminal = event.is_terminal();
                let mut subscriptions = self.subscriptions.lock();
                let delivered = subscriptions
                    .get(&subscription)
                    .is_some_and(|tx| tx.send(event).is_ok());
                if !delivered {
                    tracing::debug!(subscription = %subscription, "Event for released subscription dropped");
                }
                if terminal || !delivered {
                    subscriptions.remove(&subscription);
                }
            }
        }
    }
}

/// Agent backend reached over a Unix domain socket
pub struct UnixSocketBackend {
    /// Path of the backend's socket
    socket_path: PathBuf,
    /// Queue to the writer task
    outbound: mpsc::Sender<Command>,
    /// State shared with the reader task and release callbacks
    shared: Arc<Shared>,
    /// How long to wait for result frames
    request_timeout: Option<Duration>,
    /// Reader task, stopped when the backend is dropped
    reader: JoinHandle<()>,
}

impl UnixSocketBackend {
    /// Connect to the backend's socket
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionFailed` if the socket cannot be
    /// reached within the connect timeout.
    pub async fn connect(config: &TransportConfig) -> Result<Self, TransportError> {
        let socket_path = config.resolved_socket_path();

        let stream = tokio::time::timeout(config.connect_timeout(), UnixStream::connect(&socket_path))
            .await
            .map_err(|_| {
                TransportError::ConnectionFailed(format!(
                    "Timed out connecting to {}",
                    socket_path.display()
                ))
            })?
            .map_err(|e| {
                TransportError::ConnectionFailed(format!(
                    "Failed to connect to {}: {e}",
                    socket_path.display()
                ))
            })?;

        let (read_half, write_half) = stream.into_split();
        let (outbound, outbound_rx) = mpsc::channel::<Command>(OUTBOUND_BUFFER);

        let shared = Arc::new(Shared::default());
        shared.connected.store(true, Ordering::SeqCst);

        let reader = tokio::spawn(read_loop(read_half, Arc::clone(&shared)));
        tokio::spawn(write_loop(write_half, outbound_rx, Arc::clone(&shared)));

        tracing::info!(path = %socket_path.display(), "Connected to agent backend");

        Ok(Self {
            socket_path,
            outbound,
            shared,
            request_timeout: config.request_timeout(),
            reader,
        })
    }

    /// Get the socket path
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Whether the connection is up
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Number of open push subscriptions
    #[must_use]
    pub fn open_subscriptions(&self) -> usize {
        self.shared.subscriptions.lock().len()
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TransportError::InvalidState("Not connected".to_string()))
        }
    }

    /// Write a command and wait for its result
    async fn request(&self, command: Command) -> Result<Option<Value>, TransportError> {
        self.ensure_connected()?;

        let id = command.id.clone();
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(id.clone(), tx);

        if self.outbound.send(command).await.is_err() {
            self.shared.pending.lock().remove(&id);
            return Err(TransportError::SendFailed("Writer stopped".to_string()));
        }

        let reply = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.shared.pending.lock().remove(&id);
                    tracing::warn!(request_id = %id, timeout = ?limit, "Request timed out");
                    return Err(TransportError::Timeout(limit));
                }
            },
            None => rx.await,
        };
        let reply = reply.map_err(|_| TransportError::ConnectionClosed)?;

        if reply.success {
            Ok(reply.result)
        } else {
            Err(TransportError::RequestFailed(
                reply.error.unwrap_or_else(|| "Request failed".to_string()),
            ))
        }
    }

    /// Write a command and decode its result
    async fn request_as<T: DeserializeOwned>(&self, body: CommandBody) -> Result<T, TransportError> {
        let result = self
            .request(Command::new(body))
            .await?
            .ok_or_else(|| TransportError::UnexpectedReply("missing result".to_string()))?;
        serde_json::from_value(result).map_err(|e| TransportError::UnexpectedReply(e.to_string()))
    }
}

impl Drop for UnixSocketBackend {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl AgentBackend for UnixSocketBackend {
    fn name(&self) -> &str {
        "unix-socket"
    }

    async fn send(&self, params: &SendParams) -> Result<SendReply, TransportError> {
        self.request_as(CommandBody::Send {
            request: params.clone(),
        })
        .await
    }

    async fn send_stream(
        &self,
        params: &SendParams,
        options: StreamOptions,
    ) -> Result<Subscription, TransportError> {
        if options.resubscribe {
            tracing::debug!("Resubscription requested; this transport never replays subscriptions");
        }

        let command = Command::new(CommandBody::SendStream {
            request: params.clone(),
            resubscribe: options.resubscribe,
        });
        let subscription_id = SubscriptionId::from(&command.id);

        // Registered before the command is written so no event can race it
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.shared
            .subscriptions
            .lock()
            .insert(subscription_id.clone(), events_tx);

        if let Err(e) = self.request(command).await {
            self.shared.subscriptions.lock().remove(&subscription_id);
            return Err(e);
        }

        tracing::debug!(subscription = %subscription_id, "Subscription opened");

        let shared = Arc::clone(&self.shared);
        let outbound = self.outbound.clone();
        let release = Box::new(move |id: &SubscriptionId| {
            let still_open = shared.subscriptions.lock().remove(id).is_some();
            if still_open && shared.connected.load(Ordering::SeqCst) {
                let unsubscribe = Command::new(CommandBody::Unsubscribe {
                    subscription: id.clone(),
                });
                if outbound.try_send(unsubscribe).is_err() {
                    tracing::warn!(subscription = %id, "Could not queue unsubscribe");
                }
            }
        });

        Ok(Subscription::new(subscription_id, events_rx, release))
    }

    async fn create_session(
        &self,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> Result<SessionCreated, TransportError> {
        self.request_as(CommandBody::CreateSession {
            provider: provider.map(str::to_string),
            model: model.map(str::to_string),
        })
        .await
    }

    async fn rename_session(
        &self,
        conversation_id: &ConversationId,
        title: &str,
    ) -> Result<(), TransportError> {
        self.request(Command::new(CommandBody::RenameSession {
            conversation_id: conversation_id.clone(),
            title: title.to_string(),
        }))
        .await
        .map(|_| ())
    }
}

/// Reader task: stream → routed results and events
async fn read_loop(mut read_half: OwnedReadHalf, shared: Arc<Shared>) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; READ_CHUNK];

    'read: loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("Connection closed by backend");
                break;
            }
            Ok(n) => {
                decoder.push(&buf[..n]);
                loop {
                    match decoder.decode::<ServerFrame>() {
                        Ok(Some(frame)) => shared.route(frame),
                        Ok(None) => break,
                        Err(e) if e.is_fatal_frame_error() => {
                            tracing::warn!(error = %e, "Frame stream corrupted");
                            break 'read;
                        }
                        Err(e) => tracing::warn!(error = %e, "Skipping undecodable frame"),
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Read error");
                break;
            }
        }
    }

    shared.disconnect();
    tracing::info!("Disconnected from agent backend");
}

/// Writer task: queued commands → stream
async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Command>,
    shared: Arc<Shared>,
) {
    while let Some(command) = outbound.recv().await {
        match encode(&command) {
            Ok(data) => {
                if let Err(e) = write_half.write_all(&data).await {
                    tracing::warn!(error = %e, "Write error");
                    shared.disconnect();
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(request_id = %command.id, error = %e, "Encode error");
                if let Some(tx) = shared.pending.lock().remove(&command.id) {
                    let _ = tx.send(Reply {
                        success: false,
                        result: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
    }
}
