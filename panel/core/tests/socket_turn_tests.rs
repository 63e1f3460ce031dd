//! End-to-end turns over the Unix socket transport
//!
//! A test backend listens on a socket in a temp dir, speaks the frame
//! protocol and scripts its answers; the panel side is the real
//! [`UnixSocketBackend`] driven by a [`TurnController`].

#![cfg(unix)]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use panel_core::message::{MessageId, MessageStatus};
use panel_core::protocol::{Command, CommandBody, PushEvent, RequestId, ServerFrame, SubscriptionId};
use panel_core::store::ConversationStore;
use panel_core::streaming::STREAM_CLOSED_ERROR;
use panel_core::transport::{encode, FrameDecoder, TransportConfig};
use panel_core::turn::{TurnController, UserTurn};
use panel_core::{ChatConfig, UnixSocketBackend};

/// Backend end of the socket
struct TestServer {
    stream: UnixStream,
    decoder: FrameDecoder,
}

impl TestServer {
    async fn next_command(&mut self) -> Command {
        loop {
            if let Some(command) = self.decoder.decode::<Command>().unwrap() {
                return command;
            }
            let mut buf = [0u8; 4096];
            let n = self.stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "panel closed the connection");
            self.decoder.push(&buf[..n]);
        }
    }

    async fn send(&mut self, frame: ServerFrame) {
        self.stream.write_all(&encode(&frame).unwrap()).await.unwrap();
    }

    async fn ok(&mut self, id: &RequestId, result: serde_json::Value) {
        self.send(ServerFrame::Result {
            id: id.clone(),
            success: true,
            result: Some(result),
            error: None,
        })
        .await;
    }

    async fn push(&mut self, id: &RequestId, event: PushEvent) {
        self.send(ServerFrame::Event {
            subscription: SubscriptionId::from(id),
            event,
        })
        .await;
    }
}

async fn start() -> (TempDir, Arc<UnixSocketBackend>, TestServer) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backend.sock");
    let listener = UnixListener::bind(&path).unwrap();

    let config = TransportConfig::default().with_socket_path(&path);
    let (backend, accepted) = tokio::join!(UnixSocketBackend::connect(&config), listener.accept());
    let (stream, _) = accepted.unwrap();

    (
        dir,
        Arc::new(backend.unwrap()),
        TestServer {
            stream,
            decoder: FrameDecoder::new(),
        },
    )
}

/// Session bootstrap, streamed reply and rename, in wire order
#[tokio::test]
async fn test_streaming_turn_over_socket() {
    let (_dir, backend, mut server) = start().await;

    let script = tokio::spawn(async move {
        let create = server.next_command().await;
        match &create.command {
            CommandBody::CreateSession { provider, .. } => {
                assert_eq!(provider.as_deref(), Some("openai"));
            }
            other => panic!("expected create_session, got {other:?}"),
        }
        server.ok(&create.id, json!({"conversation_id": "conv-9"})).await;

        let stream = server.next_command().await;
        match &stream.command {
            CommandBody::SendStream { request, resubscribe } => {
                assert_eq!(request.conversation_id.0, "conv-9");
                assert_eq!(request.text, "Turn on the kitchen lights");
                assert!(!resubscribe);
            }
            other => panic!("expected send_stream, got {other:?}"),
        }
        server.ok(&stream.id, json!({})).await;
        server
            .push(&stream.id, PushEvent::StreamStart { message_id: MessageId::from("a1") })
            .await;
        server
            .push(&stream.id, PushEvent::Status { message: "Calling light.turn_on".into() })
            .await;
        server
            .push(
                &stream.id,
                PushEvent::StreamChunk {
                    chunk: r#"{"request_type":"final_response","response":"Kitchen lights are on."}"#
                        .into(),
                },
            )
            .await;
        server
            .push(&stream.id, PushEvent::StreamEnd { success: true, error: None })
            .await;

        let rename = server.next_command().await;
        match &rename.command {
            CommandBody::RenameSession { conversation_id, title } => {
                assert_eq!(conversation_id.0, "conv-9");
                assert_eq!(title, "Turn on the kitchen lights");
            }
            other => panic!("expected rename_session, got {other:?}"),
        }
        server.ok(&rename.id, json!(null)).await;
        server
    });

    let controller = TurnController::new(
        Arc::clone(&backend),
        ChatConfig::default().with_provider("openai"),
    );
    let mut store = ConversationStore::new();

    let outcome = controller
        .submit(&mut store, UserTurn::new("Turn on the kitchen lights"))
        .await
        .unwrap();
    script.await.unwrap();

    assert!(outcome.is_completed());
    assert_eq!(store.len(), 2);
    assert_eq!(store.messages()[1].text, "Kitchen lights are on.");
    assert_eq!(store.messages()[1].status, MessageStatus::Completed);
    assert_eq!(store.title(), "Turn on the kitchen lights");
    assert_eq!(store.preview(), Some("Kitchen lights are on."));
    assert_eq!(backend.open_subscriptions(), 0);
}

/// The backend hangs up mid-stream
#[tokio::test]
async fn test_connection_lost_mid_stream() {
    let (_dir, backend, mut server) = start().await;

    let script = tokio::spawn(async move {
        let stream = server.next_command().await;
        server.ok(&stream.id, json!({})).await;
        server
            .push(&stream.id, PushEvent::StreamStart { message_id: MessageId::from("a1") })
            .await;
        server
            .push(&stream.id, PushEvent::StreamChunk { chunk: "Work".into() })
            .await;
        // Dropping the server closes the socket
    });

    let controller = TurnController::new(Arc::clone(&backend), ChatConfig::default());
    let mut store = ConversationStore::for_conversation("conv-1".into());

    let outcome = controller
        .submit(&mut store, UserTurn::new("hello"))
        .await
        .unwrap();
    script.await.unwrap();

    assert!(!outcome.is_completed());
    assert_eq!(store.error(), Some(STREAM_CLOSED_ERROR));
    let reply = &store.messages()[1];
    assert_eq!(reply.status, MessageStatus::Error);
    assert_eq!(reply.text, format!("Work\n\nError: {STREAM_CLOSED_ERROR}"));
    assert!(!store.is_busy());
    assert!(!backend.is_connected());
}
