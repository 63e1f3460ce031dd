//! Panel Core - Headless Streaming Chat Front-End for agent-panel
//!
//! This crate holds everything a chat panel needs between the user's input
//! box and a remote agent backend, independent of any UI framework: the
//! conversation state, the turn state machine, the streaming protocol client
//! and a render cache. A terminal front-end, a GUI or a test harness drive it
//! the same way.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          UI Surface                               │
//! │     input ──► TurnController::submit()      view ◄── StoreChange  │
//! │                        │                      │  RenderCache      │
//! └────────────────────────┼──────────────────────┼───────────────────┘
//!                          │                      │
//! ┌────────────────────────┼──────────────────────┼───────────────────┐
//! │                    PANEL CORE                 │                   │
//! │  ┌─────────────────────▼─────┐   ┌────────────┴───────────────┐  │
//! │  │      TurnController       │──►│     ConversationStore      │  │
//! │  │  validate · bootstrap ·   │   │  messages · busy · error · │  │
//! │  │  finalize                 │   │  title · preview           │  │
//! │  └─────────────┬─────────────┘   └────────────▲───────────────┘  │
//! │                │                              │ append / patch    │
//! │  ┌─────────────▼──────────────────────────────┴───────────────┐  │
//! │  │          Streaming Protocol Client (TurnFold)               │  │
//! │  └─────────────┬───────────────────────────────────────────────┘  │
//! │                │ AgentBackend                                     │
//! │  ┌─────────────▼───────────────────────────────────────────────┐  │
//! │  │   UnixSocketBackend ── frames (len · crc32 · json) ──►      │  │
//! │  └─────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`TurnController`]: Runs user submissions end to end
//! - [`ConversationStore`]: Observable state of the active conversation
//! - [`AgentBackend`]: What the panel needs from a backend
//! - [`UnixSocketBackend`]: Backend reached over a Unix socket
//! - [`RenderCache`]: Per-conversation memo of rendered text
//! - [`PanelConfig`]: File, environment and CLI configuration
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use panel_core::{load_config, ConversationStore, TurnController, UnixSocketBackend, UserTurn};
//!
//! let config = load_config()?;
//! let backend = Arc::new(UnixSocketBackend::connect(&config.transport).await?);
//! let controller = TurnController::new(backend, config.chat.clone());
//!
//! let mut store = ConversationStore::new();
//! let mut changes = store.subscribe();
//! controller.submit(&mut store, UserTurn::new("Turn on the lights")).await?;
//! ```
//!
//! # Module Overview
//!
//! - [`message`]: Messages, attachments and patches
//! - [`store`]: Conversation store and change notifications
//! - [`protocol`]: Wire types exchanged with the backend
//! - [`response`]: Structured reply parsing
//! - [`backend`]: Backend trait and subscription handle
//! - [`streaming`]: Folding push events into the store
//! - [`turn`]: Turn controller
//! - [`render_cache`]: Per-conversation render memo
//! - [`transport`]: Frame codec and Unix socket backend
//! - [`config`]: Configuration loading

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod backend;
pub mod config;
pub mod message;
pub mod protocol;
pub mod render_cache;
pub mod response;
pub mod store;
pub mod streaming;
pub mod transport;
pub mod turn;

// Re-exports for convenience
pub use backend::{AgentBackend, Subscription};
pub use config::{
    load_config, load_config_from_path, ChatConfig, ConfigError, ConfigOverrides, ConfigSource,
    PanelConfig,
};
pub use message::{
    Attachment, AttachmentStatus, ConversationId, Message, MessageId, MessagePatch, MessageRole,
    MessageStatus,
};
pub use protocol::{PushEvent, SendParams, SendReply, SessionCreated, StreamOptions};
pub use render_cache::{EscapingRenderer, RenderCache, Renderer};
pub use response::{parse_response, ParsedResponse};
pub use store::{ConversationStore, StoreChange, DEFAULT_TITLE};
pub use streaming::{run_single_turn, run_streaming_turn, TurnOutcome};
pub use transport::TransportError;
#[cfg(unix)]
pub use transport::UnixSocketBackend;
pub use turn::{TurnController, TurnRejected, UserTurn};
