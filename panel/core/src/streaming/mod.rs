//! Streaming Protocol Client
//!
//! Runs one assistant turn against the backend and folds what comes back into
//! [`ConversationStore`](crate::store::ConversationStore) mutations.
//!
//! # Architecture
//!
//! ```text
//!   run_streaming_turn()                          ConversationStore
//!          │                                             ▲
//!          │ send_stream(params, once)                   │ append / patch
//!          ▼                                             │ set_error
//!   ┌──────────────┐  PushEvent   ┌──────────────┐       │
//!   │ Subscription ├─────────────►│   TurnFold   ├───────┘
//!   └──────┬───────┘  in order    └──────┬───────┘
//!          │                             │ Done(TurnOutcome)
//!          └──── release() ◄─────────────┘
//! ```
//!
//! # Termination
//!
//! A turn ends on exactly one of:
//! - `stream_end` (success or failure)
//! - the subscription channel closing without `stream_end`
//! - failure to open the subscription
//!
//! Whichever happens, the subscription is released once and no message is
//! left `streaming`.

mod client;
mod fold;

pub use client::{run_single_turn, run_streaming_turn};
pub use fold::{Flow, TurnFold};

use crate::message::MessageId;

/// Error reported when the event channel closes before `stream_end`
pub const STREAM_CLOSED_ERROR: &str = "Stream closed before completion";

/// How a turn ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The assistant message completed
    Completed {
        /// The assistant message
        message_id: MessageId,
        /// Its final text
        text: String,
    },
    /// The turn failed
    Failed {
        /// The message carrying the error
        message_id: MessageId,
        /// Error text (without prefix)
        error: String,
    },
}

impl TurnOutcome {
    /// The assistant message this turn produced
    #[must_use]
    pub fn message_id(&self) -> &MessageId {
        match self {
            Self::Completed { message_id, .. } | Self::Failed { message_id, .. } => message_id,
        }
    }

    /// Whether the turn completed
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
