//! Unix Socket Transport
//!
//! Default transport to a local agent backend over a Unix domain socket.
//!
//! # Socket Location
//!
//! Default: `$XDG_RUNTIME_DIR/agent-panel/backend.sock`
//! Fallback: `/tmp/agent-panel-$UID/backend.sock`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐                 ┌──────────────┐
//! │      UnixSocketBackend       │                 │ Agent backend│
//! │                              │                 │              │
//! │ request() ──► writer task ───┼──── Command ───►│              │
//! │                              │                 │              │
//! │ pending[id]  ◄─┐             │                 │              │
//! │ subs[sub_id] ◄─┴ reader task ◄┼── ServerFrame ──┤              │
//! └──────────────────────────────┘                 └──────────────┘
//! ```
//!
//! Results are routed to the waiting request by ID; push events to the
//! subscription channel registered under the event's subscription ID. On
//! connection loss every waiting request fails and every subscription
//! channel closes. Subscriptions are never replayed.

mod client;

pub use client::UnixSocketBackend;
