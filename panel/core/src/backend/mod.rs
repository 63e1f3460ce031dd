//! Agent Backend Boundary
//!
//! Abstracted access to the remote agent through a common trait, so the
//! streaming client and the turn controller never see the transport.
//!
//! # Usage
//!
//! ```ignore
//! use panel_core::backend::AgentBackend;
//! use panel_core::protocol::StreamOptions;
//!
//! let mut sub = backend.send_stream(&params, StreamOptions::once()).await?;
//! while let Some(event) = sub.next_event().await {
//!     // fold event
//! }
//! sub.release();
//! ```

mod subscription;
mod traits;

pub use subscription::{ReleaseFn, Subscription};
pub use traits::AgentBackend;
