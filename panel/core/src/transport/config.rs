//! Transport Configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default connection timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Default request timeout in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Transport configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Socket path (None = use default)
    ///
    /// Default: $XDG_RUNTIME_DIR/agent-panel/backend.sock
    /// Fallback: /tmp/agent-panel-$UID/backend.sock
    pub socket_path: Option<PathBuf>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// How long to wait for a command's result, in milliseconds (0 = forever)
    ///
    /// Applies to the result frame only. Push events of a streaming turn are
    /// not subject to it.
    pub request_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl TransportConfig {
    /// Configuration for a specific socket
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    /// Socket to connect to, falling back to the default location
    #[must_use]
    pub fn resolved_socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(default_socket_path)
    }

    /// Connection timeout
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Request timeout, or None if requests wait forever
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

/// Get the default Unix socket path
///
/// Uses XDG_RUNTIME_DIR if available, otherwise /tmp/agent-panel-$UID/
#[must_use]
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir)
            .join("agent-panel")
            .join("backend.sock")
    } else {
        // SAFETY: getuid has no preconditions and cannot fail
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/agent-panel-{uid}/backend.sock"))
    }
}
