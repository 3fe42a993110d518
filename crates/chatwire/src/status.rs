//! The observable projection of the connection state machine.

use std::fmt;

use chatwire_protocol::{ChannelId, Username};

/// Where the connection is in its lifecycle.
///
/// ```text
///              ok                       abnormal close
/// Connecting ──────→ Connected ─────────────────────→ Disconnected
///     │                  │                                │ backoff
///     │ failed           │ close 1000 (terminal)          ▼
///     └──────→ Error ────┴──────── backoff ──────────→ Connecting
/// ```
///
/// `Error` and `Disconnected` reconnect the same way; they differ only in
/// what the UI shows. Whether a retry is actually pending is in
/// [`ConnectionStatus::reconnect_scheduled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Why the connection is not healthy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The server rejected the bearer token. The token has been discarded;
    /// supply a new one with `set_token` and call `connect`.
    AuthRejected,
    /// Every automatic reconnect attempt failed. Call `connect` to retry.
    ReconnectExhausted,
    /// A transient transport failure, with its description.
    Transport(String),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthRejected => f.write_str("authentication rejected"),
            Self::ReconnectExhausted => f.write_str("reconnect attempts exhausted"),
            Self::Transport(reason) => write!(f, "transport failure: {reason}"),
        }
    }
}

/// Read-only view of the connection, published on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub fault: Option<Fault>,
    /// Automatic reconnect attempts used since the last successful open.
    pub attempts: u32,
    /// `true` while a backoff timer is pending.
    pub reconnect_scheduled: bool,
}

impl ConnectionStatus {
    pub(crate) fn new(state: ConnectionState) -> Self {
        Self {
            state,
            fault: None,
            attempts: 0,
            reconnect_scheduled: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// `true` when nothing will happen without a call to `connect`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Error
        ) && !self.reconnect_scheduled
    }
}

/// Point-in-time copy of the session for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSnapshot {
    pub conversation: ChannelId,
    pub status: ConnectionStatus,
    /// Sorted.
    pub typing: Vec<Username>,
    /// Sorted.
    pub presence: Vec<Username>,
}
