//! Client-side transport abstraction layer for Chatwire.
//!
//! Provides the [`Connector`], [`FrameSender`] and [`FrameReceiver`]
//! traits that abstract over the persistent, message-oriented connection
//! to a chat server. A connector opens one connection and hands back its
//! two halves so the owner can write and read independently.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`
//! - `memory`: in-process transport with a scriptable server side, for tests

mod error;
#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnector, WebSocketReceiver, WebSocketSender};

use std::fmt;
use std::future::Future;

/// A WebSocket-style close status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(u16);

impl CloseCode {
    /// Normal closure. Used for every intentional local close.
    pub const NORMAL: Self = Self(1000);
    /// The peer is going away (server restart, page navigation).
    pub const GOING_AWAY: Self = Self(1001);
    /// A close frame arrived without a status code.
    pub const NO_STATUS: Self = Self(1005);
    /// The connection dropped without a close frame.
    pub const ABNORMAL: Self = Self(1006);
    /// The server closed the connection for a policy violation.
    pub const POLICY_VIOLATION: Self = Self(1008);
    /// Application-defined: the bearer token was rejected.
    pub const UNAUTHORIZED: Self = Self(4001);

    /// Creates a `CloseCode` from a raw `u16`.
    pub fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the underlying `u16` value.
    pub fn into_inner(self) -> u16 {
        self.0
    }

    /// `true` for a normal/manual close, after which no reconnect is
    /// attempted.
    pub fn is_intentional(self) -> bool {
        self == Self::NORMAL
    }

    /// `true` if the server closed the connection because of the
    /// credentials.
    pub fn is_auth_rejection(self) -> bool {
        self == Self::POLICY_VIOLATION || self == Self::UNAUTHORIZED
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "close-{}", self.0)
    }
}

/// Something that happened on the read half of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete data frame.
    Frame(Vec<u8>),
    /// The connection closed with the given code. No further events
    /// follow.
    Closed(CloseCode),
}

/// Opens outbound connections to a chat server.
///
/// The returned futures are `Send` so the connection manager can run an
/// attempt on its own task and abort it when superseded.
pub trait Connector: Send + Sync + 'static {
    /// The write half produced by this connector.
    type Sender: FrameSender;
    /// The read half produced by this connector.
    type Receiver: FrameReceiver;

    /// Opens a connection to `url`.
    ///
    /// # Errors
    /// [`TransportError::Unauthorized`] when the server rejects the
    /// credentials carried in the URL, [`TransportError::ConnectFailed`]
    /// for everything else.
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<(Self::Sender, Self::Receiver), TransportError>>
    + Send;
}

/// The write half of a connection.
pub trait FrameSender: Send + 'static {
    /// Sends one data frame.
    fn send(
        &mut self,
        data: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the connection with the given code.
    fn close(
        &mut self,
        code: CloseCode,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// The read half of a connection.
pub trait FrameReceiver: Send + 'static {
    /// Waits for the next event on the connection.
    ///
    /// Must be cancel-safe: the connection manager drops a pending
    /// `recv` whenever another event wins its `select!`.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<TransportEvent, TransportError>> + Send;
}
