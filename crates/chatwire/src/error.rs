//! Unified error type for the Chatwire client.

use chatwire_protocol::ProtocolError;
use chatwire_session::SessionError;
use chatwire_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Only operation-level failures surface here. Connection drops, failed
/// reconnects and rejected tokens are absorbed by the connection manager
/// and show up in [`ConnectionStatus`](crate::ConnectionStatus) instead.
#[derive(Debug, thiserror::Error)]
pub enum ChatwireError {
    /// A transport-level error while writing a frame.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The membership collaborator refused a conversation switch.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A write was attempted while no connection is open. Nothing is
    /// queued; retry once the status is `Connected` again.
    #[error("not connected")]
    NotConnected,

    /// A precondition for connecting is missing (token, conversation,
    /// username, URL).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The connection manager has shut down.
    #[error("client has shut down")]
    ClientClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let chat_err: ChatwireError = err.into();
        assert!(matches!(chat_err, ChatwireError::Transport(_)));
        assert!(chat_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let chat_err: ChatwireError = err.into();
        assert!(matches!(chat_err, ChatwireError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::MembershipFailed("roster down".into());
        let chat_err: ChatwireError = err.into();
        assert!(matches!(chat_err, ChatwireError::Session(_)));
    }
}
