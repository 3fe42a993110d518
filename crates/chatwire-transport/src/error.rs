/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening the connection failed (DNS, TCP, TLS, upgrade).
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The server rejected the bearer token during the upgrade.
    ///
    /// Retrying with the same token fails identically, so callers must
    /// not schedule a reconnect for this variant.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The connection was already closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),
}

impl TransportError {
    /// Returns `true` if this error means the credentials were rejected.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}
