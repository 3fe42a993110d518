//! Error types for the protocol layer.
//!
//! Each crate in Chatwire defines its own error enum. A `ProtocolError`
//! always means a frame could not be turned into bytes or back, never a
//! networking or membership problem.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, wrong
    /// field types, or a truncated frame.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but breaks a protocol rule, e.g. it has no
    /// `type` tag.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
