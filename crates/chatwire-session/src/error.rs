//! Error types for the session layer.

use chatwire_protocol::ChannelId;

/// Errors raised while moving between conversations.
///
/// Both abort a switch before any local state is touched.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The roster could not be consulted.
    #[error("membership check failed: {0}")]
    MembershipFailed(String),

    /// The roster said we are not a member and joining was refused.
    #[error("failed to join {conversation}: {reason}")]
    JoinFailed {
        conversation: ChannelId,
        reason: String,
    },

    /// The target conversation id is empty.
    #[error("conversation id is empty")]
    EmptyConversation,
}
