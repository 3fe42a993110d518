//! Roster hook consulted before a conversation switch.
//!
//! Chatwire does not own channel membership. That lives behind a
//! request/response API (a relational store, a REST service, ...). The
//! [`Membership`] trait is the seam: the switcher asks whether the local
//! user already belongs to the target conversation and, if not, asks the
//! collaborator to join it. Only when that succeeds is any local state
//! cleared.

use chatwire_protocol::{ChannelId, Username};

use crate::SessionError;

/// External roster of which users belong to which conversations.
///
/// # Example
///
/// ```rust
/// use chatwire_session::{Membership, SessionError};
/// use chatwire_protocol::{ChannelId, Username};
///
/// /// Everyone may read public channels; nobody may enter "staff".
/// struct PublicOnly;
///
/// impl Membership for PublicOnly {
///     async fn is_member(
///         &self,
///         _user: &Username,
///         conversation: &ChannelId,
///     ) -> Result<bool, SessionError> {
///         Ok(conversation.as_str() != "staff")
///     }
///
///     async fn join(
///         &self,
///         _user: &Username,
///         conversation: &ChannelId,
///     ) -> Result<(), SessionError> {
///         Err(SessionError::JoinFailed {
///             conversation: conversation.clone(),
///             reason: "invite only".into(),
///         })
///     }
/// }
/// ```
pub trait Membership: Send + Sync + 'static {
    /// Whether `user` already belongs to `conversation`.
    fn is_member(
        &self,
        user: &Username,
        conversation: &ChannelId,
    ) -> impl std::future::Future<Output = Result<bool, SessionError>> + Send;

    /// Adds `user` to `conversation`.
    ///
    /// # Errors
    /// `SessionError::JoinFailed` when the roster refuses.
    fn join(
        &self,
        user: &Username,
        conversation: &ChannelId,
    ) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;
}

/// A roster where everyone is a member of everything.
///
/// Useful for servers without private conversations, and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenMembership;

impl Membership for OpenMembership {
    async fn is_member(
        &self,
        _user: &Username,
        _conversation: &ChannelId,
    ) -> Result<bool, SessionError> {
        Ok(true)
    }

    async fn join(
        &self,
        _user: &Username,
        _conversation: &ChannelId,
    ) -> Result<(), SessionError> {
        Ok(())
    }
}
