//! Conversation-scoped ephemeral state for Chatwire.
//!
//! Everything here is lost on disconnect or conversation switch, and that
//! is the point: none of it is durable.
//!
//! 1. **Typing** ([`TypingTracker`]): who is typing right now, with a
//!    per-identity expiry deadline.
//! 2. **Presence** ([`Presence`]): who is online in the conversation.
//! 3. **Join de-duplication** ([`RecentJoins`]): a trailing window of
//!    recently observed events used to drop repeated "X joined" notices.
//! 4. **Membership** ([`Membership`] trait): the external roster consulted
//!    before switching to a conversation.
//!
//! [`ConversationState`] bundles the first three for the conversation the
//! client is currently joined to.
//!
//! # How it fits in the stack
//!
//! ```text
//! Dispatch layer (above)  <- updates this state from inbound events
//!     |
//! Session layer (this crate)  <- owns per-conversation ephemeral state
//!     |
//! Protocol layer (below)  <- provides Username, ChannelId
//! ```

#![allow(async_fn_in_trait)]

mod error;
mod membership;
mod presence;
mod recent;
mod state;
mod typing;

pub use error::SessionError;
pub use membership::{Membership, OpenMembership};
pub use presence::Presence;
pub use recent::RecentJoins;
pub use state::{ConversationSnapshot, ConversationState, SessionConfig};
pub use typing::TypingTracker;
