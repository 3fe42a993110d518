//! The aggregate for the conversation a client is joined to.

use std::time::Duration;

use chatwire_protocol::{ChannelId, Username};
use tokio::time::Instant;
use tracing::debug;

use crate::{Presence, RecentJoins, TypingTracker};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Tunables for conversation-scoped state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long a typing indicator lasts without a refresh. Default: 3 s.
    pub typing_ttl: Duration,
    /// Size of the trailing join de-duplication window. Default: 10.
    pub join_window: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            typing_ttl: TypingTracker::DEFAULT_TTL,
            join_window: RecentJoins::DEFAULT_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// ConversationState
// ---------------------------------------------------------------------------

/// Typing set, presence list and join window for one conversation.
///
/// All three are reset together by [`switch_to`](Self::switch_to); there is
/// no way to change the conversation while keeping the old ephemeral
/// state.
#[derive(Debug, Clone)]
pub struct ConversationState {
    conversation: ChannelId,
    typing: TypingTracker,
    presence: Presence,
    joins: RecentJoins,
}

impl ConversationState {
    pub fn new(conversation: ChannelId, config: &SessionConfig) -> Self {
        Self {
            conversation,
            typing: TypingTracker::new(config.typing_ttl),
            presence: Presence::new(),
            joins: RecentJoins::new(config.join_window),
        }
    }

    pub fn conversation(&self) -> &ChannelId {
        &self.conversation
    }

    /// `true` if an event scoped to `channel` belongs here. Unscoped
    /// events always do.
    pub fn accepts(&self, channel: Option<&ChannelId>) -> bool {
        channel.is_none_or(|c| *c == self.conversation)
    }

    /// Moves to `next`, clearing every piece of ephemeral state.
    ///
    /// Returns the previous conversation id.
    pub fn switch_to(&mut self, next: ChannelId) -> ChannelId {
        self.typing.clear();
        self.presence.clear();
        self.joins.clear();
        debug!(from = %self.conversation, to = %next, "conversation state reset");
        std::mem::replace(&mut self.conversation, next)
    }

    pub fn typing(&self) -> &TypingTracker {
        &self.typing
    }

    pub fn typing_mut(&mut self) -> &mut TypingTracker {
        &mut self.typing
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    pub fn presence_mut(&mut self) -> &mut Presence {
        &mut self.presence
    }

    pub fn joins_mut(&mut self) -> &mut RecentJoins {
        &mut self.joins
    }

    /// Point-in-time copy for consumers.
    pub fn snapshot(&self, now: Instant) -> ConversationSnapshot {
        ConversationSnapshot {
            conversation: self.conversation.clone(),
            typing: self.typing.snapshot(now),
            presence: self.presence.snapshot(),
        }
    }
}

/// What a view needs to render the conversation header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSnapshot {
    pub conversation: ChannelId,
    /// Sorted.
    pub typing: Vec<Username>,
    /// Sorted.
    pub presence: Vec<Username>,
}
