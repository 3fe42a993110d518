//! Frame decoding, state upkeep and routing.

use std::collections::HashMap;

use chatwire_protocol::{
    ChannelId, Codec, Decoded, EventKind, InboundEvent, Username, decode_event,
};
use chatwire_session::ConversationState;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::{EventFilter, EventHandler, Registry, Subscription, Update};

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Decoded and delivered.
    Dispatched(EventKind),
    /// A repeat join announcement inside the de-duplication window.
    Suppressed,
    /// Scoped to a conversation other than the current one.
    Filtered { channel: ChannelId },
    /// Well-formed, but with a tag this client does not handle.
    Unknown { tag: String },
    /// Could not be decoded.
    Malformed,
}

/// Routes inbound frames for one client session.
///
/// Owns the conversation state and the subscriber registry. Every method
/// takes `now` from the caller so the whole thing runs on a paused clock
/// in tests.
pub struct Dispatcher<C: Codec> {
    codec: C,
    local_user: Username,
    state: ConversationState,
    handlers: HashMap<EventKind, Box<dyn EventHandler>>,
    registry: Registry,
}

impl<C: Codec> Dispatcher<C> {
    /// `local_user` is this client's identity. Its own typing echoes are
    /// dispatched but not tracked.
    pub fn new(codec: C, local_user: Username, state: ConversationState) -> Self {
        Self {
            codec,
            local_user,
            state,
            handlers: HashMap::new(),
            registry: Registry::new(),
        }
    }

    /// Registers the handler for `kind`, replacing any previous one.
    pub fn on<H>(&mut self, kind: EventKind, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.on_boxed(kind, Box::new(handler));
    }

    /// Like [`on`](Self::on), for a handler that is already boxed.
    pub fn on_boxed(&mut self, kind: EventKind, handler: Box<dyn EventHandler>) {
        if self.handlers.insert(kind, handler).is_some() {
            debug!(%kind, "handler replaced");
        }
    }

    /// Subscribes to this session's updates.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.registry.subscribe(filter)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn conversation(&self) -> &ChannelId {
        self.state.conversation()
    }

    /// Processes one inbound frame.
    ///
    /// Never fails: a bad frame is logged and reported as
    /// [`Outcome::Malformed`].
    pub fn dispatch(&mut self, frame: &[u8], now: Instant) -> Outcome {
        let event = match decode_event(&self.codec, frame) {
            Ok(Decoded::Event(event)) => event,
            Ok(Decoded::Unknown { tag }) => {
                warn!(%tag, "unknown event tag, dropped");
                return Outcome::Unknown { tag };
            }
            Err(e) => {
                warn!(error = %e, len = frame.len(), "malformed frame, dropped");
                return Outcome::Malformed;
            }
        };
        self.dispatch_event(event, now)
    }

    /// Processes an already decoded event.
    pub fn dispatch_event(&mut self, event: InboundEvent, now: Instant) -> Outcome {
        if let Some(channel) = event.channel() {
            if !self.state.accepts(Some(channel)) {
                debug!(
                    kind = %event.kind(),
                    %channel,
                    current = %self.state.conversation(),
                    "event for another conversation, dropped"
                );
                return Outcome::Filtered {
                    channel: channel.clone(),
                };
            }
        }

        let kind = event.kind();
        let typing_changed = match self.apply(&event, now) {
            Some(changed) => changed,
            None => {
                debug!(%kind, "duplicate join announcement suppressed");
                return Outcome::Suppressed;
            }
        };

        match self.handlers.get_mut(&kind) {
            Some(handler) => handler.handle(&event),
            None => trace!(%kind, "no handler registered"),
        }
        self.registry.publish(&Update::Event(event));
        if typing_changed {
            self.publish_typing(now);
        }
        Outcome::Dispatched(kind)
    }

    /// Collects lapsed typing indicators. Returns the users removed.
    pub fn expire_typing(&mut self, now: Instant) -> Vec<Username> {
        let expired = self.state.typing_mut().expire(now);
        if !expired.is_empty() {
            debug!(count = expired.len(), "typing indicators lapsed");
            self.publish_typing(now);
        }
        expired
    }

    /// When the next typing indicator lapses.
    pub fn next_typing_expiry(&self) -> Option<Instant> {
        self.state.typing().next_expiry()
    }

    /// Moves to `next`, clearing typing, presence and the join window, and
    /// tells subscribers. Returns the previous conversation.
    pub fn switch_conversation(&mut self, next: ChannelId, now: Instant) -> ChannelId {
        let had_typing = !self.state.typing().is_empty();
        let from = self.state.switch_to(next.clone());
        self.registry.publish(&Update::ConversationSwitched {
            from: from.clone(),
            to: next,
        });
        if had_typing {
            self.publish_typing(now);
        }
        from
    }

    /// Drops typing and presence after the connection went away. The
    /// conversation itself is kept for the next join.
    pub fn connection_lost(&mut self, now: Instant) {
        let had_typing = self.state.typing_mut().clear();
        self.state.presence_mut().clear();
        if had_typing {
            self.publish_typing(now);
        }
    }

    /// Ends every subscription. Used on session teardown.
    pub fn close(&self) {
        self.registry.close_all();
    }

    /// Updates local state for `event`. Returns `None` if the event is a
    /// suppressed duplicate, otherwise whether the typing set changed.
    fn apply(&mut self, event: &InboundEvent, now: Instant) -> Option<bool> {
        let typing_changed = match event {
            InboundEvent::MessagePosted { .. } => {
                self.state.joins_mut().observe_other();
                false
            }
            InboundEvent::UserJoined { username, .. } => {
                self.state.presence_mut().add(username.clone());
                if !self.state.joins_mut().observe_join(username) {
                    return None;
                }
                false
            }
            InboundEvent::UserLeft { username, .. } => {
                self.state.joins_mut().observe_left(username);
                self.state.presence_mut().remove(username);
                self.state.typing_mut().mark_stopped(username)
            }
            InboundEvent::UserListSnapshot { users, .. } => {
                self.state.presence_mut().replace(users.iter().cloned());
                false
            }
            InboundEvent::TypingStarted { username, .. } => {
                *username != self.local_user
                    && self.state.typing_mut().mark_typing(username.clone(), now)
            }
            InboundEvent::TypingStopped { username, .. } => {
                self.state.typing_mut().mark_stopped(username)
            }
            InboundEvent::MessageEdited { .. }
            | InboundEvent::MessageDeleted { .. }
            | InboundEvent::FriendRequestReceived { .. }
            | InboundEvent::FriendRequestAccepted { .. } => false,
        };
        Some(typing_changed)
    }

    fn publish_typing(&self, now: Instant) {
        self.registry.publish(&Update::TypingChanged {
            conversation: self.state.conversation().clone(),
            typing: self.state.typing().snapshot(now),
        });
    }
}

impl<C: Codec> std::fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("local_user", &self.local_user)
            .field("conversation", self.state.conversation())
            .field("handlers", &self.handlers.len())
            .field("registry", &self.registry)
            .finish()
    }
}
