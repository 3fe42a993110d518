//! Per-tag callbacks.

use chatwire_protocol::InboundEvent;

/// Receives every event of the tag it is registered for.
///
/// Any `FnMut(&InboundEvent) + Send` closure is a handler:
///
/// ```rust
/// use chatwire_dispatch::EventHandler;
/// use chatwire_protocol::InboundEvent;
///
/// let mut count = 0;
/// let mut handler = |_: &InboundEvent| count += 1;
/// handler.handle(&InboundEvent::FriendRequestReceived {
///     sender_username: chatwire_protocol::Username::new("bob"),
/// });
/// drop(handler);
/// assert_eq!(count, 1);
/// ```
pub trait EventHandler: Send {
    fn handle(&mut self, event: &InboundEvent);
}

impl<F> EventHandler for F
where
    F: FnMut(&InboundEvent) + Send,
{
    fn handle(&mut self, event: &InboundEvent) {
        self(event)
    }
}
