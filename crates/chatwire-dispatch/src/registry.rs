//! Lifetime-scoped publish/subscribe.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chatwire_protocol::{ChannelId, EventKind, InboundEvent, Username};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Something a subscriber is told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// An inbound event for the current conversation.
    Event(InboundEvent),
    /// The typing set changed. Carries the full sorted set, not a delta.
    TypingChanged {
        conversation: ChannelId,
        typing: Vec<Username>,
    },
    /// Local state moved to another conversation. Anything cached for
    /// `from` is stale.
    ConversationSwitched { from: ChannelId, to: ChannelId },
}

/// Which [`Update::Event`]s a subscription wants.
///
/// State updates (`TypingChanged`, `ConversationSwitched`) are always
/// delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// `None` means every kind.
    kinds: Option<HashSet<EventKind>>,
}

impl EventFilter {
    /// Every event.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only events of the given kinds.
    pub fn kinds<I>(kinds: I) -> Self
    where
        I: IntoIterator<Item = EventKind>,
    {
        Self {
            kinds: Some(kinds.into_iter().collect()),
        }
    }

    pub fn matches(&self, update: &Update) -> bool {
        match (update, &self.kinds) {
            (Update::Event(event), Some(kinds)) => kinds.contains(&event.kind()),
            _ => true,
        }
    }
}

struct Subscriber {
    filter: EventFilter,
    tx: mpsc::Sender<Update>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
    closed: bool,
}

type Shared = Arc<Mutex<Inner>>;

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The subscribers of one client session.
///
/// Each subscription buffers at most [`Registry::CAPACITY`] updates.
/// Publishing never waits: a subscriber that has fallen that far behind
/// misses updates until it catches up. `TypingChanged` carries the full
/// set, so the next one after a gap is still accurate.
///
/// Cheap to clone; clones share the same subscriber set.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Shared,
}

impl Registry {
    /// Updates buffered per subscription before new ones are dropped.
    pub const CAPACITY: usize = 256;

    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber. On a closed registry the subscription is born
    /// finished: `recv` returns `None` immediately.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let (tx, rx) = mpsc::channel(Self::CAPACITY);
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        if !inner.closed {
            inner.subscribers.insert(id, Subscriber { filter, tx });
            debug!(id, total = inner.subscribers.len(), "subscriber added");
        }
        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Delivers `update` to every matching subscriber. Returns how many
    /// received it.
    ///
    /// Subscribers whose receiving side is gone are pruned. A full
    /// subscriber keeps its place but does not get this update.
    pub fn publish(&self, update: &Update) -> usize {
        let mut inner = lock(&self.inner);
        let mut delivered = 0;
        inner.subscribers.retain(|id, sub| {
            if !sub.filter.matches(update) {
                return !sub.tx.is_closed();
            }
            match sub.tx.try_send(update.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(id, "subscriber lagging, update dropped");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
        delivered
    }

    /// Ends every subscription and refuses new ones.
    pub fn close_all(&self) {
        let mut inner = lock(&self.inner);
        inner.closed = true;
        let dropped = inner.subscribers.len();
        inner.subscribers.clear();
        debug!(dropped, "registry closed");
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Registry")
            .field("subscribers", &inner.subscribers.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

/// A live feed of [`Update`]s. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Update>,
    registry: Weak<Mutex<Inner>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next update. `None` once the session has ended.
    pub async fn recv(&mut self) -> Option<Update> {
        self.rx.recv().await
    }

    /// Takes an update if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Update> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            lock(&inner).subscribers.remove(&self.id);
        }
    }
}
