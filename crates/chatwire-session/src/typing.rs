//! Who is typing, with automatic expiry.

use std::collections::HashMap;
use std::time::Duration;

use chatwire_protocol::Username;
use tokio::time::Instant;
use tracing::trace;

/// Maps each typing identity to the instant its indicator lapses.
///
/// There is one deadline per identity, never a stack of timers: marking
/// again simply moves the deadline (last write wins). Removal, by
/// [`mark_stopped`](Self::mark_stopped) or by [`expire`](Self::expire),
/// happens at most once per mark.
///
/// The tracker does not sleep. The owner waits until
/// [`next_expiry`](Self::next_expiry) and then calls `expire`.
#[derive(Debug, Clone)]
pub struct TypingTracker {
    ttl: Duration,
    entries: HashMap<Username, Instant>,
}

impl TypingTracker {
    /// How long an indicator lasts without a refresh.
    pub const DEFAULT_TTL: Duration = Duration::from_millis(3000);
    /// Longest accepted lifetime; larger values are clamped.
    pub const MAX_TTL: Duration = Duration::from_secs(24 * 60 * 60);

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: ttl.min(Self::MAX_TTL),
            entries: HashMap::new(),
        }
    }

    /// Inserts or refreshes `user` with a deadline of `now + ttl`.
    ///
    /// Returns `true` if the user was not already typing.
    pub fn mark_typing(&mut self, user: Username, now: Instant) -> bool {
        let deadline = now + self.ttl;
        let added = self.entries.insert(user, deadline).is_none();
        trace!(added, "typing marked");
        added
    }

    /// Removes `user` immediately. Returns `true` if it was present.
    pub fn mark_stopped(&mut self, user: &Username) -> bool {
        self.entries.remove(user).is_some()
    }

    /// Removes every entry whose deadline is at or before `now` and
    /// returns them, sorted.
    pub fn expire(&mut self, now: Instant) -> Vec<Username> {
        let mut expired: Vec<Username> = self
            .entries
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(user, _)| user.clone())
            .collect();
        for user in &expired {
            self.entries.remove(user);
        }
        expired.sort();
        expired
    }

    /// The earliest pending deadline.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.entries.values().min().copied()
    }

    /// `true` if `user` is typing as of `now`.
    pub fn is_typing(&self, user: &Username, now: Instant) -> bool {
        self.entries.get(user).is_some_and(|deadline| *deadline > now)
    }

    /// Sorted identities whose indicator has not lapsed as of `now`.
    ///
    /// Entries past their deadline but not yet collected by `expire` are
    /// already excluded.
    pub fn snapshot(&self, now: Instant) -> Vec<Username> {
        let mut users: Vec<Username> = self
            .entries
            .iter()
            .filter(|(_, deadline)| **deadline > now)
            .map(|(user, _)| user.clone())
            .collect();
        users.sort();
        users
    }

    /// Drops every entry. Returns `true` if anything was removed.
    pub fn clear(&mut self) -> bool {
        let changed = !self.entries.is_empty();
        self.entries.clear();
        changed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}
