//! Trailing window used to suppress repeated join announcements.
//!
//! A join is announced twice when the bare `user_joined` event and a late,
//! profile-enriched copy of it both arrive. The window remembers the last
//! few announcements so the second one can be dropped.
//!
//! This is a heuristic. A join that scrolled out of the window is
//! announced again, and two genuine joins with no visible leave between
//! them inside the window collapse into one. A per-connection join nonce
//! from the server would make it exact.

use std::collections::VecDeque;

use chatwire_protocol::Username;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Observed {
    Joined(Username),
    Left(Username),
    Other,
}

/// The last `capacity` announcements seen in this conversation.
#[derive(Debug, Clone)]
pub struct RecentJoins {
    capacity: usize,
    window: VecDeque<Observed>,
}

impl RecentJoins {
    /// Trailing window size.
    pub const DEFAULT_CAPACITY: usize = 10;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            window: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Records a join and returns `true` if it should be announced.
    ///
    /// Scans newest to oldest. Finding a join by `user` before any leave
    /// by `user` makes this a duplicate; duplicates are not recorded.
    pub fn observe_join(&mut self, user: &Username) -> bool {
        let duplicate = self
            .window
            .iter()
            .rev()
            .find_map(|entry| match entry {
                Observed::Joined(u) if u == user => Some(true),
                Observed::Left(u) if u == user => Some(false),
                _ => None,
            })
            .unwrap_or(false);
        if !duplicate {
            self.push(Observed::Joined(user.clone()));
        }
        !duplicate
    }

    /// Records a leave, so a later rejoin is announced.
    pub fn observe_left(&mut self, user: &Username) {
        self.push(Observed::Left(user.clone()));
    }

    /// Records any other visible entry (a posted message).
    pub fn observe_other(&mut self) {
        self.push(Observed::Other);
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    fn push(&mut self, entry: Observed) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(entry);
    }
}

impl Default for RecentJoins {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
