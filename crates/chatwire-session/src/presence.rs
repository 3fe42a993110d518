//! Online users in the current conversation.

use std::collections::BTreeSet;

use chatwire_protocol::Username;

/// The set of users the server reports as present.
///
/// Kept ordered so snapshots come out sorted without extra work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presence {
    users: BTreeSet<Username>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole list with a server snapshot.
    pub fn replace<I>(&mut self, users: I)
    where
        I: IntoIterator<Item = Username>,
    {
        self.users = users.into_iter().collect();
    }

    /// Returns `true` if `user` was not already present.
    pub fn add(&mut self, user: Username) -> bool {
        self.users.insert(user)
    }

    /// Returns `true` if `user` was present.
    pub fn remove(&mut self, user: &Username) -> bool {
        self.users.remove(user)
    }

    pub fn contains(&self, user: &Username) -> bool {
        self.users.contains(user)
    }

    /// Sorted copy of the list.
    pub fn snapshot(&self) -> Vec<Username> {
        self.users.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
