//! Rate-limited FIFO for user-content frames.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

/// Guarantees that no two items leave the queue less than `interval`
/// apart, in submission order.
///
/// The queue never transmits anything itself. [`enqueue`](Self::enqueue)
/// hands the item straight back when it may go out immediately; otherwise
/// the item waits and [`next_drain_at`](Self::next_drain_at) tells the
/// owner when to call [`drain_due`](Self::drain_due).
#[derive(Debug)]
pub struct SendQueue<T> {
    interval: Duration,
    /// When the last item was released.
    last_sent: Option<Instant>,
    pending: VecDeque<T>,
    /// Armed while `pending` is non-empty.
    drain_at: Option<Instant>,
}

impl<T> SendQueue<T> {
    /// Minimum spacing between user messages.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);
    /// Longest spacing accepted; larger values are clamped so deadlines
    /// stay representable.
    pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

    /// Creates an empty queue with the given minimum spacing, clamped to
    /// [`MAX_INTERVAL`](Self::MAX_INTERVAL).
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.min(Self::MAX_INTERVAL),
            last_sent: None,
            pending: VecDeque::new(),
            drain_at: None,
        }
    }

    /// Submits an item.
    ///
    /// Returns `Some(item)` if it may be transmitted now (the queue is
    /// empty and the limiter is free); the send is recorded as happening
    /// at `now`. Otherwise the item is appended to the tail and `None` is
    /// returned.
    pub fn enqueue(&mut self, item: T, now: Instant) -> Option<T> {
        if self.pending.is_empty() && self.is_free(now) {
            self.last_sent = Some(now);
            return Some(item);
        }

        self.pending.push_back(item);
        if self.drain_at.is_none() {
            self.drain_at = Some(self.earliest_release(now));
        }
        trace!(queued = self.pending.len(), "send rate limited");
        None
    }

    /// Releases the head of the queue if its deadline has passed.
    ///
    /// Re-arms the deadline a full interval later while items remain.
    pub fn drain_due(&mut self, now: Instant) -> Option<T> {
        let due = self.drain_at?;
        if now < due {
            return None;
        }

        let item = self.pending.pop_front();
        if item.is_some() {
            self.last_sent = Some(now);
        }
        self.drain_at = if self.pending.is_empty() {
            None
        } else {
            Some(now + self.interval)
        };
        item
    }

    /// When the next queued item becomes due, or `None` if nothing waits.
    pub fn next_drain_at(&self) -> Option<Instant> {
        self.drain_at
    }

    /// Drops every queued item and disarms the drain deadline. Returns
    /// how many were dropped.
    ///
    /// The last-send instant is kept, so the spacing guarantee holds
    /// across a clear.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.drain_at = None;
        if dropped > 0 {
            debug!(dropped, "send queue cleared");
        }
        dropped
    }

    /// Number of items waiting.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// `true` if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The configured minimum spacing.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn is_free(&self, now: Instant) -> bool {
        self.last_sent
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    fn earliest_release(&self, now: Instant) -> Instant {
        match self.last_sent {
            Some(last) => (last + self.interval).max(now),
            None => now,
        }
    }
}

impl<T> Default for SendQueue<T> {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_enqueue_first_item_goes_out_immediately() {
        let mut q = SendQueue::default();
        let t0 = Instant::now();
        assert_eq!(q.enqueue("hello", t0), Some("hello"));
        assert!(q.is_empty());
        assert_eq!(q.next_drain_at(), None);
    }

    #[test]
    fn test_enqueue_within_interval_waits_for_remainder() {
        let mut q = SendQueue::default();
        let t0 = Instant::now();
        q.enqueue("hello", t0);

        assert_eq!(q.enqueue("world", t0 + ms(100)), None);
        assert_eq!(q.len(), 1);
        // Remaining wait, not a full interval from the enqueue.
        assert_eq!(q.next_drain_at(), Some(t0 + ms(500)));
    }

    #[test]
    fn test_drain_due_before_deadline_returns_none() {
        let mut q = SendQueue::default();
        let t0 = Instant::now();
        q.enqueue(1, t0);
        q.enqueue(2, t0 + ms(100));

        assert_eq!(q.drain_due(t0 + ms(499)), None);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_drain_due_rearms_full_interval_while_non_empty() {
        let mut q = SendQueue::default();
        let t0 = Instant::now();
        q.enqueue(1, t0);
        q.enqueue(2, t0);
        q.enqueue(3, t0);

        assert_eq!(q.drain_due(t0 + ms(500)), Some(2));
        assert_eq!(q.next_drain_at(), Some(t0 + ms(1000)));
        assert_eq!(q.drain_due(t0 + ms(1000)), Some(3));
        assert_eq!(q.next_drain_at(), None);
    }

    #[test]
    fn test_enqueue_behind_waiting_items_keeps_fifo() {
        // Even when the limiter is free again, a new item must not
        // overtake items already waiting.
        let mut q = SendQueue::default();
        let t0 = Instant::now();
        q.enqueue("a", t0);
        q.enqueue("b", t0 + ms(10));

        assert_eq!(q.enqueue("c", t0 + ms(600)), None);
        assert_eq!(q.drain_due(t0 + ms(600)), Some("b"));
        assert_eq!(q.drain_due(t0 + ms(1100)), Some("c"));
    }

    #[test]
    fn test_new_with_huge_interval_clamps_instead_of_overflowing() {
        let mut q = SendQueue::new(Duration::MAX);
        assert_eq!(q.interval(), SendQueue::<()>::MAX_INTERVAL);

        let t0 = Instant::now();
        q.enqueue(1, t0);
        q.enqueue(2, t0);
        q.enqueue(3, t0);
        let due = t0 + SendQueue::<()>::MAX_INTERVAL;
        assert_eq!(q.next_drain_at(), Some(due));
        assert_eq!(q.drain_due(due), Some(2));
        assert_eq!(q.next_drain_at(), Some(due + SendQueue::<()>::MAX_INTERVAL));
    }

    #[test]
    fn test_clear_drops_pending_and_keeps_spacing() {
        let mut q = SendQueue::default();
        let t0 = Instant::now();
        q.enqueue(1, t0);
        q.enqueue(2, t0);
        q.enqueue(3, t0);

        assert_eq!(q.clear(), 2);
        assert!(q.is_empty());
        assert_eq!(q.next_drain_at(), None);
        // Still inside the interval of the last real send.
        assert_eq!(q.enqueue(4, t0 + ms(200)), None);
    }
}
