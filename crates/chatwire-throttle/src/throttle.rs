//! Leading-edge throttle.

use std::time::Duration;

use tokio::time::Instant;

/// Lets one call through per `period`, dropping the rest.
///
/// Used for typing-start notifications: the first keystroke is reported
/// immediately, later ones inside the window are swallowed.
#[derive(Debug, Clone)]
pub struct Throttle {
    period: Duration,
    last: Option<Instant>,
}

impl Throttle {
    /// Window for typing-start notifications.
    pub const TYPING_PERIOD: Duration = Duration::from_millis(1000);

    /// Creates a throttle with the given window.
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// Returns `true` and records `now` if the window has elapsed.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        let open = self
            .last
            .is_none_or(|last| now.saturating_duration_since(last) >= self.period);
        if open {
            self.last = Some(now);
        }
        open
    }

    /// Forgets the last acquisition.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// The configured window.
    pub fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_acquire_drops_calls_inside_window() {
        let mut t = Throttle::new(Throttle::TYPING_PERIOD);
        let t0 = Instant::now();
        assert!(t.try_acquire(t0));
        assert!(!t.try_acquire(t0 + Duration::from_millis(300)));
        assert!(!t.try_acquire(t0 + Duration::from_millis(999)));
        assert!(t.try_acquire(t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn test_dropped_calls_do_not_extend_window() {
        let mut t = Throttle::new(Duration::from_millis(1000));
        let t0 = Instant::now();
        t.try_acquire(t0);
        t.try_acquire(t0 + Duration::from_millis(900));
        assert!(t.try_acquire(t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn test_reset_reopens_window() {
        let mut t = Throttle::new(Duration::from_millis(1000));
        let t0 = Instant::now();
        t.try_acquire(t0);
        t.reset();
        assert!(t.try_acquire(t0 + Duration::from_millis(1)));
    }
}
