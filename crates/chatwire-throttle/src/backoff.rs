//! Bounded exponential backoff for reconnects.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Configuration for [`ReconnectPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Automatic attempts allowed before giving up. Default: 5.
    pub max_attempts: u32,
    /// Delay before the first attempt; doubles each attempt. Default: 1 s.
    pub base_delay: Duration,
    /// Upper bound for a single delay. Default: 30 s.
    pub max_delay: Duration,
    /// Random extra delay (0..=jitter) added to each attempt so that many
    /// clients dropped by the same server restart don't reconnect in
    /// lockstep. Default: zero.
    pub jitter: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: Duration::ZERO,
        }
    }
}

impl ReconnectConfig {
    /// Ceiling for `base_delay`, `max_delay` and `jitter`.
    pub const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

    /// Fixes values that would make the schedule meaningless.
    ///
    /// - `base_delay` of zero becomes 1 ms.
    /// - Delays and jitter above [`MAX_DELAY`](Self::MAX_DELAY) are
    ///   clamped to it.
    /// - `max_delay` is raised to at least `base_delay`.
    pub fn validated(mut self) -> Self {
        for (name, value) in [
            ("base_delay", &mut self.base_delay),
            ("max_delay", &mut self.max_delay),
            ("jitter", &mut self.jitter),
        ] {
            if *value > Self::MAX_DELAY {
                warn!(field = name, "reconnect delay too large, clamping to one day");
                *value = Self::MAX_DELAY;
            }
        }
        if self.base_delay.is_zero() {
            warn!("reconnect base_delay is zero, using 1ms");
            self.base_delay = Duration::from_millis(1);
        }
        if self.max_delay < self.base_delay {
            warn!(
                base_ms = self.base_delay.as_millis() as u64,
                max_ms = self.max_delay.as_millis() as u64,
                "reconnect max_delay below base_delay, raising"
            );
            self.max_delay = self.base_delay;
        }
        self
    }
}

/// Attempt counter plus the schedule `delay(n) = min(2^n * base, max)`.
///
/// Reset on every successful open; consulted only after an abnormal
/// close or a failed attempt.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Creates a policy with no attempts used.
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config: config.validated(),
            attempts: 0,
        }
    }

    /// The un-jittered delay before attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.config
            .base_delay
            .saturating_mul(factor)
            .min(self.config.max_delay)
    }

    /// Consumes one attempt and returns how long to wait before it, or
    /// `None` once `max_attempts` have been used.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let delay = self.delay_for(self.attempts).saturating_add(self.jitter());
        self.attempts += 1;
        Some(delay)
    }

    /// Back to zero attempts. Called after a successful connect.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Attempts consumed since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `true` when no automatic attempt is left.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }

    /// The validated configuration.
    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    fn jitter(&self) -> Duration {
        let max = self.config.jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_fixes_zero_base_and_low_max() {
        let cfg = ReconnectConfig {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.base_delay, Duration::from_millis(1));
        assert_eq!(cfg.max_delay, Duration::from_millis(1));
    }

    #[test]
    fn test_validated_clamps_huge_delays() {
        let cfg = ReconnectConfig {
            base_delay: Duration::MAX,
            max_delay: Duration::MAX,
            jitter: Duration::MAX,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.base_delay, ReconnectConfig::MAX_DELAY);
        assert_eq!(cfg.max_delay, ReconnectConfig::MAX_DELAY);
        assert_eq!(cfg.jitter, ReconnectConfig::MAX_DELAY);

        let mut policy = ReconnectPolicy::new(cfg);
        while let Some(d) = policy.next_delay() {
            assert!(d <= ReconnectConfig::MAX_DELAY * 2);
        }
    }

    #[test]
    fn test_delay_for_huge_attempt_saturates_at_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(31), Duration::from_secs(30));
        assert_eq!(policy.delay_for(200), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_within_bound() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig {
            jitter: Duration::from_millis(250),
            ..Default::default()
        });
        let d = policy.next_delay().unwrap();
        assert!(d >= Duration::from_secs(1));
        assert!(d <= Duration::from_millis(1250));
    }
}
