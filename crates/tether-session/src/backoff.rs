//! Reconnect backoff: the policy (delay curve) and the state (attempt count).

use std::time::Duration;

use rand::Rng;
use tracing::warn;

// ---------------------------------------------------------------------------
// BackoffPolicy
// ---------------------------------------------------------------------------

/// Computes the reconnect delay from the number of failed attempts.
///
/// ```text
/// delay(attempt) = min(max_delay, min_delay * 2^attempt)
/// ```
///
/// With the defaults (500ms / 5000ms) the curve is
/// 500, 1000, 2000, 4000, 5000, 5000, ...
///
/// Jitter is off by default. Fleets of clients reconnecting to the same
/// server should enable it (±20% is typical) so they don't retry in lockstep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    min_delay: Duration,
    max_delay: Duration,
    /// Fraction in `0.0..=1.0`; each delay is scaled by a uniform factor
    /// in `1 - jitter ..= 1 + jitter`, then capped at `max_delay`.
    jitter: f64,
}

impl BackoffPolicy {
    /// Default delay before the first retry.
    pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(500);
    /// Default ceiling for any retry delay.
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(5_000);

    /// Creates a policy without jitter.
    ///
    /// A `max_delay` below `min_delay` is raised to `min_delay`.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        let max_delay = if max_delay < min_delay {
            warn!(
                min_ms = min_delay.as_millis() as u64,
                max_ms = max_delay.as_millis() as u64,
                "reconnect max delay below min delay, raising it to min"
            );
            min_delay
        } else {
            max_delay
        };
        Self {
            min_delay,
            max_delay,
            jitter: 0.0,
        }
    }

    /// Returns the policy with the given jitter fraction (clamped to `0.0..=1.0`).
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// The exact, un-jittered delay for `attempt`.
    ///
    /// Saturates: an attempt count large enough to overflow the
    /// multiplication yields `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.min_delay.checked_mul(factor))
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// The delay actually used to schedule a retry: [`delay`](Self::delay)
    /// with jitter applied when enabled.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let base = self.delay(attempt);
        if self.jitter == 0.0 || base.is_zero() {
            return base;
        }
        let factor = rand::rng().random_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        base.mul_f64(factor).min(self.max_delay)
    }

    /// Delay before the first retry.
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Ceiling for any retry delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Configured jitter fraction.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_DELAY, Self::DEFAULT_MAX_DELAY)
    }
}

// ---------------------------------------------------------------------------
// BackoffState
// ---------------------------------------------------------------------------

/// Number of consecutive failed or severed attempts since the last
/// successful connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackoffState {
    attempt: u32,
}

impl BackoffState {
    /// Current attempt count.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Records one more failure and returns the new count.
    pub fn record_failure(&mut self) -> u32 {
        self.attempt = self.attempt.saturating_add(1);
        self.attempt
    }

    /// Back to zero, on a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
