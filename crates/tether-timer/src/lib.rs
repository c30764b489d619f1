//! Owned, cancellable timers for Tether.
//!
//! Two timer shapes cover everything the connection manager schedules:
//!
//! - [`OneShotTimer`]: fires once after a delay and yields the token it
//!   was armed with (the reconnect delay, tagged with an epoch).
//! - [`RepeatingTimer`]: fires on a fixed period until disarmed (the
//!   heartbeat cadence).
//!
//! Neither timer spawns a task. A timer is just a deadline stored in the
//! value that owns it, so cancelling is clearing that deadline and
//! dropping the owner cancels everything it held. There is no handle that
//! can outlive its scope and fire later.
//!
//! # Integration
//!
//! Timers are designed to sit inside an actor's `tokio::select!` loop. A
//! disarmed timer's wait future pends forever, so its branch simply never
//! wins:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* may arm or cancel timers */ }
//!         epoch = reconnect.fired() => { /* dial again */ }
//!         _ = heartbeat.tick() => { /* send a ping */ }
//!     }
//! }
//! ```
//!
//! Both wait futures are cancel-safe: if `select!` drops them before the
//! deadline, the timer stays armed with the same deadline.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// OneShotTimer
// ---------------------------------------------------------------------------

/// A timer that fires once and hands back the token it was armed with.
///
/// Arming an already-armed timer replaces the previous deadline and
/// token; at most one firing is ever pending.
#[derive(Debug)]
pub struct OneShotTimer<T> {
    armed: Option<(Instant, T)>,
}

impl<T> OneShotTimer<T> {
    /// Creates a disarmed timer.
    pub fn new() -> Self {
        Self { armed: None }
    }

    /// Arms the timer to fire `delay` from now with `token`.
    pub fn arm(&mut self, delay: Duration, token: T) {
        if self.armed.is_some() {
            debug!("one-shot timer re-armed before firing");
        }
        self.armed = Some((Instant::now() + delay, token));
    }

    /// Cancels a pending firing. Returns `true` if one was pending.
    ///
    /// Safe to call any number of times.
    pub fn cancel(&mut self) -> bool {
        self.armed.take().is_some()
    }

    /// Whether a firing is pending.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Time left until the pending firing, or `None` when disarmed.
    pub fn remaining(&self) -> Option<Duration> {
        self.armed
            .as_ref()
            .map(|(deadline, _)| deadline.saturating_duration_since(Instant::now()))
    }

    /// Waits for the deadline, disarms the timer and returns the token.
    ///
    /// Pends forever while disarmed.
    pub async fn fired(&mut self) -> T {
        let deadline = match &self.armed {
            Some((deadline, _)) => *deadline,
            None => return std::future::pending().await,
        };

        time::sleep_until(deadline).await;

        match self.armed.take() {
            Some((_, token)) => {
                trace!("one-shot timer fired");
                token
            }
            // Unreachable while `&mut self` is held across the sleep.
            None => std::future::pending().await,
        }
    }
}

impl<T> Default for OneShotTimer<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// RepeatingTimer
// ---------------------------------------------------------------------------

/// A timer that fires every `period` while armed.
///
/// If the owner falls behind (the loop was busy past a deadline), missed
/// firings are skipped and the next deadline is scheduled from now, so
/// a stall never turns into a burst.
#[derive(Debug, Default)]
pub struct RepeatingTimer {
    /// `(period, next deadline)` while armed.
    armed: Option<(Duration, Instant)>,
    fire_count: u64,
}

impl RepeatingTimer {
    /// Creates a disarmed timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer; the first firing is one full `period` from now.
    ///
    /// Re-arming restarts the cadence. A zero period is bumped to 1ms.
    pub fn arm(&mut self, period: Duration) {
        let period = period.max(Duration::from_millis(1));
        self.armed = Some((period, Instant::now() + period));
        self.fire_count = 0;
        debug!(period_ms = period.as_millis() as u64, "repeating timer armed");
    }

    /// Disarms the timer. Returns `true` if it was armed.
    pub fn disarm(&mut self) -> bool {
        let was_armed = self.armed.take().is_some();
        if was_armed {
            debug!(fired = self.fire_count, "repeating timer disarmed");
        }
        was_armed
    }

    /// Whether the timer is armed.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// The configured period, or `None` when disarmed.
    pub fn period(&self) -> Option<Duration> {
        self.armed.map(|(period, _)| period)
    }

    /// Number of firings since the timer was last armed.
    pub fn fire_count(&self) -> u64 {
        self.fire_count
    }

    /// Waits for the next firing and returns the firing number (from 1).
    ///
    /// Pends forever while disarmed.
    pub async fn tick(&mut self) -> u64 {
        let Some((period, next)) = self.armed else {
            return std::future::pending().await;
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(next);
        if late_by >= period {
            debug!(
                late_ms = late_by.as_millis() as u64,
                "repeating timer overrun, skipping missed firings"
            );
        }
        self.armed = Some((period, now + period));
        self.fire_count += 1;
        trace!(fire = self.fire_count, "repeating timer fired");
        self.fire_count
    }
}
