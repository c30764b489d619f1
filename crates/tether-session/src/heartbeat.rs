//! Heartbeat monitor: keeps an established connection from looking idle.
//!
//! The monitor owns the heartbeat lease (a [`RepeatingTimer`]). The lease
//! is armed on entering `Connected` and disarmed on every way out of it.
//! The monitor decides what a firing means; writing the `ping` frame is
//! the driver's job.
//!
//! Liveness detection normally belongs to the transport's own close/error
//! signaling. The optional pong timeout is a hardening knob on top of that:
//! when set, a ping left unanswered for longer than the timeout makes the
//! next firing report [`HeartbeatAction::Stale`].

use std::time::Duration;

use tether_timer::RepeatingTimer;
use tokio::time::Instant;
use tracing::{debug, trace};

/// What the driver should do for one heartbeat firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Transport is writable: send exactly one `{"type":"ping"}`.
    SendPing,
    /// Transport is not writable right now: send nothing.
    Skip,
    /// A ping went unanswered past the pong timeout: treat the
    /// connection as severed.
    Stale,
}

/// Periodically proves liveness of an established connection.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    lease: RepeatingTimer,
    interval: Duration,
    pong_timeout: Option<Duration>,
    /// When the oldest still-unanswered ping was sent.
    awaiting_pong_since: Option<Instant>,
}

impl HeartbeatMonitor {
    /// Default period between pings.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10_000);

    /// Creates a disarmed monitor.
    pub fn new(interval: Duration, pong_timeout: Option<Duration>) -> Self {
        Self {
            lease: RepeatingTimer::new(),
            interval,
            pong_timeout,
            awaiting_pong_since: None,
        }
    }

    /// Takes the lease: first firing one interval from now.
    pub fn arm(&mut self) {
        self.awaiting_pong_since = None;
        self.lease.arm(self.interval);
    }

    /// Drops the lease. Safe to call when already disarmed.
    pub fn disarm(&mut self) {
        self.awaiting_pong_since = None;
        self.lease.disarm();
    }

    /// Whether the lease is held.
    pub fn is_armed(&self) -> bool {
        self.lease.is_armed()
    }

    /// Configured ping period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Configured pong timeout, if any.
    pub fn pong_timeout(&self) -> Option<Duration> {
        self.pong_timeout
    }

    /// Waits for the next firing. Pends forever while disarmed.
    pub async fn tick(&mut self) -> u64 {
        self.lease.tick().await
    }

    /// Decides what to do for a firing, given whether the transport is
    /// writable right now.
    pub fn on_fire(&mut self, writable: bool) -> HeartbeatAction {
        if self.is_stale() {
            debug!(
                timeout_ms = self.pong_timeout.map(|t| t.as_millis() as u64),
                "heartbeat unanswered past pong timeout"
            );
            return HeartbeatAction::Stale;
        }
        if !writable {
            trace!("heartbeat skipped, transport not writable");
            return HeartbeatAction::Skip;
        }
        self.awaiting_pong_since.get_or_insert_with(Instant::now);
        HeartbeatAction::SendPing
    }

    /// Records a `pong` reply; clears any outstanding ping.
    pub fn record_pong(&mut self) {
        if let Some(sent) = self.awaiting_pong_since.take() {
            trace!(rtt_ms = sent.elapsed().as_millis() as u64, "pong received");
        }
    }

    fn is_stale(&self) -> bool {
        match (self.pong_timeout, self.awaiting_pong_since) {
            (Some(timeout), Some(sent)) => sent.elapsed() > timeout,
            _ => false,
        }
    }
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, None)
    }
}
