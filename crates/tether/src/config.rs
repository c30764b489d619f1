//! Manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_session::{BackoffPolicy, HeartbeatMonitor};

// ---------------------------------------------------------------------------
// ManagerConfig
// ---------------------------------------------------------------------------

/// Everything a [`ConnectionManager`](crate::ConnectionManager) needs to
/// know up front.
///
/// Every field except `target` has a default, so a config file only has to
/// name the endpoint:
///
/// ```
/// use tether::ManagerConfig;
///
/// let config: ManagerConfig =
///     serde_json::from_str(r#"{ "target": "ws://127.0.0.1:9000/table/7" }"#).unwrap();
/// assert_eq!(config.heartbeat_interval_ms, 10_000);
/// assert_eq!(config.reconnect_min_delay_ms, 500);
/// assert_eq!(config.reconnect_max_delay_ms, 5_000);
/// ```
///
/// Durations are plain milliseconds on the wire; use the accessor methods
/// to get them as [`Duration`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Endpoint address, `ws://` or `wss://`.
    pub target: String,

    /// Period between heartbeat pings while connected.
    pub heartbeat_interval_ms: u64,

    /// Delay before the first reconnect attempt.
    pub reconnect_min_delay_ms: u64,

    /// Ceiling for any reconnect delay.
    pub reconnect_max_delay_ms: u64,

    /// Fraction in `0.0..=1.0` applied as random spread to each reconnect
    /// delay. `0.0` keeps the schedule exact.
    pub reconnect_jitter: f64,

    /// Treat the connection as dead when a ping stays unanswered this long.
    /// `None` leaves liveness to the transport.
    pub pong_timeout_ms: Option<u64>,

    /// How long `stop` waits for the transport's close handshake before
    /// abandoning it.
    pub close_timeout_ms: u64,
}

impl ManagerConfig {
    /// A config for `target` with every other field at its default.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Returns the config with out-of-range values brought back into range.
    ///
    /// Each correction is logged at `warn`. Nothing here is fatal: a bad
    /// config still produces a working manager.
    pub fn validated(mut self) -> Self {
        if self.heartbeat_interval_ms == 0 {
            tracing::warn!("heartbeat_interval_ms is 0, using the default");
            self.heartbeat_interval_ms = HeartbeatMonitor::DEFAULT_INTERVAL.as_millis() as u64;
        }
        if self.reconnect_max_delay_ms < self.reconnect_min_delay_ms {
            tracing::warn!(
                min_ms = self.reconnect_min_delay_ms,
                max_ms = self.reconnect_max_delay_ms,
                "reconnect_max_delay_ms below reconnect_min_delay_ms, raising it"
            );
            self.reconnect_max_delay_ms = self.reconnect_min_delay_ms;
        }
        if !(0.0..=1.0).contains(&self.reconnect_jitter) {
            tracing::warn!(
                jitter = self.reconnect_jitter,
                "reconnect_jitter outside 0.0..=1.0, clamping"
            );
            self.reconnect_jitter = if self.reconnect_jitter.is_finite() {
                self.reconnect_jitter.clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
        if self.pong_timeout_ms == Some(0) {
            tracing::warn!("pong_timeout_ms is 0, disabling the pong timeout");
            self.pong_timeout_ms = None;
        }
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn reconnect_min_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_min_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    pub fn pong_timeout(&self) -> Option<Duration> {
        self.pong_timeout_ms.map(Duration::from_millis)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// The reconnect delay curve described by this config.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.reconnect_min_delay(), self.reconnect_max_delay())
            .with_jitter(self.reconnect_jitter)
    }

    /// A fresh, disarmed heartbeat monitor for this config.
    pub fn heartbeat_monitor(&self) -> HeartbeatMonitor {
        HeartbeatMonitor::new(self.heartbeat_interval(), self.pong_timeout())
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            heartbeat_interval_ms: HeartbeatMonitor::DEFAULT_INTERVAL.as_millis() as u64,
            reconnect_min_delay_ms: BackoffPolicy::DEFAULT_MIN_DELAY.as_millis() as u64,
            reconnect_max_delay_ms: BackoffPolicy::DEFAULT_MAX_DELAY.as_millis() as u64,
            reconnect_jitter: 0.0,
            pong_timeout_ms: None,
            close_timeout_ms: 1_000,
        }
    }
}
