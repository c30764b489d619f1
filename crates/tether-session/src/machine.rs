//! The connection state machine.
//!
//! [`ConnectionMachine`] owns the lifecycle of the single physical
//! connection and the rules for moving between states. It performs no I/O:
//! every operation returns the ordered list of [`Effect`]s the driver must
//! apply (dial, release, arm timers, publish status). That keeps every
//! transition deterministic and testable without a runtime.
//!
//! ```text
//!                 start()
//!   Idle ───────────────────→ Connecting ──(open)──→ Connected
//!    ↑                           ↑   │                  │
//!    │                   (timer) │   │(error/close)     │(error/close)
//!    │                           │   ▼                  │
//!    │                          Backoff ←───────────────┘
//!    │
//!    └── Closing ←── stop() from any non-Idle state
//! ```
//!
//! # Epochs
//!
//! Every transport event and reconnect timer carries the [`Epoch`] it was
//! issued under. The epoch advances whenever the current connection is
//! superseded (new attempt, severance, stop), so an event from an older
//! connection never matches and is discarded instead of applied.

use std::fmt;
use std::time::Duration;

use tether_transport::ConnectionTarget;
use tracing::{debug, info};

use crate::{BackoffPolicy, BackoffState, SessionError};

// ---------------------------------------------------------------------------
// Epoch
// ---------------------------------------------------------------------------

/// Generation counter identifying the current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Epoch(u64);

impl Epoch {
    /// Creates an epoch from a raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    pub fn into_inner(self) -> u64 {
        self.0
    }

    fn advance(&mut self) -> Self {
        self.0 += 1;
        *self
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Lifecycle state of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not running. Initial state, and where `stop()` leads.
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// The transport is open; the heartbeat lease is held.
    Connected,
    /// `stop()` is tearing things down.
    Closing,
    /// Waiting out the reconnect delay.
    Backoff,
}

impl ConnectionState {
    /// Whether the machine is in its connect/backoff cycle.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Backoff)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
            Self::Backoff => "backoff",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Effect
// ---------------------------------------------------------------------------

/// A side effect the driver must apply, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open a connection to `target`; tag all of its events with `epoch`.
    Dial {
        epoch: Epoch,
        target: ConnectionTarget,
    },
    /// Close and drop the connection dialed under `epoch`.
    /// Close errors are swallowed; the peer may already be gone.
    Release { epoch: Epoch },
    /// Take the heartbeat lease.
    ArmHeartbeat,
    /// Drop the heartbeat lease.
    DisarmHeartbeat,
    /// Fire a reconnect after `delay`, tagged with `epoch`.
    ScheduleReconnect { epoch: Epoch, delay: Duration },
    /// Cancel any pending reconnect.
    CancelReconnect,
    /// Publish the `is_connected` flag.
    Status(bool),
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the machine, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineSnapshot {
    pub state: ConnectionState,
    pub epoch: Epoch,
    pub attempt: u32,
    pub target: Option<ConnectionTarget>,
    /// Epoch of the live connection handle, if one exists.
    pub handle: Option<Epoch>,
}

// ---------------------------------------------------------------------------
// ConnectionMachine
// ---------------------------------------------------------------------------

/// Owns the single connection's lifecycle and transition rules.
///
/// Invariants maintained here:
/// - at most one handle exists (`Dial` is only emitted with no handle live);
/// - the heartbeat is armed only on entering `Connected` and disarmed on
///   every transition out of it;
/// - the attempt count only grows between successes and resets to 0
///   exactly when entering `Connected` (or when the target changes).
#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    epoch: Epoch,
    target: Option<ConnectionTarget>,
    handle: Option<Epoch>,
    backoff: BackoffState,
    policy: BackoffPolicy,
}

impl ConnectionMachine {
    /// Creates an idle machine.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: ConnectionState::Idle,
            epoch: Epoch::default(),
            target: None,
            handle: None,
            backoff: BackoffState::default(),
            policy,
        }
    }

    // -- Accessors --

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Current epoch.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Current attempt count.
    pub fn attempt(&self) -> u32 {
        self.backoff.attempt()
    }

    /// The target of the current (or last) run.
    pub fn target(&self) -> Option<&ConnectionTarget> {
        self.target.as_ref()
    }

    /// The reconnect policy in force.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Point-in-time view of the machine.
    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            state: self.state,
            epoch: self.epoch,
            attempt: self.backoff.attempt(),
            target: self.target.clone(),
            handle: self.handle,
        }
    }

    // -- Operations --

    /// Begins the connect/backoff cycle toward `addr`.
    ///
    /// - `Idle`: validates the address and dials. If the address differs
    ///   from the previous run's, the attempt count starts over; if it is
    ///   the same, backoff progression resumes where it stopped.
    /// - Running with the same target: no-op.
    /// - Running with a different target: full stop, backoff reset, and a
    ///   fresh start toward the new target.
    ///
    /// # Errors
    /// [`SessionError::InvalidTarget`] if `addr` is not a streaming-socket
    /// address. The machine is left untouched.
    pub fn start(&mut self, addr: &str) -> Result<Vec<Effect>, SessionError> {
        let target =
            ConnectionTarget::parse(addr).map_err(SessionError::InvalidTarget)?;

        if self.state.is_running() {
            if self.target.as_ref() == Some(&target) {
                debug!(state = %self.state, %target, "start ignored, already running");
                return Ok(Vec::new());
            }
            return Ok(self.retarget(target));
        }
        if self.state == ConnectionState::Closing {
            debug!("start ignored while closing");
            return Ok(Vec::new());
        }

        if self.target.as_ref() != Some(&target) {
            self.backoff.reset();
        }
        self.target = Some(target);
        Ok(self.begin_attempt())
    }

    /// The transport for `epoch` reported open.
    pub fn on_open(&mut self, epoch: Epoch) -> Vec<Effect> {
        if epoch != self.epoch || self.state != ConnectionState::Connecting {
            debug!(%epoch, current = %self.epoch, state = %self.state, "stale open discarded");
            return Vec::new();
        }

        self.state = ConnectionState::Connected;
        self.backoff.reset();
        info!(%epoch, target = ?self.target.as_ref().map(ToString::to_string), "connected");
        vec![Effect::ArmHeartbeat, Effect::Status(true)]
    }

    /// The transport for `epoch` errored or closed. Both are handled the
    /// same way: drop the connection and retry after a backoff delay.
    pub fn on_severed(&mut self, epoch: Epoch) -> Vec<Effect> {
        let live = matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        );
        if epoch != self.epoch || !live {
            debug!(%epoch, current = %self.epoch, state = %self.state, "stale severance discarded");
            return Vec::new();
        }

        let mut effects = vec![Effect::DisarmHeartbeat];
        if let Some(handle) = self.handle.take() {
            effects.push(Effect::Release { epoch: handle });
        }
        let epoch = self.epoch.advance();
        effects.push(Effect::Status(false));

        let attempt = self.backoff.attempt();
        let delay = self.policy.next_delay(attempt);
        self.backoff.record_failure();
        self.state = ConnectionState::Backoff;
        info!(
            %epoch,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "disconnected, scheduling reconnect"
        );
        effects.push(Effect::ScheduleReconnect { epoch, delay });
        effects
    }

    /// The reconnect timer tagged with `epoch` fired.
    pub fn on_reconnect_timer(&mut self, epoch: Epoch) -> Vec<Effect> {
        if epoch != self.epoch || self.state != ConnectionState::Backoff {
            debug!(%epoch, current = %self.epoch, state = %self.state, "stale reconnect timer discarded");
            return Vec::new();
        }
        self.begin_attempt()
    }

    /// Tears everything down. The machine is left in `Closing` until the
    /// driver has applied the effects and calls [`finish_close`](Self::finish_close).
    ///
    /// A no-op while `Idle`. The attempt count is kept, so an immediate
    /// restart toward the same target continues the backoff curve.
    pub fn stop(&mut self) -> Vec<Effect> {
        if matches!(self.state, ConnectionState::Idle | ConnectionState::Closing) {
            return Vec::new();
        }

        let from = self.state;
        self.state = ConnectionState::Closing;
        let mut effects = vec![Effect::CancelReconnect, Effect::DisarmHeartbeat];
        if let Some(handle) = self.handle.take() {
            effects.push(Effect::Release { epoch: handle });
        }
        self.epoch.advance();
        effects.push(Effect::Status(false));
        info!(%from, epoch = %self.epoch, "stopping");
        effects
    }

    /// Completes a stop: `Closing → Idle`.
    pub fn finish_close(&mut self) {
        if self.state == ConnectionState::Closing {
            self.state = ConnectionState::Idle;
            debug!(epoch = %self.epoch, "idle");
        }
    }

    /// Replaces the reconnect policy. Takes effect at the next failure.
    pub fn set_policy(&mut self, policy: BackoffPolicy) {
        self.policy = policy;
    }

    /// Zeroes the attempt count.
    pub fn reset_backoff(&mut self) {
        self.backoff.reset();
    }

    // -- Internals --

    fn begin_attempt(&mut self) -> Vec<Effect> {
        let Some(target) = self.target.clone() else {
            return Vec::new();
        };
        debug_assert!(self.handle.is_none(), "dial with a live handle");

        let epoch = self.epoch.advance();
        self.handle = Some(epoch);
        self.state = ConnectionState::Connecting;
        debug!(%epoch, %target, attempt = self.backoff.attempt(), "connecting");
        vec![Effect::Dial { epoch, target }]
    }

    fn retarget(&mut self, target: ConnectionTarget) -> Vec<Effect> {
        info!(
            from = ?self.target.as_ref().map(ToString::to_string),
            to = %target,
            "target changed, restarting"
        );
        let mut effects = self.stop();
        self.finish_close();
        self.backoff.reset();
        self.target = Some(target);
        effects.extend(self.begin_attempt());
        effects
    }
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}
