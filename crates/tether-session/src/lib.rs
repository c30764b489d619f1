//! Connection session logic for Tether.
//!
//! This crate holds the decision-making half of the connection manager,
//! with no sockets in sight:
//!
//! 1. **State machine**: [`ConnectionMachine`] owns the lifecycle
//!    (`Idle → Connecting → Connected → Backoff → …`) and emits [`Effect`]s
//! 2. **Backoff**: [`BackoffPolicy`] turns an attempt count into a delay
//! 3. **Heartbeat**: [`HeartbeatMonitor`] owns the ping lease while connected
//!
//! # How it fits in the stack
//!
//! ```text
//! Manager (above)  ← drives the machine, applies effects, owns the socket
//!     ↕
//! Session Layer (this crate)  ← decides what should happen next
//!     ↕
//! Timer / Transport (below)  ← RepeatingTimer, ConnectionTarget
//! ```

mod backoff;
mod error;
mod heartbeat;
mod machine;

pub use backoff::{BackoffPolicy, BackoffState};
pub use error::SessionError;
pub use heartbeat::{HeartbeatAction, HeartbeatMonitor};
pub use machine::{
    ConnectionMachine, ConnectionState, Effect, Epoch, MachineSnapshot,
};
