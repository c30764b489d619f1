//! Unified error type for the Tether connection manager.

use tether_protocol::ProtocolError;
use tether_session::SessionError;

/// Top-level error that wraps all crate-specific errors.
///
/// None of these ever escape the manager as a failure of the connection
/// itself. Transport errors drive a reconnect and protocol errors drop a
/// frame. This type shows up when `start` is given an invalid target, on
/// the explicit [`try_send`](crate::ConnectionManager::try_send) path, and
/// when talking to a manager that has already shut down.
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The state machine refused an operation, e.g. an invalid target.
    /// The manager stays idle.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// `send` while no connection is writable. The message was dropped,
    /// not queued.
    #[error("send rejected: no writable connection")]
    SendRejected,

    /// The manager's actor task is gone.
    #[error("connection manager has shut down")]
    ManagerClosed,
}
