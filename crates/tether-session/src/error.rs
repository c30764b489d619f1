//! Error types for the session layer.

use tether_transport::TransportError;

/// Errors the connection state machine reports to its driver.
///
/// None of these are fatal: the machine simply stays where it was.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `start` was given an address that can never be dialed.
    ///
    /// The machine stays `Idle`; retrying the same address is pointless.
    #[error("not starting: {0}")]
    InvalidTarget(#[source] TransportError),
}
