/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection target is not a streaming-socket address.
    ///
    /// This is a configuration problem, not a network one: retrying an
    /// invalid address can never succeed.
    #[error("invalid target {target:?}: {reason}")]
    InvalidTarget {
        /// The rejected address, as given.
        target: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Opening the connection failed (DNS, TCP, or upgrade handshake).
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}
