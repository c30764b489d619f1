//! Client transport abstraction layer for Tether.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! how a client dials a streaming endpoint and exchanges text frames with
//! it, plus [`ConnectionTarget`], the validated address type.
//!
//! # Feature Flags
//!
//! - `websocket` (default) WebSocket client via `tokio-tungstenite`
//! - `tls`: adds `wss://` support (rustls with webpki roots)

mod error;
mod target;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use target::ConnectionTarget;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};

use std::future::Future;

/// Opens outbound connections to a [`ConnectionTarget`].
///
/// The returned futures are `Send` so the connection manager can drive
/// each attempt on its own Tokio task.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;
    /// The error type for connect attempts.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Dials the target and completes the opening handshake.
    fn connect(
        &self,
        target: &ConnectionTarget,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single live connection that exchanges text frames.
///
/// `send` and `recv` take `&self` so one task can wait for inbound frames
/// while writes are issued in between.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one text frame to the remote peer.
    fn send(
        &self,
        frame: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next text frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
