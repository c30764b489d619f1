//! # Tether
//!
//! Keeps a client attached to a streaming endpoint.
//!
//! A [`ConnectionManager`] owns exactly one duplex text connection to a
//! `ws://` or `wss://` endpoint. It reconnects with exponential backoff
//! when the connection drops, pings the server on a fixed cadence while
//! connected, hands every valid inbound frame to a callback, and exposes a
//! non-blocking `send` plus an observable connected flag.
//!
//! ```text
//!            ┌──────── ConnectionManager (handle) ───────┐
//!  start/stop│  send ─► Outbox          status ◄─ watch  │
//!            └────┬──────────┬─────────────────▲─────────┘
//!        commands │          │ frames          │
//!            ┌────▼──────────▼─────────────────┴─────────┐
//!            │ actor: ConnectionMachine, timers, Dispatcher
//!            └────┬──────────────────────────────▲───────┘
//!            dial │                   LinkEvent  │
//!            ┌────▼──────────────────────────────┴───────┐
//!            │ link task: Connector / Connection         │
//!            └───────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether::prelude::*;
//!
//! # async fn run() {
//! let manager = ConnectionManager::spawn(
//!     ManagerConfig::new("ws://127.0.0.1:9000/table/7"),
//!     WebSocketConnector,
//!     |env: InboundEnvelope| {
//!         if env.kind == InboundKind::StateUpdate {
//!             println!("table: {:?}", env.state);
//!         }
//!     },
//! );
//! manager.connected().await.ok();
//! manager.send(&OutboundEnvelope::upgrade_to_player("ada", 2));
//! # }
//! ```

mod config;
mod dispatcher;
mod driver;
mod error;
mod link;
mod manager;

pub use config::ManagerConfig;
pub use dispatcher::Dispatcher;
pub use driver::ManagerSnapshot;
pub use error::TetherError;
pub use manager::ConnectionManager;

pub use tether_protocol::{InboundEnvelope, InboundKind, OutboundEnvelope};
pub use tether_session::{BackoffPolicy, ConnectionState, Epoch};
#[cfg(feature = "websocket")]
pub use tether_transport::WebSocketConnector;
pub use tether_transport::{Connection, ConnectionTarget, Connector};

/// Everything most applications need.
pub mod prelude {
    pub use crate::{
        ConnectionManager, ConnectionState, InboundEnvelope, InboundKind, ManagerConfig,
        ManagerSnapshot, OutboundEnvelope, TetherError,
    };
    #[cfg(feature = "websocket")]
    pub use crate::WebSocketConnector;
}
