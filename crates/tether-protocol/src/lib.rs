//! Wire protocol for Tether.
//!
//! This crate defines what travels on the socket:
//!
//! - **Types** ([`InboundEnvelope`], [`InboundKind`], [`OutboundEnvelope`]):
//!   the tagged JSON objects exchanged with the session endpoint.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those envelopes are
//!   converted to/from text frames.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! The protocol layer doesn't know about connections or reconnects. It
//! only knows how to turn frames into envelopes and back.
//!
//! ```text
//! Transport (text frames) → Protocol (envelopes) → Dispatcher (consumer)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{InboundEnvelope, InboundKind, OutboundEnvelope};
