//! Error types for the protocol layer.
//!
//! Each crate in Tether defines its own error enum. A `ProtocolError`
//! always means a frame could not be turned into (or out of) an envelope;
//! it never says anything about the health of the connection itself.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into a text frame).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning a text frame into an envelope).
    ///
    /// Common causes: malformed JSON, a missing or unknown `type` tag,
    /// or a payload that does not match the expected shape.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The value is well-formed JSON but not a valid envelope,
    /// e.g. an outbound envelope that is not a JSON object.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
