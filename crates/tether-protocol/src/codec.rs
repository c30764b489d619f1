//! Codec trait and implementations for text frames.
//!
//! A "codec" (coder/decoder) converts between Rust types and the text
//! frames that travel over the socket. The dispatcher doesn't care HOW a
//! frame is parsed, only that something implements [`Codec`].
//!
//! The endpoint speaks single JSON objects per frame, so [`JsonCodec`] is
//! the only implementation today.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that encodes Rust values to text frames and decodes them back.
///
/// `Send + Sync + 'static` because the codec lives inside the connection
/// manager's actor task for the whole life of the manager.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Parses a text frame back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the frame is malformed or
    /// doesn't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        frame: &str,
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use tether_protocol::{Codec, InboundEnvelope, InboundKind, JsonCodec, OutboundEnvelope};
///
/// let codec = JsonCodec;
///
/// let frame = codec.encode(&OutboundEnvelope::ping()).unwrap();
/// assert_eq!(frame, r#"{"type":"ping"}"#);
///
/// let env: InboundEnvelope = codec.decode(r#"{"type":"pong"}"#).unwrap();
/// assert_eq!(env.kind, InboundKind::Pong);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        frame: &str,
    ) -> Result<T, ProtocolError> {
        serde_json::from_str(frame).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InboundEnvelope, InboundKind};

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let result: Result<InboundEnvelope, _> = JsonCodec.decode("not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_empty_frame_is_decode_error() {
        let result: Result<InboundEnvelope, _> = JsonCodec.decode("");
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_upgrade_failed_keeps_error_text() {
        let env: InboundEnvelope = JsonCodec
            .decode(r#"{"type":"upgrade_failed","error":"seat taken"}"#)
            .unwrap();
        assert_eq!(env.kind, InboundKind::UpgradeFailed);
        assert_eq!(env.error.as_deref(), Some("seat taken"));
    }
}
