//! Envelope types for Tether's wire format.
//!
//! Every frame on the socket is a single JSON object carrying a `"type"`
//! tag. Inbound frames (server → client) have a closed tag set and are
//! modelled by [`InboundEnvelope`]; outbound frames (client → server) are
//! caller-defined and modelled by [`OutboundEnvelope`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// InboundKind: the closed inbound tag set
// ---------------------------------------------------------------------------

/// The kind of an inbound frame, taken from its `"type"` tag.
///
/// The set is closed: a frame whose tag is not listed here fails to
/// decode and is dropped by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundKind {
    /// A fresh table snapshot; `state` carries the payload.
    StateUpdate,
    /// The connection was promoted from spectator to player.
    /// The server attaches the personalized `state`.
    UpgradeSuccess,
    /// The promotion was refused; `error` says why.
    UpgradeFailed,
    /// Reply to a heartbeat `ping`.
    Pong,
}

impl InboundKind {
    /// The wire tag for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StateUpdate => "state_update",
            Self::UpgradeSuccess => "upgrade_success",
            Self::UpgradeFailed => "upgrade_failed",
            Self::Pong => "pong",
        }
    }
}

// ---------------------------------------------------------------------------
// InboundEnvelope
// ---------------------------------------------------------------------------

/// A validated inbound frame.
///
/// `S` is the consumer's payload type for the `state` field. It defaults
/// to [`serde_json::Value`], which accepts any shape and hands the payload
/// to the consumer untouched. A frame whose `state` doesn't fit `S` is a
/// decode error like any other malformed frame.
///
/// ```json
/// {"type": "state_update", "state": {"pot": 120, "players": []}}
/// {"type": "upgrade_failed", "error": "Could not upgrade to player"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEnvelope<S = Value> {
    /// The frame's tag.
    #[serde(rename = "type")]
    pub kind: InboundKind,

    /// Consumer-defined payload (`state_update`, `upgrade_success`).
    /// `S` itself needs no `Default`; a missing field is `None`.
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub state: Option<S>,

    /// Human-readable failure reason (`upgrade_failed`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<S> InboundEnvelope<S> {
    /// Whether this frame is a heartbeat reply.
    pub fn is_pong(&self) -> bool {
        self.kind == InboundKind::Pong
    }
}

// ---------------------------------------------------------------------------
// OutboundEnvelope
// ---------------------------------------------------------------------------

/// An arbitrary keyed mapping the caller wants delivered.
///
/// The manager doesn't validate its shape; it only checks that the
/// transport is writable. Serializes as the bare JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboundEnvelope(Map<String, Value>);

impl OutboundEnvelope {
    /// An empty envelope.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// An envelope with only a `"type"` tag set.
    pub fn typed(kind: impl Into<String>) -> Self {
        Self::new().with("type", kind.into())
    }

    /// The heartbeat frame: exactly `{"type":"ping"}`.
    pub fn ping() -> Self {
        Self::typed("ping")
    }

    /// Asks the server to promote this connection to a seated player.
    pub fn upgrade_to_player(player_name: impl Into<String>, seat_index: u32) -> Self {
        Self::typed("upgrade_to_player")
            .with("player_name", player_name.into())
            .with("seat_index", seat_index)
    }

    /// Asks the server to demote this connection back to a spectator.
    pub fn downgrade_to_spectator() -> Self {
        Self::typed("downgrade_to_spectator")
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Looks up a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `"type"` tag, if present and a string.
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Borrows the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for OutboundEnvelope {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for OutboundEnvelope {
    type Error = crate::ProtocolError;

    /// Only JSON objects are valid envelopes.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(crate::ProtocolError::InvalidMessage(format!(
                "outbound envelope must be a JSON object, got {other}"
            ))),
        }
    }
}
