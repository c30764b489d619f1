//! Message dispatch: inbound frames to the consumer, outbound envelopes to
//! the live connection.
//!
//! The two directions meet different constraints. Inbound runs on the
//! actor task and may block it for as long as the consumer callback takes.
//! Outbound is called from any thread and must never block, so it goes
//! through an [`Outbox`]: a slot that holds the live connection's writer
//! while (and only while) the manager is `Connected`.

use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use tether_protocol::{
    Codec, InboundEnvelope, InboundKind, JsonCodec, OutboundEnvelope, ProtocolError,
};
use tether_session::Epoch;
use tokio::sync::mpsc;

use crate::TetherError;

// ---------------------------------------------------------------------------
// Dispatcher (inbound)
// ---------------------------------------------------------------------------

type Route = Box<dyn FnMut(&str) -> Result<InboundKind, ProtocolError> + Send>;

/// Decodes inbound frames and hands each valid one to the consumer.
///
/// The consumer sees every validly-tagged frame exactly once, `pong`
/// included, with its payload unmodified. Frames that don't parse or carry
/// an unknown tag are logged at `debug` and dropped; they never reach the
/// consumer and never affect the connection.
pub struct Dispatcher {
    route: Route,
}

impl Dispatcher {
    /// A dispatcher that decodes with `codec` and calls `on_message` for
    /// every valid frame.
    pub fn new<S, C, F>(codec: C, mut on_message: F) -> Self
    where
        S: DeserializeOwned + Send + 'static,
        C: Codec,
        F: FnMut(InboundEnvelope<S>) + Send + 'static,
    {
        let route = move |frame: &str| -> Result<InboundKind, ProtocolError> {
            let envelope: InboundEnvelope<S> = codec.decode(frame)?;
            let kind = envelope.kind;
            on_message(envelope);
            Ok(kind)
        };
        Self {
            route: Box::new(route),
        }
    }

    /// [`Dispatcher::new`] with the JSON codec.
    pub fn json<S, F>(on_message: F) -> Self
    where
        S: DeserializeOwned + Send + 'static,
        F: FnMut(InboundEnvelope<S>) + Send + 'static,
    {
        Self::new(JsonCodec, on_message)
    }

    /// Routes one frame. Returns its kind if it was delivered, `None` if it
    /// was dropped.
    pub fn dispatch(&mut self, frame: &str) -> Option<InboundKind> {
        match (self.route)(frame) {
            Ok(kind) => {
                tracing::trace!(kind = kind.as_str(), "inbound frame delivered");
                Some(kind)
            }
            Err(e) => {
                tracing::debug!(error = %e, len = frame.len(), "dropping inbound frame");
                None
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Outbox (outbound)
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Writer {
    epoch: Epoch,
    frames: mpsc::UnboundedSender<String>,
}

/// Shared slot holding the writer of the live connection, if any.
///
/// The actor opens it on entering `Connected` and clears it on every way
/// out, before status goes back to `false`. Callers never see a writer
/// from an older connection.
#[derive(Debug, Clone, Default)]
pub(crate) struct Outbox {
    slot: Arc<Mutex<Option<Writer>>>,
    codec: JsonCodec,
}

impl Outbox {
    pub(crate) fn open(&self, epoch: Epoch, frames: mpsc::UnboundedSender<String>) {
        *self.lock() = Some(Writer { epoch, frames });
        tracing::trace!(%epoch, "outbox open");
    }

    pub(crate) fn close(&self) {
        if let Some(writer) = self.lock().take() {
            tracing::trace!(epoch = %writer.epoch, "outbox closed");
        }
    }

    /// Whether a frame pushed now would reach a live connection.
    pub(crate) fn is_writable(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|writer| !writer.frames.is_closed())
    }

    /// Encodes `envelope` and queues it on the live connection.
    ///
    /// Never blocks and never queues for later: with no writable
    /// connection the envelope is dropped and `SendRejected` returned.
    pub(crate) fn push(&self, envelope: &OutboundEnvelope) -> Result<(), TetherError> {
        let guard = self.lock();
        let Some(writer) = guard.as_ref() else {
            return Err(TetherError::SendRejected);
        };
        if writer.frames.is_closed() {
            return Err(TetherError::SendRejected);
        }
        let frame = self.codec.encode(envelope)?;
        writer
            .frames
            .send(frame)
            .map_err(|_| TetherError::SendRejected)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Writer>> {
        // The slot is a plain Option; a panic elsewhere can't leave it torn.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::{Value, json};

    fn collecting() -> (Dispatcher, std::sync::mpsc::Receiver<InboundEnvelope>) {
        let (tx, rx) = std::sync::mpsc::channel();
        let dispatcher = Dispatcher::json(move |env: InboundEnvelope| {
            let _ = tx.send(env);
        });
        (dispatcher, rx)
    }

    #[test]
    fn test_state_update_delivered_unmodified() {
        let (mut dispatcher, rx) = collecting();
        let frame = r#"{"type":"state_update","state":{"pot":120,"seats":[null,{"name":"ada"}]}}"#;

        assert_eq!(dispatcher.dispatch(frame), Some(InboundKind::StateUpdate));

        let env = rx.try_recv().unwrap();
        assert_eq!(env.kind, InboundKind::StateUpdate);
        assert_eq!(
            env.state,
            Some(json!({"pot": 120, "seats": [null, {"name": "ada"}]}))
        );
    }

    #[test]
    fn test_pong_reaches_consumer_too() {
        let (mut dispatcher, rx) = collecting();
        assert_eq!(dispatcher.dispatch(r#"{"type":"pong"}"#), Some(InboundKind::Pong));
        assert!(rx.try_recv().unwrap().is_pong());
    }

    #[test]
    fn test_upgrade_failed_carries_error() {
        let (mut dispatcher, rx) = collecting();
        dispatcher.dispatch(r#"{"type":"upgrade_failed","error":"seat taken"}"#);
        let env = rx.try_recv().unwrap();
        assert_eq!(env.kind, InboundKind::UpgradeFailed);
        assert_eq!(env.error.as_deref(), Some("seat taken"));
    }

    #[test]
    fn test_invalid_frames_dropped() {
        let (mut dispatcher, rx) = collecting();
        for frame in [
            "not json",
            "[1,2,3]",
            r#"{"state":{}}"#,
            r#"{"type":"teleport"}"#,
            r#"{"type":42}"#,
        ] {
            assert_eq!(dispatcher.dispatch(frame), None, "{frame}");
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_typed_payload_mismatch_dropped() {
        #[derive(Debug, Deserialize)]
        struct Table {
            pot: u64,
        }

        let (tx, rx) = std::sync::mpsc::channel();
        let mut dispatcher = Dispatcher::json(move |env: InboundEnvelope<Table>| {
            let _ = tx.send(env.state.map(|t| t.pot));
        });

        assert_eq!(
            dispatcher.dispatch(r#"{"type":"state_update","state":{"pot":"lots"}}"#),
            None
        );
        assert!(dispatcher
            .dispatch(r#"{"type":"state_update","state":{"pot":5}}"#)
            .is_some());
        assert_eq!(rx.try_recv().unwrap(), Some(5));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_outbox_rejects_when_closed() {
        let outbox = Outbox::default();
        assert!(!outbox.is_writable());
        assert!(matches!(
            outbox.push(&OutboundEnvelope::ping()),
            Err(TetherError::SendRejected)
        ));
    }

    #[test]
    fn test_outbox_delivers_encoded_frame() {
        let outbox = Outbox::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        outbox.open(Epoch::new(3), tx);

        assert!(outbox.is_writable());
        outbox
            .push(&OutboundEnvelope::upgrade_to_player("ada", 2))
            .unwrap();

        let frame: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(
            frame,
            json!({"type": "upgrade_to_player", "player_name": "ada", "seat_index": 2})
        );

        outbox.close();
        assert!(outbox.push(&OutboundEnvelope::ping()).is_err());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_outbox_not_writable_once_connection_gone() {
        let outbox = Outbox::default();
        let (tx, rx) = mpsc::unbounded_channel();
        outbox.open(Epoch::new(1), tx);
        drop(rx);

        assert!(!outbox.is_writable());
        assert!(outbox.push(&OutboundEnvelope::ping()).is_err());
    }
}
