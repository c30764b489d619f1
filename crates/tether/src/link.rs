//! The link task: one spawned task per connection attempt.
//!
//! A link dials its target, then pumps frames both ways until the
//! connection dies or it is told to close. Everything it reports back to
//! the actor is tagged with the epoch it was spawned under, so reports
//! from a link the actor has already given up on are recognizable and
//! discarded.

use std::sync::Arc;
use std::time::Duration;

use tether_session::Epoch;
use tether_transport::{Connection, ConnectionTarget, Connector};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// What a link reports to the actor.
#[derive(Debug)]
pub(crate) enum LinkEvent {
    /// The transport is open and writable.
    Opened(Epoch),
    /// One inbound text frame.
    Frame(Epoch, String),
    /// Connect failed, the peer closed, or an I/O error. The link task has
    /// exited (or is about to).
    Severed(Epoch, String),
}

/// Owning handle to a running link task.
///
/// Dropping the handle also closes the link: the task sees its close
/// channel hang up and shuts the transport down.
#[derive(Debug)]
pub(crate) struct ConnectionHandle {
    epoch: Epoch,
    frames: mpsc::UnboundedSender<String>,
    close: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Spawns a link task dialing `target` under `epoch`.
    pub(crate) fn spawn<C: Connector>(
        connector: Arc<C>,
        target: ConnectionTarget,
        epoch: Epoch,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Self {
        let (frames, outbound) = mpsc::unbounded_channel();
        let (close, close_rx) = oneshot::channel();
        tracing::debug!(%epoch, %target, "dialing");
        let task = tokio::spawn(run_link(connector, target, epoch, events, outbound, close_rx));
        Self {
            epoch,
            frames,
            close,
            task,
        }
    }

    pub(crate) fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// A sender feeding this link's outbound queue.
    pub(crate) fn writer(&self) -> mpsc::UnboundedSender<String> {
        self.frames.clone()
    }

    /// Closes the link and waits up to `grace` for the transport's close
    /// handshake. A link still busy after that is aborted.
    pub(crate) async fn release(self, grace: Duration) {
        let Self {
            epoch,
            frames,
            close,
            mut task,
        } = self;
        drop(frames);
        let _ = close.send(());

        match tokio::time::timeout(grace, &mut task).await {
            Ok(_) => tracing::debug!(%epoch, "link released"),
            Err(_) => {
                tracing::debug!(%epoch, grace_ms = grace.as_millis() as u64, "close handshake timed out, aborting link");
                task.abort();
            }
        }
    }
}

async fn run_link<C: Connector>(
    connector: Arc<C>,
    target: ConnectionTarget,
    epoch: Epoch,
    events: mpsc::UnboundedSender<LinkEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    mut close: oneshot::Receiver<()>,
) {
    let conn = tokio::select! {
        biased;
        _ = &mut close => {
            tracing::debug!(%epoch, "connect abandoned");
            return;
        }
        result = connector.connect(&target) => match result {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!(%epoch, %target, error = %e, "connect failed");
                let _ = events.send(LinkEvent::Severed(epoch, e.to_string()));
                return;
            }
        },
    };

    if events.send(LinkEvent::Opened(epoch)).is_err() {
        // Actor is gone.
        let _ = conn.close().await;
        return;
    }

    let reason = loop {
        tokio::select! {
            biased;
            _ = &mut close => {
                if let Err(e) = conn.close().await {
                    tracing::debug!(%epoch, error = %e, "close failed");
                }
                return;
            }
            Some(frame) = outbound.recv() => {
                if let Err(e) = conn.send(&frame).await {
                    break e.to_string();
                }
            }
            result = conn.recv() => match result {
                Ok(Some(frame)) => {
                    if events.send(LinkEvent::Frame(epoch, frame)).is_err() {
                        let _ = conn.close().await;
                        return;
                    }
                }
                Ok(None) => break "closed by peer".to_string(),
                Err(e) => break e.to_string(),
            },
        }
    };

    tracing::debug!(%epoch, %reason, "link severed");
    let _ = events.send(LinkEvent::Severed(epoch, reason));
}
