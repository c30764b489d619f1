//! The public handle: [`ConnectionManager`].

use serde::de::DeserializeOwned;
use tether_protocol::{InboundEnvelope, OutboundEnvelope};
use tether_transport::Connector;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::dispatcher::{Dispatcher, Outbox};
use crate::driver::{Command, Driver, ManagerSnapshot};
use crate::{ManagerConfig, TetherError};

/// Keeps one duplex connection to a streaming endpoint alive.
///
/// Creating a manager mounts it: it starts connecting to the configured
/// target right away and keeps reconnecting with exponential backoff
/// whenever the connection drops, until it is stopped, shut down, or
/// dropped. Inbound frames go to the callback given at construction;
/// outbound envelopes go through [`send`](Self::send).
///
/// ```rust,no_run
/// use tether::prelude::*;
///
/// # async fn run() {
/// let manager = ConnectionManager::spawn(
///     ManagerConfig::new("ws://127.0.0.1:9000/table/7"),
///     WebSocketConnector,
///     |env: InboundEnvelope| println!("{:?}: {:?}", env.kind, env.state),
/// );
///
/// manager.connected().await.ok();
/// manager.send(&OutboundEnvelope::upgrade_to_player("ada", 2));
/// manager.shutdown().await;
/// # }
/// ```
///
/// Must be created inside a Tokio runtime.
#[derive(Debug)]
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<bool>,
    outbox: Outbox,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Spawns the connection actor and starts connecting to
    /// `config.target`.
    ///
    /// `on_message` is called on the actor task, once per valid inbound
    /// frame, in arrival order. An invalid target is logged and leaves the
    /// manager idle. [`start`](Self::start) reports the same rejection as
    /// an error.
    pub fn spawn<C, S, F>(config: ManagerConfig, connector: C, on_message: F) -> Self
    where
        C: Connector,
        S: DeserializeOwned + Send + 'static,
        F: FnMut(InboundEnvelope<S>) + Send + 'static,
    {
        Self::with_dispatcher(config, connector, Dispatcher::json(on_message))
    }

    /// [`spawn`](Self::spawn) with a ready-made dispatcher.
    pub fn with_dispatcher<C: Connector>(
        config: ManagerConfig,
        connector: C,
        dispatcher: Dispatcher,
    ) -> Self {
        let config = config.validated();
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(false);
        let outbox = Outbox::default();

        let driver = Driver::new(
            &config,
            connector,
            dispatcher,
            outbox.clone(),
            status_tx,
            commands_rx,
        );
        let task = tokio::spawn(driver.run());

        // Mount: one start, fire and forget.
        let (reply, _) = oneshot::channel();
        let _ = commands.send(Command::Start {
            target: config.target,
            reply,
        });

        Self {
            commands,
            status,
            outbox,
            task: Some(task),
        }
    }

    /// Starts connecting to `target`.
    ///
    /// A no-op if already running toward the same target. Running toward a
    /// different target means a full stop, a backoff reset and a fresh
    /// start. An invalid target leaves the manager idle and comes back as
    /// [`TetherError::Session`].
    pub async fn start(&self, target: &str) -> Result<(), TetherError> {
        let target = target.to_string();
        self.request(|reply| Command::Start { target, reply })
            .await??;
        Ok(())
    }

    /// Alias for [`start`](Self::start) that reads better at call sites
    /// switching endpoints.
    pub async fn retarget(&self, target: &str) -> Result<(), TetherError> {
        self.start(target).await
    }

    /// Closes the connection, cancels every timer and goes idle.
    ///
    /// Idempotent. Returns once the transport is closed (or the close
    /// timeout passed).
    pub async fn stop(&self) -> Result<(), TetherError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Stops, applies `config` (target and policy), and starts again with
    /// the attempt count reset. An invalid target is reported the same way
    /// as for [`start`](Self::start).
    pub async fn reconfigure(&self, config: ManagerConfig) -> Result<(), TetherError> {
        let config = Box::new(config);
        self.request(|reply| Command::Reconfigure { config, reply })
            .await??;
        Ok(())
    }

    /// Point-in-time view of the connection.
    pub async fn snapshot(&self) -> Result<ManagerSnapshot, TetherError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Sends `envelope` if the connection is writable right now.
    ///
    /// Never blocks and never queues: returns `false` and drops the
    /// envelope while connecting, backing off, or stopped.
    pub fn send(&self, envelope: &OutboundEnvelope) -> bool {
        match self.try_send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, kind = envelope.kind(), "outbound envelope dropped");
                false
            }
        }
    }

    /// Like [`send`](Self::send), but says why a send was rejected.
    pub fn try_send(&self, envelope: &OutboundEnvelope) -> Result<(), TetherError> {
        self.outbox.push(envelope)
    }

    /// Whether the connection is open right now.
    pub fn is_connected(&self) -> bool {
        *self.status.borrow()
    }

    /// A receiver that observes every change of [`is_connected`](Self::is_connected).
    pub fn status(&self) -> watch::Receiver<bool> {
        self.status.clone()
    }

    /// Waits until the connection is open.
    pub async fn connected(&self) -> Result<(), TetherError> {
        self.wait_status(true).await
    }

    /// Waits until the connection is not open.
    pub async fn disconnected(&self) -> Result<(), TetherError> {
        self.wait_status(false).await
    }

    /// Stops the connection and waits for the actor to exit.
    pub async fn shutdown(mut self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Shutdown { reply }).is_ok() {
            let _ = done.await;
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "connection actor panicked");
            }
        }
    }

    async fn wait_status(&self, wanted: bool) -> Result<(), TetherError> {
        let mut status = self.status.clone();
        status
            .wait_for(|connected| *connected == wanted)
            .await
            .map(|_| ())
            .map_err(|_| TetherError::ManagerClosed)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, TetherError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| TetherError::ManagerClosed)?;
        response.await.map_err(|_| TetherError::ManagerClosed)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // Unmount. The actor stops the connection on its own once the
        // command channel closes; nothing to await here.
        if self.task.is_some() {
            tracing::debug!("connection manager dropped");
        }
    }
}
