//! The connection actor.
//!
//! All lifecycle state lives in one Tokio task: the state machine, both
//! timers, the live link, and the dispatcher. The outside world talks to
//! it through a command channel (see [`ConnectionManager`]); links talk
//! to it through an event channel. One `select!` loop serializes every
//! transition, so two of them can never interleave.
//!
//! The machine decides, the actor executes: every transition returns a
//! list of [`Effect`]s that [`Driver::apply`] carries out in order.
//!
//! [`ConnectionManager`]: crate::ConnectionManager

use std::sync::Arc;
use std::time::Duration;

use tether_protocol::{InboundKind, OutboundEnvelope};
use tether_session::{
    ConnectionMachine, ConnectionState, Effect, Epoch, HeartbeatAction, HeartbeatMonitor,
    SessionError,
};
use tether_timer::OneShotTimer;
use tether_transport::{ConnectionTarget, Connector};
use tokio::sync::{mpsc, oneshot, watch};

use crate::ManagerConfig;
use crate::dispatcher::{Dispatcher, Outbox};
use crate::link::{ConnectionHandle, LinkEvent};

/// Commands sent to the actor. Variants with a `reply` are answered once
/// the command has been fully applied.
pub(crate) enum Command {
    Start {
        target: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Reconfigure {
        config: Box<ManagerConfig>,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Snapshot {
        reply: oneshot::Sender<ManagerSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Point-in-time view of a manager, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerSnapshot {
    /// Lifecycle state.
    pub state: ConnectionState,
    /// Current connection generation.
    pub epoch: Epoch,
    /// Consecutive failed attempts since the last successful connection.
    pub attempt: u32,
    /// Target of the current (or last) run.
    pub target: Option<ConnectionTarget>,
    /// Published connection status.
    pub connected: bool,
    /// Whether a link task (dialing or open) exists.
    pub link_live: bool,
    /// Whether the heartbeat lease is held.
    pub heartbeat_armed: bool,
    /// Whether a reconnect is scheduled.
    pub reconnect_pending: bool,
}

pub(crate) struct Driver<C: Connector> {
    connector: Arc<C>,
    machine: ConnectionMachine,
    heartbeat: HeartbeatMonitor,
    reconnect: OneShotTimer<Epoch>,
    link: Option<ConnectionHandle>,
    dispatcher: Dispatcher,
    outbox: Outbox,
    status: watch::Sender<bool>,
    close_timeout: Duration,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
    events_tx: mpsc::UnboundedSender<LinkEvent>,
}

impl<C: Connector> Driver<C> {
    pub(crate) fn new(
        config: &ManagerConfig,
        connector: C,
        dispatcher: Dispatcher,
        outbox: Outbox,
        status: watch::Sender<bool>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        Self {
            connector: Arc::new(connector),
            machine: ConnectionMachine::new(config.backoff_policy()),
            heartbeat: config.heartbeat_monitor(),
            reconnect: OneShotTimer::new(),
            link: None,
            dispatcher,
            outbox,
            status,
            close_timeout: config.close_timeout(),
            commands,
            events,
            events_tx,
        }
    }

    /// Runs the actor loop until shutdown or until every manager handle is
    /// dropped. Either way the connection is stopped before returning.
    pub(crate) async fn run(mut self) {
        tracing::debug!("connection actor started");

        loop {
            tokio::select! {
                biased;
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => {
                        self.stop().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        self.stop().await;
                        break;
                    }
                },
                Some(event) = self.events.recv() => self.handle_event(event).await,
                epoch = self.reconnect.fired() => {
                    let effects = self.machine.on_reconnect_timer(epoch);
                    self.apply(effects).await;
                }
                _ = self.heartbeat.tick() => self.handle_heartbeat().await,
            }
        }

        tracing::debug!("connection actor stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start { target, reply } => {
                let _ = reply.send(self.start(&target).await);
            }
            Command::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(());
            }
            Command::Reconfigure { config, reply } => {
                let _ = reply.send(self.reconfigure(*config).await);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            // Handled by the loop.
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn start(&mut self, target: &str) -> Result<(), SessionError> {
        match self.machine.start(target) {
            Ok(effects) => {
                self.apply(effects).await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "connection target rejected, staying idle");
                Err(e)
            }
        }
    }

    async fn stop(&mut self) {
        let effects = self.machine.stop();
        self.apply(effects).await;
        self.machine.finish_close();
    }

    /// Full stop, swap in the new settings, fresh start.
    async fn reconfigure(&mut self, config: ManagerConfig) -> Result<(), SessionError> {
        let config = config.validated();
        tracing::info!(addr = %config.target, "reconfiguring");

        self.stop().await;
        self.machine.set_policy(config.backoff_policy());
        self.machine.reset_backoff();
        self.heartbeat = config.heartbeat_monitor();
        self.close_timeout = config.close_timeout();
        self.start(&config.target).await
    }

    async fn handle_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Opened(epoch) => {
                let effects = self.machine.on_open(epoch);
                if !effects.is_empty() {
                    // The writer goes live before the status flips, so a
                    // caller that just saw `true` can send right away.
                    if let Some(link) = &self.link {
                        self.outbox.open(link.epoch(), link.writer());
                    }
                }
                self.apply(effects).await;
            }
            LinkEvent::Frame(epoch, frame) => {
                if epoch != self.machine.epoch()
                    || self.machine.state() != ConnectionState::Connected
                {
                    tracing::debug!(%epoch, "frame from stale connection dropped");
                    return;
                }
                if self.dispatcher.dispatch(&frame) == Some(InboundKind::Pong) {
                    self.heartbeat.record_pong();
                }
            }
            LinkEvent::Severed(epoch, reason) => {
                let effects = self.machine.on_severed(epoch);
                if !effects.is_empty() {
                    tracing::debug!(%epoch, %reason, "connection severed");
                }
                self.apply(effects).await;
            }
        }
    }

    async fn handle_heartbeat(&mut self) {
        match self.heartbeat.on_fire(self.outbox.is_writable()) {
            HeartbeatAction::SendPing => {
                if let Err(e) = self.outbox.push(&OutboundEnvelope::ping()) {
                    tracing::debug!(error = %e, "ping not sent");
                }
            }
            HeartbeatAction::Skip => {}
            HeartbeatAction::Stale => {
                let epoch = self.machine.epoch();
                tracing::warn!(%epoch, "heartbeat unanswered, dropping connection");
                let effects = self.machine.on_severed(epoch);
                self.apply(effects).await;
            }
        }
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Dial { epoch, target } => {
                    debug_assert!(self.link.is_none(), "dial with a live link");
                    self.link = Some(ConnectionHandle::spawn(
                        Arc::clone(&self.connector),
                        target,
                        epoch,
                        self.events_tx.clone(),
                    ));
                }
                Effect::Release { epoch } => {
                    self.outbox.close();
                    if let Some(link) = self.link.take() {
                        debug_assert_eq!(link.epoch(), epoch);
                        link.release(self.close_timeout).await;
                    }
                }
                Effect::ArmHeartbeat => self.heartbeat.arm(),
                Effect::DisarmHeartbeat => self.heartbeat.disarm(),
                Effect::ScheduleReconnect { epoch, delay } => self.reconnect.arm(delay, epoch),
                Effect::CancelReconnect => {
                    self.reconnect.cancel();
                }
                Effect::Status(connected) => {
                    if !connected {
                        self.outbox.close();
                    }
                    self.status.send_if_modified(|current| {
                        let changed = *current != connected;
                        *current = connected;
                        changed
                    });
                }
            }
        }
    }

    fn snapshot(&self) -> ManagerSnapshot {
        let machine = self.machine.snapshot();
        ManagerSnapshot {
            state: machine.state,
            epoch: machine.epoch,
            attempt: machine.attempt,
            target: machine.target,
            connected: *self.status.borrow(),
            link_live: self.link.is_some(),
            heartbeat_armed: self.heartbeat.is_armed(),
            reconnect_pending: self.reconnect.is_armed(),
        }
    }
}
