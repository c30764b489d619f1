//! Scripted in-memory transport for driving a manager in tests.
//!
//! Each `connect` consumes the next scripted [`Outcome`] (accepting once
//! the script runs out). An accepted connection hands the test a [`Peer`]:
//! the server side of the link.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tether::{Connection, ConnectionTarget, Connector};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accept,
    Refuse,
    /// Never completes; only a release ends the attempt.
    Hang,
}

enum Incoming {
    Frame(String),
    Close,
    Error,
}

#[derive(Default)]
struct Script {
    outcomes: VecDeque<Outcome>,
    attempts: Vec<(Instant, String)>,
}

#[derive(Clone)]
pub struct MockConnector {
    script: Arc<Mutex<Script>>,
    peers: mpsc::UnboundedSender<Peer>,
}

impl MockConnector {
    pub fn new(outcomes: impl IntoIterator<Item = Outcome>) -> (Self, Peers) {
        let (peers, rx) = mpsc::unbounded_channel();
        let script = Script {
            outcomes: outcomes.into_iter().collect(),
            attempts: Vec::new(),
        };
        let connector = Self {
            script: Arc::new(Mutex::new(script)),
            peers,
        };
        (connector, Peers(rx))
    }

    /// A connector that accepts every attempt.
    pub fn accepting() -> (Self, Peers) {
        Self::new(Vec::new())
    }

    pub fn attempts(&self) -> usize {
        self.script.lock().unwrap().attempts.len()
    }

    pub fn attempt_times(&self) -> Vec<Instant> {
        self.script
            .lock()
            .unwrap()
            .attempts
            .iter()
            .map(|(at, _)| *at)
            .collect()
    }

    pub fn attempt_targets(&self) -> Vec<String> {
        self.script
            .lock()
            .unwrap()
            .attempts
            .iter()
            .map(|(_, target)| target.clone())
            .collect()
    }

    pub fn push(&self, outcome: Outcome) {
        self.script.lock().unwrap().outcomes.push_back(outcome);
    }
}

impl Connector for MockConnector {
    type Connection = MockConnection;
    type Error = io::Error;

    async fn connect(&self, target: &ConnectionTarget) -> Result<MockConnection, io::Error> {
        let outcome = {
            let mut script = self.script.lock().unwrap();
            script
                .attempts
                .push((Instant::now(), target.as_str().to_string()));
            script.outcomes.pop_front().unwrap_or(Outcome::Accept)
        };

        match outcome {
            Outcome::Refuse => Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")),
            Outcome::Hang => std::future::pending().await,
            Outcome::Accept => {
                let (to_client, inbound) = mpsc::unbounded_channel();
                let (written_tx, written) = mpsc::unbounded_channel();
                let closed = Arc::new(AtomicBool::new(false));
                let _ = self.peers.send(Peer {
                    target: target.as_str().to_string(),
                    to_client,
                    written,
                    closed: Arc::clone(&closed),
                });
                Ok(MockConnection {
                    inbound: AsyncMutex::new(inbound),
                    written: written_tx,
                    closed,
                })
            }
        }
    }
}

pub struct MockConnection {
    inbound: AsyncMutex<mpsc::UnboundedReceiver<Incoming>>,
    written: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

impl Connection for MockConnection {
    type Error = io::Error;

    async fn send(&self, frame: &str) -> Result<(), io::Error> {
        let _ = self.written.send(frame.to_string());
        Ok(())
    }

    async fn recv(&self) -> Result<Option<String>, io::Error> {
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some(Incoming::Frame(frame)) => Ok(Some(frame)),
            Some(Incoming::Close) | None => Ok(None),
            Some(Incoming::Error) => Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        }
    }

    async fn close(&self) -> Result<(), io::Error> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Accepted connections, in order.
pub struct Peers(mpsc::UnboundedReceiver<Peer>);

impl Peers {
    pub async fn next(&mut self) -> Peer {
        tokio::time::timeout(Duration::from_secs(600), self.0.recv())
            .await
            .expect("no connection accepted")
            .expect("connector dropped")
    }
}

/// Server side of one accepted connection.
pub struct Peer {
    pub target: String,
    to_client: mpsc::UnboundedSender<Incoming>,
    written: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl Peer {
    pub fn send(&self, frame: &str) {
        let _ = self.to_client.send(Incoming::Frame(frame.to_string()));
    }

    pub fn close(&self) {
        let _ = self.to_client.send(Incoming::Close);
    }

    pub fn fail(&self) {
        let _ = self.to_client.send(Incoming::Error);
    }

    /// Whether the client closed this connection.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Next frame the client wrote, waiting up to `within`.
    pub async fn written_within(&mut self, within: Duration) -> Option<String> {
        tokio::time::timeout(within, self.written.recv())
            .await
            .ok()
            .flatten()
    }

    pub fn try_written(&mut self) -> Option<String> {
        self.written.try_recv().ok()
    }
}

/// Lets the actor and link tasks drain without moving the paused clock.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
