//! Watches a table over a resilient WebSocket connection.
//!
//! ```text
//! table-watch <ws-url> [player-name seat]
//! ```
//!
//! With only a URL it spectates and prints every state update. With a name
//! and seat it also asks for that seat each time the connection comes up.
//! Kill the server and restart it: the watcher reconnects by itself.
//!
//! `RUST_LOG=tether=debug` shows the connection lifecycle.

use serde_json::Value;
use tether::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

struct Seat {
    player_name: String,
    index: u32,
}

fn parse_args() -> Result<(String, Option<Seat>), String> {
    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .ok_or("usage: table-watch <ws-url> [player-name seat]")?;
    let seat = match (args.next(), args.next()) {
        (Some(player_name), Some(index)) => {
            let index = index
                .parse()
                .map_err(|_| format!("seat must be a number, got {index:?}"))?;
            Some(Seat { player_name, index })
        }
        (None, _) => None,
        (Some(_), None) => return Err("a player name needs a seat number".into()),
    };
    Ok((url, seat))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_envelope(env: InboundEnvelope) {
    match env.kind {
        InboundKind::StateUpdate | InboundKind::UpgradeSuccess => {
            let summary = match &env.state {
                Some(Value::Object(fields)) => fields
                    .iter()
                    .filter(|(_, v)| !v.is_object() && !v.is_array())
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(" "),
                Some(other) => other.to_string(),
                None => "(no state)".into(),
            };
            println!("[{}] {summary}", env.kind.as_str());
        }
        InboundKind::UpgradeFailed => {
            println!(
                "[upgrade_failed] {}",
                env.error.as_deref().unwrap_or("no reason given")
            );
        }
        InboundKind::Pong => {}
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tether=info")),
        )
        .init();

    let (url, seat) = parse_args()?;
    eprintln!("watching {url}");

    let manager =
        ConnectionManager::spawn(ManagerConfig::new(url), WebSocketConnector, print_envelope);
    let mut status = manager.status();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let connected = *status.borrow_and_update();
                eprintln!("{}", if connected { "connected" } else { "disconnected" });
                if let (true, Some(seat)) = (connected, &seat) {
                    let request = OutboundEnvelope::upgrade_to_player(&seat.player_name, seat.index);
                    if !manager.send(&request) {
                        tracing::warn!("seat request not sent, connection dropped again");
                    }
                }
            }
        }
    }

    manager.shutdown().await;
    Ok(())
}
