// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! btlink: terminal chat over a Bluetooth serial link.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use btlink::bluetooth::{encode_line, BluezRadio, LineDecoder, PeerAddress};
use btlink::config::Config;
use btlink::{ConnectionEvent, ConnectionManager, ConnectionState};

/// Pause before listening again after the link drops.
const RELISTEN_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(name = "btlink", version, about = "Chat with a peer over a Bluetooth serial link")]
struct Cli {
    /// Configuration file (defaults to the user config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Wait for a peer to connect.
    Listen,
    /// Connect to a peer.
    Connect {
        /// Peer address, e.g. AA:BB:CC:DD:EE:FF.
        address: PeerAddress,
    },
    /// List bonded peers.
    Peers,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("btlink=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!("Starting btlink v{}...", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!("Configuration loaded");

    let radio = Arc::new(BluezRadio::new().await?);
    if let Some(name) = &config.bluetooth.device_name {
        radio.set_name(name).await?;
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ConnectionEvent>();
    let manager = ConnectionManager::new(radio, Arc::new(event_tx), config.link_settings());

    let listen_mode = match cli.command {
        Command::Peers => {
            for peer in manager.bonded_peers().await? {
                println!("{}\t{}", peer.address, peer.name.as_deref().unwrap_or("-"));
            }
            return Ok(());
        }
        Command::Listen => {
            manager.listen().await?;
            true
        }
        Command::Connect { address } => {
            manager.connect(address).await?;
            false
        }
    };
    let relisten = listen_mode && config.bluetooth.relisten_on_disconnect;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut decoder = LineDecoder::new();

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => match event {
                ConnectionEvent::StateChanged(state) => {
                    info!("Status: {}", state);
                    if state != ConnectionState::Idle {
                        continue;
                    }
                    if let Some(line) = decoder.flush() {
                        println!("{line}");
                    }
                    if !relisten {
                        break;
                    }
                    tokio::time::sleep(RELISTEN_DELAY).await;
                    if let Err(e) = manager.listen().await {
                        error!("Failed to listen again: {}", e);
                        break;
                    }
                }
                ConnectionEvent::PeerIdentified(peer) => {
                    info!("Connected to {}", peer.display_name());
                }
                ConnectionEvent::BytesReceived(bytes) => {
                    for line in decoder.push(&bytes) {
                        println!("{line}");
                    }
                }
                ConnectionEvent::BytesSent(bytes) => {
                    debug!(">>> {}", String::from_utf8_lossy(&bytes).trim_end());
                }
                ConnectionEvent::TransientError(message) => {
                    warn!("{}", message);
                }
            },
            line = stdin.next_line() => match line? {
                Some(line) => {
                    if let Some(bytes) = encode_line(&line) {
                        if let Err(e) = manager.write(bytes) {
                            warn!("Message not sent: {}", e);
                        }
                    }
                }
                None => {
                    info!("Input closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    manager.stop().await;
    info!("btlink stopped");
    Ok(())
}
