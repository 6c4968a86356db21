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

//! BlueZ-backed radio using RFCOMM sockets.

use async_trait::async_trait;
use bluer::rfcomm::{Listener, SocketAddr, Stream};
use bluer::{Adapter, Address, Session};
use std::io;
use tracing::{debug, info};

use super::radio::{Acceptor, BoxChannel, PeerAddress, PeerIdentity, RadioAdapter, ServiceId};
use crate::error::LinkError;

/// Radio backed by the default BlueZ adapter.
pub struct BluezRadio {
    adapter: Adapter,
    _session: Session,
}

impl BluezRadio {
    /// Open a BlueZ session on the default adapter.
    pub async fn new() -> Result<Self, LinkError> {
        info!("Initializing Bluetooth adapter...");

        let session = Session::new().await?;
        info!("BlueZ session created");

        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        Ok(Self {
            adapter,
            _session: session,
        })
    }

    /// Set the adapter alias seen by remote devices.
    pub async fn set_name(&self, name: &str) -> Result<(), LinkError> {
        self.adapter.set_alias(name.to_string()).await?;
        info!("Bluetooth name set to: {}", name);
        Ok(())
    }

    /// Local adapter address.
    pub async fn address(&self) -> Result<PeerAddress, LinkError> {
        Ok(from_bluer(self.adapter.address().await?))
    }
}

#[async_trait]
impl RadioAdapter for BluezRadio {
    async fn is_enabled(&self) -> bool {
        match self.adapter.is_powered().await {
            Ok(powered) => powered,
            Err(e) => {
                debug!("Adapter power query failed: {}", e);
                false
            }
        }
    }

    async fn bonded_peers(&self) -> Result<Vec<PeerIdentity>, LinkError> {
        let mut peers = Vec::new();

        for addr in self.adapter.device_addresses().await? {
            let device = self.adapter.device(addr)?;
            if device.is_paired().await? {
                let name = device.alias().await.ok();
                peers.push(PeerIdentity::new(from_bluer(addr), name));
            }
        }

        Ok(peers)
    }

    async fn open_listening(&self, service: &ServiceId) -> io::Result<Box<dyn Acceptor>> {
        let local_addr = SocketAddr::new(Address::any(), service.channel);
        let listener = Listener::bind(local_addr).await?;
        info!(
            "RFCOMM server listening on channel {} (UUID: {})",
            service.channel, service.uuid
        );

        Ok(Box::new(RfcommAcceptor {
            listener,
            adapter: self.adapter.clone(),
        }))
    }

    async fn open_outgoing(
        &self,
        peer: &PeerAddress,
        service: &ServiceId,
    ) -> io::Result<BoxChannel> {
        let remote = SocketAddr::new(to_bluer(peer), service.channel);
        let stream = Stream::connect(remote).await?;
        Ok(Box::new(stream))
    }

    async fn peer_name(&self, peer: &PeerAddress) -> Option<String> {
        device_alias(&self.adapter, to_bluer(peer)).await
    }
}

/// Listening RFCOMM socket. Dropping it closes the socket.
struct RfcommAcceptor {
    listener: Listener,
    adapter: Adapter,
}

#[async_trait]
impl Acceptor for RfcommAcceptor {
    async fn accept(&mut self) -> io::Result<(BoxChannel, PeerIdentity)> {
        let (stream, remote) = self.listener.accept().await?;
        let name = device_alias(&self.adapter, remote.addr).await;
        Ok((Box::new(stream), PeerIdentity::new(from_bluer(remote.addr), name)))
    }
}

async fn device_alias(adapter: &Adapter, addr: Address) -> Option<String> {
    let device = adapter.device(addr).ok()?;
    device.alias().await.ok()
}

fn to_bluer(peer: &PeerAddress) -> Address {
    Address::new(peer.octets())
}

fn from_bluer(addr: Address) -> PeerAddress {
    PeerAddress::new(addr.0)
}
