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

//! Radio capability interface consumed by the link core.

use std::fmt;
use std::io;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use uuid::Uuid;

use crate::error::LinkError;

/// Standard SPP UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// RFCOMM channel to use.
pub const RFCOMM_CHANNEL: u8 = 1;

/// A six-octet Bluetooth device address, written `AA:BB:CC:DD:EE:FF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddress([u8; 6]);

impl PeerAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for PeerAddress {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LinkError::InvalidAddress(s.to_string());
        let mut octets = [0u8; 6];
        let mut parts = s.trim().split(':');

        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(octets))
    }
}

/// The remote end of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    pub address: PeerAddress,
    pub name: Option<String>,
}

impl PeerIdentity {
    pub fn new(address: PeerAddress, name: Option<String>) -> Self {
        Self { address, name }
    }

    /// Human-readable name, falling back to the address.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.address.to_string())
    }
}

/// Service both peers rendezvous on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceId {
    pub uuid: Uuid,
    pub channel: u8,
}

impl Default for ServiceId {
    fn default() -> Self {
        Self {
            uuid: SPP_UUID,
            channel: RFCOMM_CHANNEL,
        }
    }
}

/// Duplex byte stream to a single peer.
pub trait Channel: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Channel for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

pub type BoxChannel = Box<dyn Channel>;

/// An open listening socket.
///
/// Dropping the acceptor closes the socket, which is how a pending
/// `accept` is abandoned.
#[async_trait]
pub trait Acceptor: Send {
    /// Wait for the next inbound connection.
    async fn accept(&mut self) -> io::Result<(BoxChannel, PeerIdentity)>;
}

/// Capabilities the link core needs from the local radio.
#[async_trait]
pub trait RadioAdapter: Send + Sync + 'static {
    /// Whether the radio is present and powered.
    async fn is_enabled(&self) -> bool;

    /// Peers this device is bonded with.
    async fn bonded_peers(&self) -> Result<Vec<PeerIdentity>, LinkError>;

    /// Start listening for inbound connections on `service`.
    async fn open_listening(&self, service: &ServiceId) -> io::Result<Box<dyn Acceptor>>;

    /// Open a channel to `peer` on `service`.
    async fn open_outgoing(&self, peer: &PeerAddress, service: &ServiceId)
        -> io::Result<BoxChannel>;

    /// Friendly name of `peer`, if the radio knows one.
    async fn peer_name(&self, _peer: &PeerAddress) -> Option<String> {
        None
    }
}
