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

//! Connection state shared between the manager and its workers.

use std::fmt;

use tokio::sync::mpsc;

use crate::bluetooth::PeerIdentity;
use crate::link::WorkerHandle;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Nothing running.
    Idle,
    /// Waiting for an inbound connection.
    Listening,
    /// Outgoing attempt in flight.
    Connecting,
    /// Channel established, read and write loops running.
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Not connected",
            ConnectionState::Listening => "Listening...",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the manager and workers share, guarded by one lock.
///
/// The epoch advances on every manager-initiated transition. A worker is
/// started with the epoch current at the time and may only act on this
/// state while that epoch is still current.
#[derive(Debug)]
pub(crate) struct LinkState {
    state: ConnectionState,
    epoch: u64,
    worker: Option<WorkerHandle>,
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
    peer: Option<PeerIdentity>,
}

impl Default for LinkState {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            epoch: 0,
            worker: None,
            outbound: None,
            peer: None,
        }
    }
}

impl LinkState {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn peer(&self) -> Option<&PeerIdentity> {
        self.peer.as_ref()
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    /// Open a new epoch and move to `next`.
    ///
    /// The outbound queue and peer are dropped. The previous worker, if
    /// any, is signalled to cancel and handed back so the caller can wait
    /// for it outside the lock. Returns whether the visible state changed.
    pub fn supersede(&mut self, next: ConnectionState) -> (u64, Option<WorkerHandle>, bool) {
        self.epoch += 1;
        self.outbound = None;
        self.peer = None;
        let previous = self.worker.take().map(|mut worker| {
            worker.cancel();
            worker
        });
        let changed = self.state != next;
        self.state = next;
        (self.epoch, previous, changed)
    }

    /// Install the worker for the current epoch.
    pub fn install_worker(&mut self, worker: WorkerHandle) -> Option<WorkerHandle> {
        self.worker.replace(worker)
    }

    /// Move to `Connected` with the queue feeding the new connected worker.
    pub fn set_connected(
        &mut self,
        peer: PeerIdentity,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
    ) {
        self.state = ConnectionState::Connected;
        self.peer = Some(peer);
        self.outbound = Some(outbound);
    }

    /// Worker-initiated fall back to `Idle` within the current epoch.
    ///
    /// The reporting worker's handle stays installed: the worker may still
    /// own its channel, and the next `supersede` must join it.
    pub fn set_idle(&mut self) {
        self.state = ConnectionState::Idle;
        self.outbound = None;
        self.peer = None;
    }

    #[cfg(test)]
    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    /// Enqueue bytes for the write loop.
    pub fn enqueue(&self, bytes: Vec<u8>) -> bool {
        match (&self.state, &self.outbound) {
            (ConnectionState::Connected, Some(outbound)) => outbound.send(bytes).is_ok(),
            _ => false,
        }
    }
}
