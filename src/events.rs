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

//! Event delivery to the application layer.

use tokio::sync::mpsc;
use tracing::debug;

use crate::bluetooth::PeerIdentity;
use crate::state::ConnectionState;

/// Events emitted by the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The manager moved to a new state.
    StateChanged(ConnectionState),
    /// A buffer was handed to the channel (successfully or not).
    BytesSent(Vec<u8>),
    /// Bytes read from the channel, exactly as many as were read.
    BytesReceived(Vec<u8>),
    /// The remote device of a new connection.
    PeerIdentified(PeerIdentity),
    /// A recoverable failure worth telling the user about.
    TransientError(String),
}

/// Receiver of connection notifications.
///
/// Callbacks are invoked while the manager's state lock is held, which is
/// what keeps them in transition order. Implementations must return
/// quickly and must not call back into the manager; debug builds panic if
/// they do instead of deadlocking.
pub trait EventSink: Send + Sync + 'static {
    fn on_state_changed(&self, state: ConnectionState);

    fn on_bytes_sent(&self, bytes: &[u8]);

    /// `bytes` holds exactly the received data; its length is the read length.
    fn on_bytes_received(&self, bytes: &[u8]);

    fn on_peer_identified(&self, peer: &PeerIdentity);

    fn on_transient_error(&self, message: &str);
}

impl EventSink for mpsc::UnboundedSender<ConnectionEvent> {
    fn on_state_changed(&self, state: ConnectionState) {
        forward(self, ConnectionEvent::StateChanged(state));
    }

    fn on_bytes_sent(&self, bytes: &[u8]) {
        forward(self, ConnectionEvent::BytesSent(bytes.to_vec()));
    }

    fn on_bytes_received(&self, bytes: &[u8]) {
        forward(self, ConnectionEvent::BytesReceived(bytes.to_vec()));
    }

    fn on_peer_identified(&self, peer: &PeerIdentity) {
        forward(self, ConnectionEvent::PeerIdentified(peer.clone()));
    }

    fn on_transient_error(&self, message: &str) {
        forward(self, ConnectionEvent::TransientError(message.to_string()));
    }
}

fn forward(tx: &mpsc::UnboundedSender<ConnectionEvent>, event: ConnectionEvent) {
    if tx.send(event).is_err() {
        debug!("Event receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_forwards_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink: &dyn EventSink = &tx;
        let peer = PeerIdentity::new("AA:BB:CC:DD:EE:FF".parse().unwrap(), Some("phone".into()));

        sink.on_peer_identified(&peer);
        sink.on_state_changed(ConnectionState::Connected);
        sink.on_bytes_received(&b"hello world"[..5]);

        assert_eq!(rx.try_recv().unwrap(), ConnectionEvent::PeerIdentified(peer));
        assert_eq!(
            rx.try_recv().unwrap(),
            ConnectionEvent::StateChanged(ConnectionState::Connected)
        );
        assert_eq!(rx.try_recv().unwrap(), ConnectionEvent::BytesReceived(b"hello".to_vec()));
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.on_transient_error("nobody listening");
    }
}
