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

//! The connection state machine.

use std::cell::Cell;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connection::ConnectedWorker;
use super::worker::{CancelSignal, WorkerHandle, WorkerRole};
use super::{accept, connect, LinkSettings};
use crate::bluetooth::{BoxChannel, PeerAddress, PeerIdentity, RadioAdapter};
use crate::error::{LinkError, Result};
use crate::events::EventSink;
use crate::state::{ConnectionState, LinkState};

thread_local! {
    /// Set while this thread is inside an [`EventSink`] callback.
    static IN_SINK: Cell<bool> = const { Cell::new(false) };
}

/// Clears `IN_SINK` on drop, including on unwind.
struct SinkScope;

impl SinkScope {
    fn enter() -> Self {
        IN_SINK.with(|flag| flag.set(true));
        SinkScope
    }
}

impl Drop for SinkScope {
    fn drop(&mut self) {
        IN_SINK.with(|flag| flag.set(false));
    }
}

/// Whether the current thread is running an event sink callback.
pub(crate) fn in_sink_callback() -> bool {
    IN_SINK.with(Cell::get)
}

/// Calling back into the manager from a sink would deadlock on the state lock.
fn assert_not_reentrant() {
    debug_assert!(
        !in_sink_callback(),
        "ConnectionManager called from inside an EventSink callback"
    );
}

/// State and event sink shared by the manager and its workers.
///
/// Every transition happens with `link` locked, and events are emitted
/// before the lock is released.
pub(crate) struct Shared {
    link: Mutex<LinkState>,
    sink: Arc<dyn EventSink>,
    settings: LinkSettings,
}

impl Shared {
    pub(crate) fn new(sink: Arc<dyn EventSink>, settings: LinkSettings) -> Self {
        Self {
            link: Mutex::new(LinkState::default()),
            sink,
            settings,
        }
    }

    pub(crate) fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    fn state(&self) -> ConnectionState {
        self.link.lock().state()
    }

    /// Run `emit` against the sink. Callers hold the state lock.
    fn notify<F>(&self, emit: F)
    where
        F: FnOnce(&dyn EventSink),
    {
        let _scope = SinkScope::enter();
        emit(self.sink.as_ref());
    }

    /// Open a new epoch in state `next`, handing back the superseded worker.
    fn supersede(&self, next: ConnectionState) -> (u64, Option<WorkerHandle>) {
        let mut link = self.link.lock();
        let (epoch, previous, changed) = link.supersede(next);
        if changed {
            info!("Connection state: {}", next);
            self.notify(|sink| sink.on_state_changed(next));
        }
        (epoch, previous)
    }

    /// Spawn and install a worker if `epoch` is still current.
    fn start_worker<F, Fut>(&self, epoch: u64, role: WorkerRole, start: F) -> bool
    where
        F: FnOnce(CancelSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut link = self.link.lock();
        if !link.is_current(epoch) {
            return false;
        }
        let handle = WorkerHandle::spawn(epoch, role, start);
        if let Some(stale) = link.install_worker(handle) {
            warn!(
                "Replaced unjoined {:?} worker from epoch {}",
                stale.role(),
                stale.epoch()
            );
        }
        true
    }

    /// Run `emit` against the sink if `epoch` is still current.
    ///
    /// Returns `false` when the caller has been superseded and should stop.
    pub(crate) fn emit_if_current<F>(&self, epoch: u64, emit: F) -> bool
    where
        F: FnOnce(&dyn EventSink),
    {
        let link = self.link.lock();
        if !link.is_current(epoch) {
            return false;
        }
        self.notify(emit);
        true
    }

    /// An inbound connection arrived on the listening channel.
    pub(crate) fn accept_incoming(
        self: &Arc<Self>,
        epoch: u64,
        channel: BoxChannel,
        peer: PeerIdentity,
    ) {
        let mut link = self.link.lock();
        if !link.is_current(epoch) || link.state() != ConnectionState::Listening {
            debug!("Discarding connection from {}: listener superseded", peer.address);
            drop(link);
            drop(channel);
            return;
        }
        self.establish(&mut link, epoch, channel, peer);
    }

    /// The listening channel failed for a reason other than cancellation.
    pub(crate) fn on_accept_failed(&self, epoch: u64, error: LinkError) {
        self.fall_back_to_idle(
            epoch,
            ConnectionState::Listening,
            &format!("Listen failed: {error}"),
        );
    }

    /// The outgoing attempt finished.
    pub(crate) fn on_connect_result(
        self: &Arc<Self>,
        epoch: u64,
        result: Result<(BoxChannel, PeerIdentity)>,
    ) {
        match result {
            Ok((channel, peer)) => {
                let mut link = self.link.lock();
                if !link.is_current(epoch) || link.state() != ConnectionState::Connecting {
                    debug!("Discarding channel to {}: attempt superseded", peer.address);
                    drop(link);
                    drop(channel);
                    return;
                }
                self.establish(&mut link, epoch, channel, peer);
            }
            Err(error) => {
                self.fall_back_to_idle(
                    epoch,
                    ConnectionState::Connecting,
                    &format!("Unable to connect device: {error}"),
                );
            }
        }
    }

    /// The connected worker's read or write loop failed.
    pub(crate) fn on_connection_lost(&self, epoch: u64, error: LinkError) {
        self.fall_back_to_idle(
            epoch,
            ConnectionState::Connected,
            &format!("Device connection was lost: {error}"),
        );
    }

    fn fall_back_to_idle(&self, epoch: u64, expected: ConnectionState, message: &str) {
        let mut link = self.link.lock();
        if !link.is_current(epoch) || link.state() != expected {
            debug!("Ignoring stale failure report: {}", message);
            return;
        }

        // The reporting worker keeps its handle until the next transition
        // joins it, since it may still be closing its channel.
        link.set_idle();
        warn!("{}", message);
        self.notify(|sink| {
            sink.on_state_changed(ConnectionState::Idle);
            sink.on_transient_error(message);
        });
    }

    /// Hand `channel` to a new connected worker and enter `Connected`.
    fn establish(
        self: &Arc<Self>,
        link: &mut LinkState,
        epoch: u64,
        channel: BoxChannel,
        peer: PeerIdentity,
    ) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let worker = ConnectedWorker::new(
            Arc::clone(self),
            epoch,
            channel,
            outbound_rx,
            self.settings.read_buffer_size,
        );
        let handle =
            WorkerHandle::spawn(epoch, WorkerRole::Connected, |cancel| worker.run(cancel));
        // Replaces the handle of the accept or connect worker calling us,
        // which has already given up the channel.
        drop(link.install_worker(handle));

        info!("Connected to {}", peer.display_name());
        link.set_connected(peer.clone(), outbound_tx);
        self.notify(|sink| {
            sink.on_peer_identified(&peer);
            sink.on_state_changed(ConnectionState::Connected);
        });
    }
}

/// Owns the link to a single peer.
///
/// `listen`, `connect` and `stop` are serialized against each other; each
/// one waits for the worker it supersedes to finish before returning.
/// Outcomes of the workers arrive through the [`EventSink`].
///
/// None of the methods may be called from inside an [`EventSink`]
/// callback: callbacks run under the state lock.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    radio: Arc<dyn RadioAdapter>,
    control: tokio::sync::Mutex<()>,
}

impl ConnectionManager {
    /// Create an idle manager.
    pub fn new(
        radio: Arc<dyn RadioAdapter>,
        sink: Arc<dyn EventSink>,
        settings: LinkSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new(sink, settings)),
            radio,
            control: tokio::sync::Mutex::new(()),
        }
    }

    /// Current state.
    ///
    /// Safe from any thread or task, but not from an [`EventSink`]
    /// callback; the state carried by `on_state_changed` is current there.
    pub fn state(&self) -> ConnectionState {
        assert_not_reentrant();
        self.shared.state()
    }

    /// The connected peer, if any.
    pub fn peer(&self) -> Option<PeerIdentity> {
        assert_not_reentrant();
        self.shared.link.lock().peer().cloned()
    }

    pub fn settings(&self) -> &LinkSettings {
        self.shared.settings()
    }

    /// Peers bonded with the local radio.
    pub async fn bonded_peers(&self) -> Result<Vec<PeerIdentity>> {
        self.ensure_radio().await?;
        self.radio.bonded_peers().await
    }

    /// Start accepting an inbound connection.
    ///
    /// Only valid from `Idle`; a second call while listening does nothing.
    pub async fn listen(&self) -> Result<()> {
        assert_not_reentrant();
        let _control = self.control.lock().await;

        match self.state() {
            ConnectionState::Idle => {}
            ConnectionState::Listening => return Ok(()),
            state => return Err(LinkError::Busy(state)),
        }

        self.ensure_radio().await?;
        let service = self.shared.settings.service;
        let acceptor = self.radio.open_listening(&service).await?;
        info!("Listening on RFCOMM channel {}", service.channel);

        let (epoch, previous) = self.shared.supersede(ConnectionState::Listening);
        if let Some(previous) = previous {
            previous.join().await;
        }

        let shared = Arc::clone(&self.shared);
        self.shared.start_worker(epoch, WorkerRole::Accept, move |cancel| {
            accept::run(shared, epoch, acceptor, cancel)
        });
        Ok(())
    }

    /// Connect to `peer`, abandoning whatever the link was doing.
    pub async fn connect(&self, peer: PeerAddress) -> Result<()> {
        assert_not_reentrant();
        let _control = self.control.lock().await;

        self.ensure_radio().await?;

        let (epoch, previous) = self.shared.supersede(ConnectionState::Connecting);
        if let Some(previous) = previous {
            previous.join().await;
        }

        let shared = Arc::clone(&self.shared);
        let radio = Arc::clone(&self.radio);
        self.shared.start_worker(epoch, WorkerRole::Connect, move |cancel| {
            connect::run(shared, radio, epoch, peer, cancel)
        });
        Ok(())
    }

    /// Queue `bytes` for sending.
    ///
    /// Fails with [`LinkError::NotConnected`] unless the link is connected,
    /// in which case nothing is queued.
    pub fn write(&self, bytes: impl Into<Vec<u8>>) -> Result<()> {
        assert_not_reentrant();
        let bytes = bytes.into();
        let link = self.shared.link.lock();
        if link.enqueue(bytes) {
            Ok(())
        } else {
            Err(LinkError::NotConnected)
        }
    }

    /// Tear down whatever is running and return to `Idle`.
    ///
    /// Also waits for a worker that already failed on its own to finish
    /// closing its channel.
    pub async fn stop(&self) {
        assert_not_reentrant();
        let _control = self.control.lock().await;

        let (_, previous) = self.shared.supersede(ConnectionState::Idle);
        if let Some(previous) = previous {
            previous.join().await;
        }
    }

    async fn ensure_radio(&self) -> Result<()> {
        if self.radio.is_enabled().await {
            Ok(())
        } else {
            warn!("Bluetooth radio is not enabled");
            Err(LinkError::RadioUnavailable)
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // Dropping the handle cancels the worker; nobody is left to wait on it.
        let (_, previous, _) = self.shared.link.lock().supersede(ConnectionState::Idle);
        drop(previous);
    }
}
