//! In-memory radio for driving the connection manager in tests.

#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use btlink::bluetooth::{
    Acceptor, BoxChannel, PeerAddress, PeerIdentity, RadioAdapter, ServiceId,
};
use btlink::{ConnectionEvent, ConnectionManager, LinkError, LinkSettings};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::mpsc;

pub const PEER: &str = "AA:BB:CC:DD:EE:FF";
pub const PEER_NAME: &str = "Test Phone";

/// Channel end that counts how many channels are alive.
///
/// Closing blocks the dropping thread for `teardown`, the way closing a
/// real RFCOMM socket can, and the channel counts as alive until then.
pub struct TrackedChannel {
    inner: DuplexStream,
    live: Arc<AtomicUsize>,
    teardown: Duration,
}

impl TrackedChannel {
    fn new(inner: DuplexStream, live: Arc<AtomicUsize>, teardown: Duration) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self {
            inner,
            live,
            teardown,
        }
    }
}

impl Drop for TrackedChannel {
    fn drop(&mut self) {
        if !self.teardown.is_zero() {
            std::thread::sleep(self.teardown);
        }
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AsyncRead for TrackedChannel {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TrackedChannel {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

type Inbound = io::Result<(DuplexStream, PeerIdentity)>;

/// Radio whose peers are the test itself.
///
/// Outgoing connections hand the remote end of a duplex pipe to the test
/// through `remotes`. Inbound connections are injected with `inject`, and
/// listener failures with `inject_error`.
pub struct FakeRadio {
    enabled: AtomicBool,
    fail_connect: AtomicBool,
    connect_delay: Mutex<Duration>,
    name_delay: Mutex<Duration>,
    teardown: Arc<Mutex<Duration>>,
    live: Arc<AtomicUsize>,
    max_live_at_open: AtomicUsize,
    opens: AtomicUsize,
    listens: AtomicUsize,
    remote_tx: mpsc::UnboundedSender<DuplexStream>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>>,
}

impl FakeRadio {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<DuplexStream>) {
        let (remote_tx, remote_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let radio = Arc::new(Self {
            enabled: AtomicBool::new(true),
            fail_connect: AtomicBool::new(false),
            connect_delay: Mutex::new(Duration::from_millis(50)),
            name_delay: Mutex::new(Duration::ZERO),
            teardown: Arc::new(Mutex::new(Duration::ZERO)),
            live: Arc::new(AtomicUsize::new(0)),
            max_live_at_open: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
            listens: AtomicUsize::new(0),
            remote_tx,
            inbound_tx,
            inbound_rx: Arc::new(tokio::sync::Mutex::new(inbound_rx)),
        });
        (radio, remote_rx)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock() = delay;
    }

    /// Delay the name lookup that follows a successful open.
    pub fn set_name_delay(&self, delay: Duration) {
        *self.name_delay.lock() = delay;
    }

    /// Make channels opened from now on take `teardown` to close.
    pub fn set_slow_teardown(&self, teardown: Duration) {
        *self.teardown.lock() = teardown;
    }

    /// Channels currently owned by someone.
    pub fn live_channels(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Most channels that were alive when a new one was opened.
    pub fn max_live_at_open(&self) -> usize {
        self.max_live_at_open.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn listens(&self) -> usize {
        self.listens.load(Ordering::SeqCst)
    }

    /// Simulate a peer connecting; returns the peer's end of the pipe.
    pub fn inject(&self, peer: PeerIdentity) -> DuplexStream {
        let (local, remote) = tokio::io::duplex(4096);
        self.inbound_tx.send(Ok((local, peer))).unwrap();
        remote
    }

    /// Make the pending accept fail with `kind`.
    pub fn inject_error(&self, kind: io::ErrorKind) {
        let error = io::Error::new(kind, "adapter reset");
        self.inbound_tx.send(Err(error)).unwrap();
    }

    fn track(&self, local: DuplexStream) -> BoxChannel {
        let live = self.live.load(Ordering::SeqCst);
        self.max_live_at_open.fetch_max(live, Ordering::SeqCst);
        let teardown = *self.teardown.lock();
        Box::new(TrackedChannel::new(local, Arc::clone(&self.live), teardown))
    }
}

struct FakeAcceptor {
    inbound: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>>,
    live: Arc<AtomicUsize>,
    teardown: Arc<Mutex<Duration>>,
}

#[async_trait]
impl Acceptor for FakeAcceptor {
    async fn accept(&mut self) -> io::Result<(BoxChannel, PeerIdentity)> {
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some(Ok((local, peer))) => {
                let teardown = *self.teardown.lock();
                let channel = TrackedChannel::new(local, Arc::clone(&self.live), teardown);
                Ok((Box::new(channel), peer))
            }
            Some(Err(error)) => Err(error),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "listener closed")),
        }
    }
}

#[async_trait]
impl RadioAdapter for FakeRadio {
    async fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn bonded_peers(&self) -> Result<Vec<PeerIdentity>, LinkError> {
        Ok(vec![PeerIdentity::new(PEER.parse()?, Some(PEER_NAME.to_string()))])
    }

    async fn open_listening(&self, _service: &ServiceId) -> io::Result<Box<dyn Acceptor>> {
        self.listens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeAcceptor {
            inbound: Arc::clone(&self.inbound_rx),
            live: Arc::clone(&self.live),
            teardown: Arc::clone(&self.teardown),
        }))
    }

    async fn open_outgoing(
        &self,
        _peer: &PeerAddress,
        _service: &ServiceId,
    ) -> io::Result<BoxChannel> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let delay = *self.connect_delay.lock();
        tokio::time::sleep(delay).await;

        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "host is down"));
        }

        let (local, remote) = tokio::io::duplex(4096);
        let channel = self.track(local);
        let _ = self.remote_tx.send(remote);
        Ok(channel)
    }

    async fn peer_name(&self, _peer: &PeerAddress) -> Option<String> {
        let delay = *self.name_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Some(PEER_NAME.to_string())
    }
}

/// Manager over a fake radio, plus the test-side ends.
pub struct Harness {
    pub manager: ConnectionManager,
    pub radio: Arc<FakeRadio>,
    pub events: mpsc::UnboundedReceiver<ConnectionEvent>,
    pub remotes: mpsc::UnboundedReceiver<DuplexStream>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(LinkSettings::default())
    }

    pub fn with_settings(settings: LinkSettings) -> Self {
        let (radio, remotes) = FakeRadio::new();
        let (event_tx, events) = mpsc::unbounded_channel();
        let manager = ConnectionManager::new(radio.clone(), Arc::new(event_tx), settings);
        Self {
            manager,
            radio,
            events,
            remotes,
        }
    }

    pub fn peer() -> PeerAddress {
        PEER.parse().unwrap()
    }

    /// Next event, failing the test if none arrives within two seconds.
    pub async fn next_event(&mut self) -> ConnectionEvent {
        tokio::time::timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    /// Assert nothing else is emitted for a little while.
    pub async fn assert_quiet(&mut self) {
        tokio::time::sleep(Duration::from_millis(150)).await;
        if let Ok(event) = self.events.try_recv() {
            panic!("unexpected event: {event:?}");
        }
    }

    /// The test's end of the most recent outgoing connection.
    pub async fn next_remote(&mut self) -> DuplexStream {
        tokio::time::timeout(Duration::from_secs(2), self.remotes.recv())
            .await
            .expect("timed out waiting for connection")
            .expect("remote channel closed")
    }

    /// Connect to the default peer and drain the resulting events.
    pub async fn connected(&mut self) -> DuplexStream {
        self.manager.connect(Self::peer()).await.unwrap();
        loop {
            let event = self.next_event().await;
            if let ConnectionEvent::StateChanged(btlink::ConnectionState::Connected) = event {
                break;
            }
        }
        self.next_remote().await
    }
}
