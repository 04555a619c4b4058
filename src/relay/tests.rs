use super::*;
use crate::{
    device::{MemoryInterface, MemoryPeer},
    error::Result,
    signal::OnceSignal,
    transport::{Delivery, Inbound},
};
use async_trait::async_trait;
use std::{io::ErrorKind, net::SocketAddr, time::Duration};
use tokio::{sync::Mutex as AsyncMutex, time::timeout};

const WAIT: Duration = Duration::from_secs(5);
const CAPACITY: usize = 1514;

/// A transport driven entirely by the test.
struct ScriptedTransport {
    inbound: AsyncMutex<mpsc::UnboundedReceiver<Result<Inbound>>>,
    sent: mpsc::UnboundedSender<Bytes>,
    destination: OnceSignal<()>,
    stalled: bool,
    failing_destinations: usize,
}

struct Script {
    inbound: mpsc::UnboundedSender<Result<Inbound>>,
    sent: mpsc::UnboundedReceiver<Bytes>,
}

impl ScriptedTransport {
    fn new() -> (Self, Script) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let transport = Self {
            inbound: AsyncMutex::new(inbound_rx),
            sent: sent_tx,
            destination: OnceSignal::new(),
            stalled: false,
            failing_destinations: 0,
        };
        let script = Script {
            inbound: inbound_tx,
            sent: sent_rx,
        };
        (transport, script)
    }

    fn with_destination(self) -> Self {
        self.destination.set(());
        self
    }
}

impl Script {
    fn deliver(&self, payload: &'static [u8]) {
        let inbound = Inbound {
            from: peer_addr(),
            channel: None,
            payload: Bytes::from_static(payload),
        };
        self.inbound.send(Ok(inbound)).unwrap();
    }

    fn fail(&self, error: Error) {
        self.inbound.send(Err(error)).unwrap();
    }

    async fn next_sent(&mut self) -> Bytes {
        timeout(WAIT, self.sent.recv()).await.unwrap().unwrap()
    }
}

fn peer_addr() -> SocketAddr {
    "192.0.2.1:9000".parse().unwrap()
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn recv(&self) -> Result<Inbound> {
        match self.inbound.lock().await.recv().await {
            Some(item) => item,
            None => std::future::pending().await,
        }
    }

    async fn send(&self, frame: Bytes) -> Delivery {
        if self.stalled {
            return std::future::pending().await;
        }
        self.sent.send(frame).unwrap();
        Delivery {
            delivered: 1,
            failed: self.failing_destinations,
        }
    }

    async fn destination_known(&self) {
        self.destination.wait().await;
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok("0.0.0.0:0".parse().unwrap())
    }
}

type TestRelay = Relay<MemoryInterface, ScriptedTransport>;

fn relay() -> TestRelay {
    Relay::new(CAPACITY, Arc::new(RelayStats::new()))
}

fn device() -> (Arc<MemoryInterface>, MemoryPeer) {
    let (device, peer) = MemoryInterface::new("mem0");
    (Arc::new(device), peer)
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn outbound_frames_wait_for_a_destination() {
    let relay = relay();
    let (device, peer) = device();
    let (transport, mut script) = ScriptedTransport::new();
    let transport = Arc::new(transport);

    relay.install_device(device);
    peer.inject(&b"early frame"[..]).await.unwrap();
    settle().await;
    assert!(script.sent.try_recv().is_err());

    relay.install_transport(transport.clone());
    settle().await;
    assert!(script.sent.try_recv().is_err());

    transport.destination.set(());
    assert_eq!(script.next_sent().await, Bytes::from_static(b"early frame"));
}

#[tokio::test]
async fn inbound_payloads_wait_for_the_device() {
    let relay = relay();
    let (transport, script) = ScriptedTransport::new();
    relay.install_transport(Arc::new(transport.with_destination()));

    script.deliver(b"before device");
    settle().await;

    let (device, mut peer) = device();
    assert!(peer.try_next_written().is_none());
    relay.install_device(device);

    let written = timeout(WAIT, peer.next_written()).await.unwrap().unwrap();
    assert_eq!(written, Bytes::from_static(b"before device"));
}

#[tokio::test]
async fn install_is_first_writer_wins() {
    let relay = relay();
    let (first, _first_peer) = device();
    let (second, _second_peer) = device();
    assert!(relay.install_device(first));
    assert!(!relay.install_device(second));

    let (a, _a) = ScriptedTransport::new();
    let (b, _b) = ScriptedTransport::new();
    assert!(relay.install_transport(Arc::new(a)));
    assert!(!relay.install_transport(Arc::new(b)));
}

#[tokio::test]
async fn each_direction_preserves_order() {
    let relay = relay();
    let (device, mut peer) = device();
    let (transport, mut script) = ScriptedTransport::new();
    relay.install_transport(Arc::new(transport.with_destination()));
    relay.install_device(device);

    for i in 0..64u8 {
        peer.inject(vec![i; 20]).await.unwrap();
        script
            .inbound
            .send(Ok(Inbound {
                from: peer_addr(),
                channel: None,
                payload: Bytes::from(vec![i; 30]),
            }))
            .unwrap();
    }
    for i in 0..64u8 {
        assert_eq!(script.next_sent().await, Bytes::from(vec![i; 20]));
        let written = timeout(WAIT, peer.next_written()).await.unwrap().unwrap();
        assert_eq!(written, Bytes::from(vec![i; 30]));
    }

    let snapshot = relay.stats().snapshot();
    assert_eq!(snapshot.frames_out, 64);
    assert_eq!(snapshot.bytes_out, 64 * 20);
}

#[tokio::test]
async fn device_read_failure_is_fatal() {
    let relay = relay();
    let (device, peer) = device();
    relay.install_device(device);

    peer.inject_error(ErrorKind::Other).await.unwrap();
    let error = timeout(WAIT, relay.run()).await.unwrap();
    assert!(matches!(error, Error::DeviceRead(_)));
    assert!(error.is_fatal());
}

#[tokio::test]
async fn device_write_failure_is_fatal() {
    let relay = relay();
    let (device, mut peer) = device();
    let (transport, script) = ScriptedTransport::new();
    relay.install_device(device);
    relay.install_transport(Arc::new(transport));

    peer.close_output();
    script.deliver(b"cannot land");
    let error = timeout(WAIT, relay.run()).await.unwrap();
    assert!(matches!(error, Error::DeviceWrite(_)));
}

#[tokio::test]
async fn transport_errors_are_skipped() {
    let relay = relay();
    let (device, mut peer) = device();
    let (transport, script) = ScriptedTransport::new();
    relay.install_device(device);
    relay.install_transport(Arc::new(transport));

    script.fail(Error::ConnectionClosed);
    script.fail(Error::FrameTooLarge { len: 70_000, max: 65_535 });
    script.deliver(b"still flowing");

    let written = timeout(WAIT, peer.next_written()).await.unwrap().unwrap();
    assert_eq!(written, Bytes::from_static(b"still flowing"));
    assert_eq!(relay.stats().snapshot().inbound_errors, 2);
    assert!(timeout(Duration::from_millis(20), relay.run()).await.is_err());
}

#[tokio::test]
async fn stalled_send_does_not_block_inbound() {
    let relay = relay();
    let (device, mut peer) = device();
    let (mut transport, script) = ScriptedTransport::new();
    transport.stalled = true;
    relay.install_transport(Arc::new(transport.with_destination()));
    relay.install_device(device);

    peer.inject(&b"stuck outbound"[..]).await.unwrap();
    settle().await;
    script.deliver(b"inbound");

    let written = timeout(WAIT, peer.next_written()).await.unwrap().unwrap();
    assert_eq!(written, Bytes::from_static(b"inbound"));
}

#[tokio::test]
async fn stalled_device_write_does_not_block_outbound() {
    let relay = relay();
    let (device, peer) = device();
    let (transport, mut script) = ScriptedTransport::new();
    relay.install_transport(Arc::new(transport.with_destination()));
    relay.install_device(device);

    peer.stall_writes();
    script.deliver(b"stuck inbound");
    settle().await;

    peer.inject(&b"outbound one"[..]).await.unwrap();
    peer.inject(&b"outbound two"[..]).await.unwrap();
    assert_eq!(script.next_sent().await, Bytes::from_static(b"outbound one"));
    assert_eq!(script.next_sent().await, Bytes::from_static(b"outbound two"));
    assert_eq!(relay.stats().snapshot().frames_in, 0);
}

#[tokio::test]
async fn peer_write_errors_are_counted_not_fatal() {
    let relay = relay();
    let (device, peer) = device();
    let (mut transport, mut script) = ScriptedTransport::new();
    transport.failing_destinations = 1;
    relay.install_transport(Arc::new(transport.with_destination()));
    relay.install_device(device);

    peer.inject(&b"one"[..]).await.unwrap();
    peer.inject(&b"two"[..]).await.unwrap();
    assert_eq!(script.next_sent().await, Bytes::from_static(b"one"));
    assert_eq!(script.next_sent().await, Bytes::from_static(b"two"));
    settle().await;

    assert_eq!(relay.stats().snapshot().peer_write_errors, 2);
    assert!(timeout(Duration::from_millis(20), relay.run()).await.is_err());
}

#[tokio::test]
async fn oversized_device_frames_are_cut_to_capacity() {
    let relay = Relay::new(16, Arc::new(RelayStats::new()));
    let (device, peer) = device();
    let (transport, mut script) = ScriptedTransport::new();
    relay.install_transport(Arc::new(transport.with_destination()));
    relay.install_device(device);

    peer.inject(vec![7u8; 40]).await.unwrap();
    assert_eq!(script.next_sent().await.len(), 16);
}
