//! tests/common/harness.rs
use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;
use tapbridge::config::{Config, TransportKind};
use tapbridge::device::{MemoryInterface, MemoryPeer};
use tapbridge::Tunnel;
use tokio::time::timeout;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(10);

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tapbridge=debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// A config for one endpoint on an OS-chosen port.
pub fn endpoint_config(kind: TransportKind, remote: Option<SocketAddr>) -> Config {
    let mut config = Config::default();
    config.transport.kind = kind;
    config.transport.port = 0;
    config.transport.remote = remote.map(|addr| addr.to_string());
    config.reconnect.retry_delay = Duration::from_millis(10);
    config
}

/// One running endpoint plus the "kernel" side of its device.
pub struct Endpoint {
    pub tunnel: Tunnel<MemoryInterface>,
    pub device: MemoryPeer,
}

impl Endpoint {
    /// Starts an endpoint backed by an in-memory device.
    pub async fn start(name: &str, config: Config) -> Self {
        init_tracing();
        let (interface, device) = MemoryInterface::new(name);
        let tunnel = Tunnel::start_with(config, async move { Ok(interface) })
            .await
            .unwrap();
        Self { tunnel, device }
    }

    /// The loopback address peers should dial.
    pub fn loopback(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.tunnel.local_addr().port()))
    }

    /// Waits until the endpoint has somewhere to send frames.
    pub async fn wait_destination(&self) {
        timeout(WAIT, self.tunnel.destination_known())
            .await
            .expect("destination never became known");
    }

    /// Waits for the next frame the tunnel writes into the device.
    pub async fn next_written(&mut self) -> Vec<u8> {
        timeout(WAIT, self.device.next_written())
            .await
            .expect("no frame arrived")
            .expect("device output closed")
            .to_vec()
    }
}

/// Builds an Ethernet frame from `src` to broadcast carrying `payload`.
pub fn ethernet_frame(src: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0xff; 6];
    frame.extend_from_slice(&[0x02, 0, 0, 0, 0, src]);
    frame.extend_from_slice(&[0x08, 0x00]);
    frame.extend_from_slice(payload);
    frame
}
