//! Single-peer transport over a raw datagram socket.
//!
//! 基于原始数据报套接字的单对端传输。
//!
//! The peer is either configured up front or learned from the sender of the
//! first datagram that arrives. Once set it never changes: later datagrams
//! from other senders are still delivered, but replies keep going to the
//! first peer.

pub mod socket;

pub use socket::{BindableDatagramSocket, DatagramSocket, MemorySocket, MemoryWire};

use super::{resolve, Delivery, Inbound, Transport};
use crate::{
    error::{Error, Result},
    signal::OnceSignal,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    fmt,
    net::{Ipv4Addr, SocketAddr},
};
use tokio::{net::UdpSocket, sync::Mutex};
use tracing::{info, trace, warn};

/// Largest datagram the receive buffer holds.
pub const MAX_DATAGRAM: usize = 65_536;

/// A transport that exchanges frames with exactly one peer.
///
/// 与唯一一个对端交换帧的传输。
pub struct DatagramTransport<S: DatagramSocket = UdpSocket> {
    socket: S,
    peer: OnceSignal<SocketAddr>,
    recv_buf: Mutex<Vec<u8>>,
}

impl<S: BindableDatagramSocket> DatagramTransport<S> {
    /// Binds `port` on all interfaces. With `remote` the peer is fixed now,
    /// otherwise it is learned from the first inbound datagram.
    ///
    /// 在所有接口上绑定 `port`。给定 `remote` 时对端立即固定，
    /// 否则从第一个入站数据报中学习。
    pub async fn bind(port: u16, remote: Option<&str>) -> Result<Self> {
        let peer = match remote {
            Some(remote) => Some(resolve(remote).await?),
            None => None,
        };
        let socket = S::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
            .await
            .map_err(|source| Error::Listen { port, source })?;
        let transport = Self::with_socket(socket);
        if let Some(peer) = peer {
            transport.peer.set(peer);
        }
        info!(
            addr = ?transport.socket.local_addr().ok(),
            peer = ?peer,
            "datagram transport bound"
        );
        Ok(transport)
    }
}

impl<S: DatagramSocket> DatagramTransport<S> {
    /// Wraps an already bound socket. The peer starts out unknown.
    pub fn with_socket(socket: S) -> Self {
        Self {
            socket,
            peer: OnceSignal::new(),
            recv_buf: Mutex::new(vec![0u8; MAX_DATAGRAM]),
        }
    }

    /// The current peer, if known.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer.get()
    }
}

#[async_trait]
impl<S: DatagramSocket> Transport for DatagramTransport<S> {
    async fn recv(&self) -> Result<Inbound> {
        let mut buf = self.recv_buf.lock().await;
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        if self.peer.set(from) {
            info!(peer = %from, "peer address learned");
        }
        trace!(%from, len, "datagram received");
        Ok(Inbound {
            from,
            channel: None,
            payload: Bytes::copy_from_slice(&buf[..len]),
        })
    }

    async fn send(&self, frame: Bytes) -> Delivery {
        let Some(peer) = self.peer.get() else {
            return Delivery::default();
        };
        match self.socket.send_to(&frame, peer).await {
            Ok(_) => Delivery {
                delivered: 1,
                failed: 0,
            },
            Err(error) => {
                warn!(%peer, %error, "write to peer failed");
                Delivery {
                    delivered: 0,
                    failed: 1,
                }
            }
        }
    }

    async fn destination_known(&self) {
        self.peer.wait().await;
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl<S: DatagramSocket> fmt::Debug for DatagramTransport<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatagramTransport")
            .field("local_addr", &self.socket.local_addr().ok())
            .field("peer", &self.peer.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn sender() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").await.unwrap()
    }

    fn loopback<S: DatagramSocket>(transport: &DatagramTransport<S>) -> SocketAddr {
        let port = transport.local_addr().unwrap().port();
        SocketAddr::from((Ipv4Addr::LOCALHOST, port))
    }

    #[tokio::test]
    async fn first_sender_becomes_the_peer_for_good() {
        let transport = DatagramTransport::<UdpSocket>::bind(0, None).await.unwrap();
        assert_eq!(transport.peer(), None);

        let a = sender().await;
        let b = sender().await;
        a.send_to(b"from-a", loopback(&transport)).await.unwrap();
        let first = timeout(WAIT, transport.recv()).await.unwrap().unwrap();
        assert_eq!(first.from, a.local_addr().unwrap());

        b.send_to(b"from-b", loopback(&transport)).await.unwrap();
        let second = timeout(WAIT, transport.recv()).await.unwrap().unwrap();
        assert_eq!(second.payload, Bytes::from_static(b"from-b"));
        assert_eq!(transport.peer(), Some(a.local_addr().unwrap()));

        let delivery = transport.send(Bytes::from_static(b"reply")).await;
        assert_eq!(delivery.delivered, 1);
        let mut buf = [0u8; 16];
        let (n, _) = timeout(WAIT, a.recv_from(&mut buf)).await.unwrap().unwrap();
        assert_eq!(&buf[..n], b"reply");
    }

    fn addr(last: u8, port: u16) -> SocketAddr {
        SocketAddr::from(([192, 0, 2, last], port))
    }

    #[tokio::test]
    async fn queued_senders_settle_on_the_first_arrival() {
        let (socket, mut wire) = MemorySocket::new(addr(1, 4000));
        let transport = DatagramTransport::with_socket(socket);
        let (a, b) = (addr(10, 5000), addr(20, 6000));

        // Both datagrams are waiting before the transport reads anything.
        wire.deliver(a, &b"from-a"[..]).unwrap();
        wire.deliver(b, &b"from-b"[..]).unwrap();
        assert!(
            timeout(Duration::from_millis(20), transport.destination_known())
                .await
                .is_err()
        );

        let first = transport.recv().await.unwrap();
        let second = transport.recv().await.unwrap();
        assert_eq!((first.from, second.from), (a, b));
        assert_eq!(second.payload, Bytes::from_static(b"from-b"));
        assert_eq!(transport.peer(), Some(a));
        timeout(WAIT, transport.destination_known()).await.unwrap();

        for _ in 0..3 {
            wire.deliver(b, &b"again"[..]).unwrap();
            transport.recv().await.unwrap();
        }
        transport.send(Bytes::from_static(b"reply")).await;
        assert_eq!(
            wire.next_sent().await,
            Some((a, Bytes::from_static(b"reply")))
        );
    }

    #[tokio::test]
    async fn failed_send_is_reported_per_peer() {
        let (socket, mut wire) = MemorySocket::new(addr(1, 4000));
        let transport = DatagramTransport::with_socket(socket);
        wire.deliver(addr(10, 5000), &b"hello"[..]).unwrap();
        transport.recv().await.unwrap();

        wire.cut();
        let delivery = transport.send(Bytes::from_static(b"lost")).await;
        assert_eq!(delivery, Delivery { delivered: 0, failed: 1 });
    }

    #[tokio::test]
    async fn configured_remote_is_known_immediately() {
        let remote = sender().await;
        let remote_addr = remote.local_addr().unwrap().to_string();
        let transport = DatagramTransport::<UdpSocket>::bind(0, Some(&remote_addr))
            .await
            .unwrap();

        timeout(WAIT, transport.destination_known()).await.unwrap();
        transport.send(Bytes::from_static(b"hi")).await;
        let mut buf = [0u8; 16];
        let (n, from) = timeout(WAIT, remote.recv_from(&mut buf)).await.unwrap().unwrap();
        assert_eq!(&buf[..n], b"hi");
        assert_eq!(from.port(), transport.local_addr().unwrap().port());
    }

    #[tokio::test]
    async fn send_before_peer_is_known_goes_nowhere() {
        let transport = DatagramTransport::<UdpSocket>::bind(0, None).await.unwrap();
        assert_eq!(
            transport.send(Bytes::from_static(b"x")).await,
            Delivery::default()
        );
        assert!(
            timeout(Duration::from_millis(20), transport.destination_known())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn unresolvable_remote_fails_bind() {
        let err = DatagramTransport::<UdpSocket>::bind(0, Some("no-port-here"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_) | Error::Resolve { .. }));
    }
}
