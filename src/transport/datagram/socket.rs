//! The socket underneath [`DatagramTransport`](super::DatagramTransport).
//!
//! 数据报传输之下的套接字。
//!
//! Production runs on [`tokio::net::UdpSocket`]. [`MemorySocket`] stands in
//! for it when a test needs to decide exactly which sender's datagram arrives
//! first, something real loopback sockets cannot promise.

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::{io::ErrorKind, net::SocketAddr};
use tokio::{
    net::UdpSocket,
    sync::{mpsc, Mutex},
};

/// A bound socket that exchanges whole datagrams with arbitrary senders.
///
/// 与任意发送方交换完整数据报的已绑定套接字。
#[async_trait]
pub trait DatagramSocket: Send + Sync + 'static {
    /// Sends `buf` as one datagram to `target`.
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize>;

    /// Waits for the next datagram, copies it into `buf` (truncating) and
    /// returns its length and sender.
    ///
    /// 等待下一个数据报，复制到 `buf`（超长截断），返回其长度与发送方。
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;

    fn local_addr(&self) -> Result<SocketAddr>;
}

/// A [`DatagramSocket`] that can create itself from a local address.
#[async_trait]
pub trait BindableDatagramSocket: DatagramSocket + Sized {
    async fn bind(addr: SocketAddr) -> std::io::Result<Self>;
}

#[async_trait]
impl DatagramSocket for UdpSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        Ok(UdpSocket::send_to(self, buf, target).await?)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        Ok(UdpSocket::recv_from(self, buf).await?)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(UdpSocket::local_addr(self)?)
    }
}

#[async_trait]
impl BindableDatagramSocket for UdpSocket {
    async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        UdpSocket::bind(addr).await
    }
}

/// An in-process socket whose network is a [`MemoryWire`].
///
/// 网络由 [`MemoryWire`] 扮演的进程内套接字。
#[derive(Debug)]
pub struct MemorySocket {
    addr: SocketAddr,
    arrivals: Mutex<mpsc::UnboundedReceiver<(SocketAddr, Bytes)>>,
    departures: mpsc::UnboundedSender<(SocketAddr, Bytes)>,
}

/// The network side of a [`MemorySocket`]: queues arrivals, observes sends.
#[derive(Debug)]
pub struct MemoryWire {
    arrivals: mpsc::UnboundedSender<(SocketAddr, Bytes)>,
    departures: mpsc::UnboundedReceiver<(SocketAddr, Bytes)>,
}

impl MemorySocket {
    /// Creates a socket "bound" to `addr` and the wire feeding it.
    pub fn new(addr: SocketAddr) -> (Self, MemoryWire) {
        let (arrivals_tx, arrivals_rx) = mpsc::unbounded_channel();
        let (departures_tx, departures_rx) = mpsc::unbounded_channel();
        let socket = Self {
            addr,
            arrivals: Mutex::new(arrivals_rx),
            departures: departures_tx,
        };
        let wire = MemoryWire {
            arrivals: arrivals_tx,
            departures: departures_rx,
        };
        (socket, wire)
    }
}

#[async_trait]
impl DatagramSocket for MemorySocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        self.departures
            .send((target, Bytes::copy_from_slice(buf)))
            .map_err(|_| Error::Io(ErrorKind::BrokenPipe.into()))?;
        Ok(buf.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let (from, datagram) = self
            .arrivals
            .lock()
            .await
            .recv()
            .await
            .ok_or(Error::ChannelClosed)?;
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok((len, from))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.addr)
    }
}

impl MemoryWire {
    /// Queues a datagram from `from`. Arrival order is queue order.
    ///
    /// 排入一个来自 `from` 的数据报。到达顺序即排队顺序。
    pub fn deliver(&self, from: SocketAddr, payload: impl Into<Bytes>) -> Result<()> {
        self.arrivals
            .send((from, payload.into()))
            .map_err(|_| Error::ChannelClosed)
    }

    /// Waits for the next datagram the socket sent, with its target.
    pub async fn next_sent(&mut self) -> Option<(SocketAddr, Bytes)> {
        self.departures.recv().await
    }

    /// Makes every later send fail.
    pub fn cut(&mut self) {
        self.departures.close();
    }
}
