//! Transport layer abstraction for carrying frames to the remote peer.
//!
//! This module provides the interface the relay uses to exchange frames with
//! the peer, independent of whether a reliable multiplexed channel transport
//! or a raw datagram socket sits underneath.
//!
//! 向远端承载帧的传输层抽象。
//!
//! 此模块提供中继与对端交换帧所用的接口，与底层是可靠的多路复用通道传输
//! 还是原始数据报套接字无关。

pub mod channel;
pub mod datagram;

use crate::{
    error::{Error, Result},
    handler::InboundHandler,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::{fmt, net::SocketAddr, sync::Arc};

pub use channel::{Channel, ChannelOptions, ChannelTransport};
pub use datagram::{
    BindableDatagramSocket, DatagramSocket, DatagramTransport, MemorySocket, MemoryWire,
};

/// Identifies one live channel of a multiplexed transport.
///
/// 标识多路复用传输中的一个活动通道。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08x}", self.0)
    }
}

/// One payload received from the peer.
///
/// 从对端收到的一个载荷。
#[derive(Debug, Clone)]
pub struct Inbound {
    /// The sender's address.
    /// 发送方地址。
    pub from: SocketAddr,
    /// The channel it arrived on, for multiplexed transports.
    /// 对于多路复用传输，载荷到达的通道。
    pub channel: Option<ChannelId>,
    /// The frame bytes.
    /// 帧字节。
    pub payload: Bytes,
}

/// The outcome of forwarding one frame to every active destination.
///
/// 将一个帧转发到所有活动目的地的结果。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Destinations that accepted the frame.
    pub delivered: usize,
    /// Destinations whose write failed.
    pub failed: usize,
}

/// Transport layer interface used by the relay.
///
/// `recv` yields one inbound payload at a time, tagged with its sender; an
/// error describes one bad event and the next call may succeed. `send`
/// forwards a frame to every current destination and reports per-destination
/// failures in the returned [`Delivery`] instead of failing as a whole.
///
/// 中继使用的传输层接口。
///
/// `recv` 每次产生一个带发送方标记的入站载荷；错误仅描述一个坏事件，
/// 下一次调用可能成功。`send` 将帧转发到每个当前目的地，
/// 并在返回的 [`Delivery`] 中报告每个目的地的失败，而不是整体失败。
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Receives the next inbound payload.
    ///
    /// 接收下一个入站载荷。
    async fn recv(&self) -> Result<Inbound>;

    /// Sends `frame` to every active destination.
    ///
    /// 将 `frame` 发送到每个活动目的地。
    async fn send(&self, frame: Bytes) -> Delivery;

    /// Waits until at least one destination is known.
    ///
    /// Once this has returned it returns immediately forever after.
    ///
    /// 等待直到至少知道一个目的地。一旦返回，此后将永远立即返回。
    async fn destination_known(&self);

    /// Returns the local address this transport is bound to.
    ///
    /// 返回此传输绑定的本地地址。
    fn local_addr(&self) -> Result<SocketAddr>;
}

/// A transport that can open sessions to a remote peer.
///
/// `observer` is placed in front of the transport's handler chain for the new
/// session only. It sees every event of that session, including the failure
/// that ends it.
///
/// 可以向远端打开会话的传输。`observer` 仅为新会话放置在传输处理器链的最前面，
/// 它能看到该会话的每个事件，包括结束会话的失败。
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a session to `remote` (`host:port`).
    async fn connect(&self, remote: &str, observer: Arc<dyn InboundHandler>) -> Result<ChannelId>;
}

/// Resolves `host:port` to the first matching socket address.
pub(crate) async fn resolve(addr: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(addr)
        .await?
        .next()
        .ok_or_else(|| Error::Resolve {
            addr: addr.to_string(),
        })
}
