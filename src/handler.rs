//! Pluggable inbound event handling.
//!
//! 可插拔的入站事件处理。
//!
//! Every event produced by a transport channel runs through a
//! [`HandlerChain`]. Handlers are consulted in priority order; the first one
//! that returns [`Disposition::Consumed`] ends the dispatch. Events nobody
//! consumes fall through to the transport's default sink, which queues them
//! for the relay.

use crate::{error::Error, transport::ChannelId};
use bytes::Bytes;
use std::{fmt, net::SocketAddr, sync::Arc};
use tracing::debug;

/// Something that happened on one channel.
///
/// 某个通道上发生的事件。
#[derive(Debug)]
pub enum ChannelEvent {
    /// A payload arrived.
    /// 收到一个载荷。
    Packet {
        channel: ChannelId,
        addr: SocketAddr,
        payload: Bytes,
    },
    /// Reading or processing failed. The channel is gone after this event.
    /// 读取或处理失败。此事件之后通道即不存在。
    Failed {
        channel: ChannelId,
        addr: SocketAddr,
        error: Error,
    },
}

impl ChannelEvent {
    /// The channel the event belongs to.
    pub fn channel(&self) -> ChannelId {
        match self {
            ChannelEvent::Packet { channel, .. } | ChannelEvent::Failed { channel, .. } => *channel,
        }
    }

    /// The remote address of the channel.
    pub fn addr(&self) -> SocketAddr {
        match self {
            ChannelEvent::Packet { addr, .. } | ChannelEvent::Failed { addr, .. } => *addr,
        }
    }

    /// Returns `true` for [`ChannelEvent::Failed`].
    pub fn is_failure(&self) -> bool {
        matches!(self, ChannelEvent::Failed { .. })
    }
}

/// What a handler did with an event.
///
/// 处理器对事件的处理结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The event was fully handled; later handlers and the default sink skip it.
    /// 事件已被完全处理；后续处理器和默认汇将跳过它。
    Consumed,
    /// Let the next handler see the event.
    /// 让下一个处理器看到该事件。
    Pass,
}

/// A link in a [`HandlerChain`].
///
/// Handlers run on the channel's reader task and must not block.
///
/// [`HandlerChain`] 中的一环。处理器运行在通道的读取任务中，不得阻塞。
pub trait InboundHandler: Send + Sync + 'static {
    /// Inspects one event.
    fn handle(&self, event: &ChannelEvent) -> Disposition;
}

impl<F> InboundHandler for F
where
    F: Fn(&ChannelEvent) -> Disposition + Send + Sync + 'static,
{
    fn handle(&self, event: &ChannelEvent) -> Disposition {
        self(event)
    }
}

/// An ordered list of handlers.
///
/// Lower priority values run first; handlers with equal priority run in
/// insertion order.
///
/// 有序的处理器列表。优先级数值越小越先运行；相同优先级按插入顺序运行。
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<(i32, Arc<dyn InboundHandler>)>,
}

impl HandlerChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler at `priority`.
    pub fn add(&mut self, priority: i32, handler: Arc<dyn InboundHandler>) {
        let at = self.handlers.partition_point(|(p, _)| *p <= priority);
        self.handlers.insert(at, (priority, handler));
    }

    /// Builder form of [`HandlerChain::add`].
    pub fn with(mut self, priority: i32, handler: Arc<dyn InboundHandler>) -> Self {
        self.add(priority, handler);
        self
    }

    /// Returns a copy of this chain with `handler` in front of every other one.
    ///
    /// Used to attach a per-connection observer to the transport-wide chain.
    ///
    /// 返回此链的副本，`handler` 位于所有其他处理器之前。
    pub fn prepended(&self, handler: Arc<dyn InboundHandler>) -> Self {
        let mut chain = self.clone();
        chain.handlers.insert(0, (i32::MIN, handler));
        chain
    }

    /// Runs `event` through the chain.
    ///
    /// Returns [`Disposition::Pass`] when no handler consumed it, meaning the
    /// caller should apply its default handling.
    ///
    /// 让 `event` 经过整条链。若没有处理器消费它则返回 [`Disposition::Pass`]，
    /// 调用方应执行默认处理。
    pub fn dispatch(&self, event: &ChannelEvent) -> Disposition {
        for (_, handler) in &self.handlers {
            if handler.handle(event) == Disposition::Consumed {
                return Disposition::Consumed;
            }
        }
        Disposition::Pass
    }

    /// The number of handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if the chain has no handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let priorities: Vec<i32> = self.handlers.iter().map(|(p, _)| *p).collect();
        f.debug_struct("HandlerChain")
            .field("priorities", &priorities)
            .finish()
    }
}

/// Logs every event at debug level and passes it on.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceHandler;

impl InboundHandler for TraceHandler {
    fn handle(&self, event: &ChannelEvent) -> Disposition {
        match event {
            ChannelEvent::Packet {
                channel,
                addr,
                payload,
            } => debug!(%channel, %addr, len = payload.len(), "got packet"),
            ChannelEvent::Failed {
                channel,
                addr,
                error,
            } => debug!(%channel, %addr, %error, "got error in channel reader"),
        }
        Disposition::Pass
    }
}
