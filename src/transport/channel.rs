//! Reliable multiplexed channel transport.
//!
//! 可靠的多路复用通道传输。
//!
//! A [`ChannelTransport`] listens on one local port and keeps a live set of
//! channels, one per remote peer, whether the peer connected to us or we
//! connected to it. Every channel gets a reader task that decodes frames and
//! runs each resulting event through the handler chain; events nobody
//! consumes are queued for [`Transport::recv`].

pub mod codec;

use super::{resolve, ChannelId, Connector, Delivery, Inbound, Transport};
use crate::{
    error::{Error, Result},
    handler::{ChannelEvent, Disposition, HandlerChain, InboundHandler, TraceHandler},
    signal::OnceSignal,
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::{mapref::entry::Entry, DashMap};
use std::{
    fmt,
    net::{Ipv4Addr, SocketAddr},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::{
    io::AsyncWriteExt,
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, trace, warn};

/// Options accepted by [`ChannelTransport::listen`].
///
/// [`ChannelTransport::listen`] 接受的选项。
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Largest frame accepted from a peer. Larger frames close the channel.
    /// 从对端接受的最大帧。更大的帧会关闭通道。
    pub max_frame_len: usize,
    /// Capacity of the queue between channel readers and `recv`.
    /// 通道读取任务与 `recv` 之间队列的容量。
    pub inbound_queue: usize,
    /// Handlers every inbound event runs through before the default sink.
    /// 每个入站事件在到达默认汇之前经过的处理器。
    pub handlers: HandlerChain,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            max_frame_len: 65_535,
            inbound_queue: 1024,
            handlers: HandlerChain::new().with(0, Arc::new(TraceHandler)),
        }
    }
}

/// One live connection to a remote peer.
///
/// 到一个远端的活动连接。
pub struct Channel {
    id: ChannelId,
    addr: SocketAddr,
    writer: Mutex<OwnedWriteHalf>,
    closed: AtomicBool,
    stop: OnceSignal<()>,
}

impl Channel {
    /// The channel identifier.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// The remote address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns `true` once the channel left the live set.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Writes one frame to the peer.
    ///
    /// Concurrent writers never interleave: each frame goes out whole.
    ///
    /// 向对端写入一个帧。并发写入者不会交错：每个帧完整发出。
    pub async fn write_to(&self, payload: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let mut buf = BytesMut::with_capacity(codec::HEADER_LEN + payload.len());
        codec::encode(payload, &mut buf)?;
        self.writer.lock().await.write_all(&buf).await?;
        Ok(())
    }

    /// Marks the channel closed and tells its reader to stop.
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.stop.set(());
    }

    async fn shutdown(&self) {
        if let Err(e) = self.writer.lock().await.shutdown().await {
            trace!(channel = %self.id, error = %e, "channel shutdown failed");
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// State shared between the transport handle and its background tasks.
struct Shared {
    channels: DashMap<ChannelId, Arc<Channel>>,
    handlers: HandlerChain,
    inbound_tx: mpsc::Sender<Result<Inbound>>,
    destination: OnceSignal<()>,
    closing: OnceSignal<()>,
    max_frame_len: usize,
}

impl Shared {
    /// Adds `stream` to the live set and starts its reader.
    fn register(
        self: &Arc<Self>,
        stream: TcpStream,
        addr: SocketAddr,
        chain: HandlerChain,
    ) -> ChannelId {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%addr, error = %e, "can't disable Nagle on channel");
        }
        let (reader, writer) = stream.into_split();

        let channel = loop {
            let id = ChannelId(rand::random());
            if let Entry::Vacant(slot) = self.channels.entry(id) {
                let channel = Arc::new(Channel {
                    id,
                    addr,
                    writer: Mutex::new(writer),
                    closed: AtomicBool::new(false),
                    stop: OnceSignal::new(),
                });
                slot.insert(channel.clone());
                break channel;
            }
        };

        if self.destination.set(()) {
            debug!(channel = %channel.id, %addr, "first channel registered");
        }

        let id = channel.id;
        tokio::spawn(channel_reader(self.clone(), channel, reader, chain));
        id
    }

    /// Removes a channel from the live set. Idempotent.
    fn remove(&self, id: ChannelId) -> bool {
        match self.channels.remove(&id) {
            Some((_, channel)) => {
                channel.close();
                true
            }
            None => false,
        }
    }

    /// Runs `event` through `chain`, queueing it for the relay unless consumed.
    async fn dispatch(&self, event: ChannelEvent, chain: &HandlerChain) {
        if chain.dispatch(&event) == Disposition::Consumed {
            return;
        }
        let item = match event {
            ChannelEvent::Packet {
                channel,
                addr,
                payload,
            } => Ok(Inbound {
                from: addr,
                channel: Some(channel),
                payload,
            }),
            ChannelEvent::Failed { error, .. } => Err(error),
        };
        if self.inbound_tx.send(item).await.is_err() {
            trace!("inbound queue closed, dropping event");
        }
    }
}

/// Reads frames from one channel until it fails, is closed locally, or the
/// transport closes.
///
/// A failure or a local close removes the channel, shuts its write side and
/// dispatches exactly one `Failed` event through `chain`.
async fn channel_reader(
    shared: Arc<Shared>,
    channel: Arc<Channel>,
    mut reader: OwnedReadHalf,
    chain: HandlerChain,
) {
    loop {
        let result = tokio::select! {
            biased;
            _ = shared.closing.wait() => return,
            _ = channel.stop.wait() => Err(Error::ConnectionClosed),
            result = codec::read_frame(&mut reader, shared.max_frame_len) => result,
        };

        let event = match result {
            Ok(payload) => ChannelEvent::Packet {
                channel: channel.id,
                addr: channel.addr,
                payload,
            },
            Err(error) => {
                shared.remove(channel.id);
                channel.shutdown().await;
                info!(channel = %channel.id, addr = %channel.addr, %error, "channel closed");
                let event = ChannelEvent::Failed {
                    channel: channel.id,
                    addr: channel.addr,
                    error,
                };
                shared.dispatch(event, &chain).await;
                return;
            }
        };
        shared.dispatch(event, &chain).await;
    }
}

/// Accepts incoming channels until the transport closes.
async fn accept_loop(shared: Arc<Shared>, listener: TcpListener) {
    loop {
        let accepted = tokio::select! {
            _ = shared.closing.wait() => return,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, addr)) => {
                let id = shared.register(stream, addr, shared.handlers.clone());
                info!(channel = %id, %addr, "channel accepted");
            }
            Err(e) => warn!(error = %e, "accept failed"),
        }
    }
}

/// A transport with one channel per remote peer, multiplexed on one local port.
///
/// 每个远端一个通道、在一个本地端口上多路复用的传输。
pub struct ChannelTransport {
    shared: Arc<Shared>,
    inbound_rx: Mutex<mpsc::Receiver<Result<Inbound>>>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl ChannelTransport {
    /// Starts listening for channels on `port` (all interfaces).
    ///
    /// 在 `port`（所有接口）上开始监听通道。
    pub async fn listen(port: u16, options: ChannelOptions) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map_err(|source| Error::Listen { port, source })?;
        let local_addr = listener.local_addr()?;

        let (inbound_tx, inbound_rx) = mpsc::channel(options.inbound_queue.max(1));
        let shared = Arc::new(Shared {
            channels: DashMap::new(),
            handlers: options.handlers,
            inbound_tx,
            destination: OnceSignal::new(),
            closing: OnceSignal::new(),
            max_frame_len: options.max_frame_len,
        });

        let accept_task = tokio::spawn(accept_loop(shared.clone(), listener));
        info!(addr = %local_addr, "channel transport listening");

        Ok(Self {
            shared,
            inbound_rx: Mutex::new(inbound_rx),
            local_addr,
            accept_task,
        })
    }

    /// Opens a channel to `remote` with `observer` in front of the handler chain.
    ///
    /// 打开到 `remote` 的通道，`observer` 位于处理器链的最前面。
    pub async fn connect(
        &self,
        remote: &str,
        observer: Arc<dyn InboundHandler>,
    ) -> Result<ChannelId> {
        let addr = resolve(remote).await?;
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| Error::Connect {
                addr: remote.to_string(),
                source,
            })?;
        let id = self
            .shared
            .register(stream, addr, self.shared.handlers.prepended(observer));
        info!(channel = %id, %addr, "channel connected");
        Ok(id)
    }

    /// Returns a snapshot of the live channels.
    ///
    /// Channels that close after the snapshot stay in it; check
    /// [`Channel::is_closed`] or just let their writes fail.
    ///
    /// 返回活动通道的快照。
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.shared
            .channels
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Calls `f` once for every live channel.
    pub fn for_each_channel<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<Channel>),
    {
        for channel in self.channels() {
            if !channel.is_closed() {
                f(&channel);
            }
        }
    }

    /// The number of live channels.
    pub fn channel_count(&self) -> usize {
        self.shared.channels.len()
    }

    /// Closes a channel.
    ///
    /// The channel leaves the live set at once; its reader then shuts the
    /// connection down and reports one `Failed` event to the channel's
    /// handlers, the same way a peer hang-up does.
    ///
    /// 关闭一个通道。读取任务随后关闭连接，并像对端断开时一样向处理器报告一次 `Failed`。
    pub fn close_channel(&self, id: ChannelId) -> bool {
        self.shared.remove(id)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv(&self) -> Result<Inbound> {
        self.inbound_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(Error::ChannelClosed)?
    }

    async fn send(&self, frame: Bytes) -> Delivery {
        let mut delivery = Delivery::default();
        for channel in self.channels() {
            if channel.is_closed() {
                continue;
            }
            match channel.write_to(&frame).await {
                Ok(()) => delivery.delivered += 1,
                Err(error) => {
                    delivery.failed += 1;
                    warn!(
                        channel = %channel.id(),
                        addr = %channel.addr(),
                        %error,
                        "write to channel failed"
                    );
                    self.shared.remove(channel.id());
                }
            }
        }
        delivery
    }

    async fn destination_known(&self) {
        self.shared.destination.wait().await;
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

#[async_trait]
impl Connector for ChannelTransport {
    async fn connect(&self, remote: &str, observer: Arc<dyn InboundHandler>) -> Result<ChannelId> {
        ChannelTransport::connect(self, remote, observer).await
    }
}

impl fmt::Debug for ChannelTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelTransport")
            .field("local_addr", &self.local_addr)
            .field("channels", &self.shared.channels.len())
            .finish()
    }
}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        self.shared.closing.set(());
        self.accept_task.abort();
        for entry in self.shared.channels.iter() {
            entry.value().close();
        }
        self.shared.channels.clear();
    }
}
