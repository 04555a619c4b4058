//! An in-process interface backed by channels.
//!
//! 基于通道的进程内接口。
//!
//! [`MemoryInterface`] behaves like a TAP device whose kernel side is a
//! [`MemoryPeer`]: frames injected through the peer are returned by `read`,
//! frames passed to `write` are handed back to the peer.

use super::Interface;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::ErrorKind,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::{mpsc, Mutex};

/// The device half handed to the relay.
#[derive(Debug)]
pub struct MemoryInterface {
    name: String,
    inbound: Mutex<mpsc::Receiver<std::io::Result<Bytes>>>,
    outbound: mpsc::UnboundedSender<Bytes>,
    stalled: Arc<AtomicBool>,
}

/// The "kernel" half: produces frames for the device and observes writes.
///
/// “内核”一侧：为设备产生帧并观察写入。
#[derive(Debug)]
pub struct MemoryPeer {
    inbound: mpsc::Sender<std::io::Result<Bytes>>,
    outbound: mpsc::UnboundedReceiver<Bytes>,
    stalled: Arc<AtomicBool>,
}

impl MemoryInterface {
    /// Creates a connected interface/peer pair.
    pub fn new(name: impl Into<String>) -> (Self, MemoryPeer) {
        let (inbound_tx, inbound_rx) = mpsc::channel(128);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let stalled = Arc::new(AtomicBool::new(false));
        let interface = Self {
            name: name.into(),
            inbound: Mutex::new(inbound_rx),
            outbound: outbound_tx,
            stalled: stalled.clone(),
        };
        let peer = MemoryPeer {
            inbound: inbound_tx,
            outbound: outbound_rx,
            stalled,
        };
        (interface, peer)
    }
}

#[async_trait]
impl Interface for MemoryInterface {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.inbound.lock().await.recv().await {
            Some(Ok(frame)) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(len)
            }
            Some(Err(e)) => Err(e),
            None => Err(ErrorKind::BrokenPipe.into()),
        }
    }

    async fn write(&self, frame: &[u8]) -> std::io::Result<()> {
        if self.stalled.load(Ordering::Acquire) {
            return std::future::pending().await;
        }
        self.outbound
            .send(Bytes::copy_from_slice(frame))
            .map_err(|_| ErrorKind::BrokenPipe.into())
    }
}

impl MemoryPeer {
    /// Makes the device produce `frame` on its next read.
    ///
    /// 使设备在下一次读取时产生 `frame`。
    pub async fn inject(&self, frame: impl Into<Bytes>) -> Result<()> {
        self.inbound
            .send(Ok(frame.into()))
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Makes the device's next read fail with `kind`.
    ///
    /// 使设备的下一次读取以 `kind` 失败。
    pub async fn inject_error(&self, kind: ErrorKind) -> Result<()> {
        self.inbound
            .send(Err(kind.into()))
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Waits for the next frame written into the device.
    pub async fn next_written(&mut self) -> Option<Bytes> {
        self.outbound.recv().await
    }

    /// Returns the next written frame without waiting.
    pub fn try_next_written(&mut self) -> Option<Bytes> {
        self.outbound.try_recv().ok()
    }

    /// Makes every later device write hang forever, like a wedged driver.
    ///
    /// 使之后的每次设备写入永久挂起。
    pub fn stall_writes(&self) {
        self.stalled.store(true, Ordering::Release);
    }

    /// Stops accepting writes; every later device write fails.
    pub fn close_output(&mut self) {
        self.outbound.close();
    }
}
