//! The bidirectional forwarding engine.
//!
//! 双向转发引擎。
//!
//! A [`Relay`] owns two independent loops:
//!
//! - device → transport: read one frame from the device, wait until the
//!   transport has a destination, send the frame to every destination.
//! - transport → device: receive one payload from the transport, wait until
//!   the device exists, write the payload into the device.
//!
//! Each loop starts as soon as the resource it reads from is installed and
//! waits on the [`ReadinessGate`] for the resource it writes to. Device read
//! and write failures end the relay; everything the transport reports is
//! logged and skipped.

use crate::{
    device::Interface,
    error::Error,
    frame::EthernetFrame,
    gate::ReadinessGate,
    stats::RelayStats,
    transport::Transport,
};
use bytes::Bytes;
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, trace, warn};

/// Forwards frames between one device and one transport.
///
/// 在一个设备与一个传输之间转发帧。
pub struct Relay<I: Interface, T: Transport> {
    gate: Arc<ReadinessGate<I, T>>,
    stats: Arc<RelayStats>,
    frame_capacity: usize,
    fatal_tx: mpsc::UnboundedSender<Error>,
    fatal_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Error>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<I: Interface, T: Transport> Relay<I, T> {
    /// Creates a relay with nothing installed.
    ///
    /// `frame_capacity` is the size of the device read buffer: the MTU plus
    /// the Ethernet header.
    ///
    /// 创建一个尚未安装任何资源的中继。`frame_capacity` 为设备读取缓冲区的大小。
    pub fn new(frame_capacity: usize, stats: Arc<RelayStats>) -> Self {
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        Self {
            gate: Arc::new(ReadinessGate::new()),
            stats,
            frame_capacity,
            fatal_tx,
            fatal_rx: tokio::sync::Mutex::new(fatal_rx),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The gate both loops wait on.
    pub fn gate(&self) -> &Arc<ReadinessGate<I, T>> {
        &self.gate
    }

    /// The shared counters.
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Installs the device and starts the device → transport loop.
    ///
    /// Returns `false`, and does nothing, if a device was already installed.
    ///
    /// 安装设备并启动设备 → 传输循环。若已安装过设备则返回 `false` 且不做任何事。
    pub fn install_device(&self, device: Arc<I>) -> bool {
        if !self.gate.publish_device(device.clone()) {
            return false;
        }
        let gate = self.gate.clone();
        let stats = self.stats.clone();
        let capacity = self.frame_capacity;
        self.spawn(device_to_transport(device, gate, stats, capacity));
        true
    }

    /// Installs the transport and starts the transport → device loop.
    ///
    /// Returns `false`, and does nothing, if a transport was already installed.
    ///
    /// 安装传输并启动传输 → 设备循环。若已安装过传输则返回 `false` 且不做任何事。
    pub fn install_transport(&self, transport: Arc<T>) -> bool {
        if !self.gate.publish_transport(transport.clone()) {
            return false;
        }
        let gate = self.gate.clone();
        let stats = self.stats.clone();
        self.spawn(transport_to_device(transport, gate, stats));
        true
    }

    /// Waits for the first fatal error of either loop and returns it.
    ///
    /// With nothing fatal happening this never returns.
    ///
    /// 等待任一循环的第一个致命错误并返回它。
    pub async fn run(&self) -> Error {
        match self.fatal_rx.lock().await.recv().await {
            Some(error) => error,
            // `self` holds a sender, so the queue stays open.
            None => Error::ChannelClosed,
        }
    }

    fn spawn<F>(&self, direction: F)
    where
        F: Future<Output = Error> + Send + 'static,
    {
        let fatal_tx = self.fatal_tx.clone();
        let handle = tokio::spawn(async move {
            let error = direction.await;
            error!(%error, "relay loop stopped");
            let _ = fatal_tx.send(error);
        });
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }
}

impl<I: Interface, T: Transport> fmt::Debug for Relay<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("gate", &self.gate)
            .field("frame_capacity", &self.frame_capacity)
            .finish()
    }
}

impl<I: Interface, T: Transport> Drop for Relay<I, T> {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

/// Device → transport. Returns only on a device read failure.
async fn device_to_transport<I: Interface, T: Transport>(
    device: Arc<I>,
    gate: Arc<ReadinessGate<I, T>>,
    stats: Arc<RelayStats>,
    capacity: usize,
) -> Error {
    let mut buf = vec![0u8; capacity];
    loop {
        let len = match device.read(&mut buf).await {
            Ok(len) => len,
            Err(e) => return Error::DeviceRead(e),
        };
        let frame = Bytes::copy_from_slice(&buf[..len]);
        match EthernetFrame::parse(&frame) {
            Some(eth) => trace!(
                len,
                src = %eth.source(),
                dst = %eth.destination(),
                ethertype = eth.ethertype(),
                "frame from device"
            ),
            None => trace!(len, "short frame from device"),
        }

        let transport = gate.destination_known().await;
        let delivery = transport.send(frame).await;
        if delivery.delivered == 0 {
            debug!(len, failed = delivery.failed, "frame reached no destination");
        }
        stats.record_outbound(len, delivery);
    }
}

/// Transport → device. Returns only on a device write failure.
async fn transport_to_device<I: Interface, T: Transport>(
    transport: Arc<T>,
    gate: Arc<ReadinessGate<I, T>>,
    stats: Arc<RelayStats>,
) -> Error {
    loop {
        let inbound = match transport.recv().await {
            Ok(inbound) => inbound,
            Err(error) => {
                warn!(%error, "inbound transport error, payload discarded");
                stats.record_inbound_error();
                tokio::task::yield_now().await;
                continue;
            }
        };
        trace!(from = %inbound.from, len = inbound.payload.len(), "payload from transport");

        let device = gate.device_ready().await;
        if let Err(e) = device.write(&inbound.payload).await {
            return Error::DeviceWrite(e);
        }
        stats.record_inbound(inbound.payload.len());
    }
}

#[cfg(test)]
mod tests;
