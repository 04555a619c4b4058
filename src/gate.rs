//! Startup sequencing between the two relay directions.
//!
//! 两个中继方向之间的启动顺序控制。
//!
//! The device and the transport are built concurrently and published into
//! the gate as they become available. Each relay loop waits on the side it
//! needs before touching it. Both slots go from empty to filled exactly once
//! and are never cleared.

use crate::{device::Interface, signal::OnceSignal, transport::Transport};
use std::{fmt, sync::Arc};
use tracing::debug;

/// Shared "device ready" / "transport destination known" state.
///
/// 共享的“设备就绪”/“传输目的地已知”状态。
pub struct ReadinessGate<I, T> {
    device: OnceSignal<Arc<I>>,
    transport: OnceSignal<Arc<T>>,
}

impl<I: Interface, T: Transport> ReadinessGate<I, T> {
    /// Creates a gate with both sides unset.
    pub fn new() -> Self {
        Self {
            device: OnceSignal::new(),
            transport: OnceSignal::new(),
        }
    }

    /// Publishes the device. Returns `false` if one was already published.
    pub fn publish_device(&self, device: Arc<I>) -> bool {
        let name = device.name().to_string();
        let published = self.device.set(device);
        if published {
            debug!(interface = %name, "device ready");
        }
        published
    }

    /// Publishes the transport. Returns `false` if one was already published.
    pub fn publish_transport(&self, transport: Arc<T>) -> bool {
        let published = self.transport.set(transport);
        if published {
            debug!("transport ready");
        }
        published
    }

    /// Waits until the device exists and returns it.
    ///
    /// 等待设备存在并返回它。
    pub async fn device_ready(&self) -> Arc<I> {
        self.device.wait().await
    }

    /// Waits until the transport exists and has at least one destination,
    /// then returns it.
    ///
    /// 等待传输存在且至少有一个目的地，然后返回它。
    pub async fn destination_known(&self) -> Arc<T> {
        let transport = self.transport.wait().await;
        transport.destination_known().await;
        transport
    }

    /// Returns `true` once the device was published.
    pub fn is_device_ready(&self) -> bool {
        self.device.is_set()
    }

    /// Returns the transport if it was published, whether or not it has a
    /// destination yet.
    pub fn transport(&self) -> Option<Arc<T>> {
        self.transport.get()
    }
}

impl<I: Interface, T: Transport> Default for ReadinessGate<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Interface, T: Transport> fmt::Debug for ReadinessGate<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("device", &self.device.is_set())
            .field("transport", &self.transport.is_set())
            .finish()
    }
}
