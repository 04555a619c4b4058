//! TAP device backed by the `tun` crate.
//!
//! 基于 `tun` crate 的TAP设备。

use super::Interface;
use crate::{
    config::InterfaceConfig,
    error::{Error, Result},
};
use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf},
    sync::Mutex,
};
use tracing::info;
use tun::AsyncDevice;

/// A kernel TAP (Ethernet-layer) device.
///
/// The device is split into independent read and write halves so that the
/// two relay directions never wait on each other.
///
/// 内核TAP（以太网层）设备。设备被拆分为独立的读写两半，
/// 因此两个中继方向永远不会相互等待。
pub struct TapDevice {
    name: String,
    reader: Mutex<ReadHalf<AsyncDevice>>,
    writer: Mutex<WriteHalf<AsyncDevice>>,
}

impl TapDevice {
    /// Creates and brings up a TAP device with the configured name and MTU.
    ///
    /// Fails on a name collision or without `CAP_NET_ADMIN`. Must be called
    /// from within a Tokio runtime.
    ///
    /// 使用配置的名称和MTU创建并启用TAP设备。
    pub fn create(config: &InterfaceConfig) -> Result<Self> {
        let mut tun_config = tun::Configuration::default();
        tun_config
            .name(&config.name)
            .layer(tun::Layer::L2)
            .mtu(i32::try_from(config.mtu).unwrap_or(i32::MAX))
            .up();

        #[cfg(target_os = "linux")]
        tun_config.platform(|platform| {
            platform.packet_information(false);
        });

        let device = tun::create_as_async(&tun_config).map_err(|source| Error::DeviceCreate {
            name: config.name.clone(),
            source,
        })?;

        let (reader, writer) = tokio::io::split(device);
        info!(name = %config.name, mtu = config.mtu, "Interface created");

        Ok(Self {
            name: config.name.clone(),
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        })
    }
}

#[async_trait]
impl Interface for TapDevice {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.lock().await.read(buf).await
    }

    async fn write(&self, frame: &[u8]) -> std::io::Result<()> {
        self.writer.lock().await.write_all(frame).await
    }
}

impl std::fmt::Debug for TapDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapDevice").field("name", &self.name).finish()
    }
}
