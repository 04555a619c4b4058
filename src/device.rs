//! The virtual device abstraction.
//!
//! 虚拟设备抽象。
//!
//! An [`Interface`] is the local end of the tunnel: the kernel hands frames to
//! it through [`Interface::read`] and receives frames through
//! [`Interface::write`]. [`TapDevice`] is the production implementation,
//! [`MemoryInterface`] an in-process one for tests and loopback setups.

pub mod memory;
pub mod tap;

use async_trait::async_trait;

pub use memory::{MemoryInterface, MemoryPeer};
pub use tap::TapDevice;

/// An asynchronous frame source and sink.
///
/// Both calls block until the device is ready. Reads and writes may be issued
/// concurrently from different tasks; implementations must not serialize one
/// direction behind the other.
///
/// 异步的帧源与帧汇。读写可以从不同任务并发发起，实现不得让一个方向阻塞另一个方向。
#[async_trait]
pub trait Interface: Send + Sync + 'static {
    /// The interface name.
    fn name(&self) -> &str;

    /// Reads one frame into `buf` and returns its length.
    ///
    /// Frames longer than `buf` are truncated by the device.
    ///
    /// 读取一个帧到 `buf` 中并返回其长度。超过 `buf` 的帧会被设备截断。
    async fn read(&self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Writes one frame into the device.
    ///
    /// 向设备写入一个帧。
    async fn write(&self, frame: &[u8]) -> std::io::Result<()>;
}
