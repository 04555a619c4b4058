//! 定义了隧道的可配置参数。
//! Defines configurable parameters for the tunnel.
//!
//! The configuration is resolved once at startup and handed to each component
//! by value or reference. Nothing reads process-wide state after that.

use std::time::Duration;

/// Size of the Ethernet header that precedes every frame payload.
pub const ETHERNET_HEADER_LEN: usize = 14;

/// A structure containing all configurable parameters for a tunnel.
///
/// 包含所有隧道可配置参数的结构体。
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Virtual device parameters.
    /// 虚拟设备参数。
    pub interface: InterfaceConfig,

    /// Transport-related parameters.
    /// 传输相关参数。
    pub transport: TransportConfig,

    /// Reconnect supervisor parameters.
    /// 重连监督参数。
    pub reconnect: ReconnectConfig,

    /// Post-connect command parameters.
    /// 连接后命令参数。
    pub post_connect: PostConnectConfig,

    /// Logging parameters.
    /// 日志参数。
    pub logging: LoggingConfig,

    /// Statistics reporting parameters.
    /// 统计报告参数。
    pub stats: StatsConfig,

    /// Whether the interactive hotkey menu is started.
    /// 是否启动交互式热键菜单。
    pub hotkey: bool,
}

/// Virtual device parameters.
///
/// 虚拟设备参数。
#[derive(Debug, Clone)]
pub struct InterfaceConfig {
    /// The interface name registered with the kernel.
    /// 向内核注册的接口名称。
    pub name: String,
    /// The maximum payload carried by one frame.
    /// 单个帧携带的最大载荷。
    pub mtu: usize,
}

impl InterfaceConfig {
    /// The capacity of the buffer a frame is read into: the MTU plus the
    /// Ethernet header.
    ///
    /// 读取帧所用缓冲区的容量：MTU加以太网头。
    pub fn frame_capacity(&self) -> usize {
        self.mtu + ETHERNET_HEADER_LEN
    }
}

/// Which transport variant carries frames between the peers.
///
/// 在两端之间承载帧的传输变体。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Reliable multiplexed channels, one per remote peer.
    /// 可靠的多路复用通道，每个远端一个。
    #[default]
    Reliable,
    /// A single bound datagram socket with one fixed or learned peer.
    /// 单个绑定的数据报套接字，对应一个固定或学习到的对端。
    Datagram,
}

/// Transport-related parameters.
///
/// 传输相关参数。
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// The transport variant.
    /// 传输变体。
    pub kind: TransportKind,
    /// The local port to listen on or bind. Zero lets the OS choose.
    /// 要监听或绑定的本地端口。为零时由操作系统选择。
    pub port: u16,
    /// The remote address (`host:port`). Its presence selects initiating mode.
    /// 远端地址（`host:port`）。存在时选择发起模式。
    pub remote: Option<String>,
    /// Capacity of the queue between transport readers and the relay.
    /// 传输读取任务与中继之间队列的容量。
    pub inbound_queue: usize,
}

impl TransportConfig {
    /// Returns `true` when this endpoint initiates the session.
    pub fn is_initiator(&self) -> bool {
        self.remote.is_some()
    }
}

/// Reconnect supervisor parameters.
///
/// 重连监督参数。
#[derive(Debug, Clone, Default)]
pub struct ReconnectConfig {
    /// Pause between a failed or lost session and the next connect attempt.
    /// Zero retries immediately.
    ///
    /// 会话失败或丢失后到下一次连接尝试之间的停顿。为零时立即重试。
    pub retry_delay: Duration,
}

/// Post-connect command parameters.
///
/// 连接后命令参数。
#[derive(Debug, Clone, Default)]
pub struct PostConnectConfig {
    /// The command line to run once the transport is up.
    /// 传输建立后运行的命令行。
    pub command: Option<String>,
    /// Append the configured MTU as the last argument.
    /// 将配置的MTU作为最后一个参数追加。
    pub append_mtu: bool,
}

/// Logging parameters.
///
/// 日志参数。
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The verbosity level name.
    /// 详细级别名称。
    pub level: String,
    /// Extra filter directives, comma separated.
    /// 额外的过滤指令，以逗号分隔。
    pub filter: Option<String>,
}

/// Statistics reporting parameters.
///
/// 统计报告参数。
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Whether statistics are periodically logged.
    /// 是否定期记录统计信息。
    pub enabled: bool,
    /// Interval between two reports.
    /// 两次报告之间的间隔。
    pub interval: Duration,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            name: "tapbridge".to_string(),
            mtu: 1500,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            port: 0,
            remote: None,
            inbound_queue: 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "connect".to_string(),
            filter: None,
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_capacity_includes_ethernet_header() {
        let interface = InterfaceConfig {
            name: "tap0".into(),
            mtu: 1400,
        };
        assert_eq!(interface.frame_capacity(), 1414);
    }

    #[test]
    fn remote_selects_initiating_mode() {
        let mut transport = TransportConfig::default();
        assert!(!transport.is_initiator());
        transport.remote = Some("host:9000".into());
        assert!(transport.is_initiator());
    }
}
