//! 定义了隧道中所有可能的错误类型。
//! Defines all possible error types in the tunnel.

use thiserror::Error;

/// The primary error type for the tunnel library.
/// 隧道库的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying I/O error occurred.
    /// 发生了底层的I/O错误。
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred during address parsing.
    /// 地址解析期间发生错误。
    #[error("Address parsing error: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    /// A host name resolved to no usable socket address.
    /// 主机名未解析出任何可用的套接字地址。
    #[error("can't resolve address {addr}")]
    Resolve { addr: String },

    /// The virtual device could not be created.
    /// 无法创建虚拟设备。
    #[error("can't create interface {name}, error: {source}")]
    DeviceCreate {
        name: String,
        #[source]
        source: tun::Error,
    },

    /// Reading a frame from the virtual device failed.
    /// 从虚拟设备读取帧失败。
    #[error("interface read failed: {0}")]
    DeviceRead(#[source] std::io::Error),

    /// Writing a frame into the virtual device failed.
    /// 向虚拟设备写入帧失败。
    #[error("interface write failed: {0}")]
    DeviceWrite(#[source] std::io::Error),

    /// The transport could not listen on or bind the local port.
    /// 传输无法监听或绑定本地端口。
    #[error("can't listen on port {port}, error: {source}")]
    Listen {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// A connect request to the remote peer failed.
    /// 向远端的连接请求失败。
    #[error("can't connect to {addr}, error: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The channel was closed by the peer.
    /// 通道被对端关闭。
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// An internal channel for communication between tasks was closed unexpectedly.
    /// 用于任务间通信的内部通道意外关闭。
    #[error("Internal channel is broken")]
    ChannelClosed,

    /// A received frame announced a length above the configured maximum.
    /// 接收到的帧声明的长度超过了配置的最大值。
    #[error("frame of {len} bytes exceeds maximum of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// The post-connect command string contained no program name.
    /// 连接后命令字符串不包含程序名。
    #[error("post connection command is empty")]
    EmptyCommand,
}

impl Error {
    /// Returns `true` when the error must terminate the tunnel.
    ///
    /// Construction failures and device I/O failures are fatal: a lost device
    /// cannot be recovered. Transport errors only describe an unhealthy peer.
    ///
    /// 当错误必须终止隧道时返回 `true`。
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::DeviceCreate { .. }
                | Error::DeviceRead(_)
                | Error::DeviceWrite(_)
                | Error::Listen { .. }
        )
    }
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::Io(e) | Error::DeviceRead(e) | Error::DeviceWrite(e) => e,
            Error::Listen { source, .. } | Error::Connect { source, .. } => source,
            Error::AddressParse(e) => std::io::Error::new(ErrorKind::InvalidInput, e),
            Error::Resolve { addr } => {
                std::io::Error::new(ErrorKind::NotFound, format!("can't resolve {addr}"))
            }
            Error::DeviceCreate { source, .. } => std::io::Error::other(source),
            Error::ConnectionClosed => ErrorKind::ConnectionReset.into(),
            Error::ChannelClosed => ErrorKind::BrokenPipe.into(),
            Error::FrameTooLarge { .. } => ErrorKind::InvalidData.into(),
            Error::EmptyCommand => ErrorKind::InvalidInput.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn device_errors_are_fatal() {
        let read = Error::DeviceRead(ErrorKind::BrokenPipe.into());
        let write = Error::DeviceWrite(ErrorKind::BrokenPipe.into());
        let listen = Error::Listen {
            port: 9000,
            source: ErrorKind::AddrInUse.into(),
        };
        assert!(read.is_fatal());
        assert!(write.is_fatal());
        assert!(listen.is_fatal());
    }

    #[test]
    fn transport_errors_are_transient() {
        assert!(!Error::ConnectionClosed.is_fatal());
        assert!(!Error::FrameTooLarge { len: 10, max: 5 }.is_fatal());
        let connect = Error::Connect {
            addr: "host:9000".into(),
            source: ErrorKind::ConnectionRefused.into(),
        };
        assert!(!connect.is_fatal());
    }

    #[test]
    fn io_conversion_keeps_kind() {
        let io: std::io::Error = Error::ConnectionClosed.into();
        assert_eq!(io.kind(), ErrorKind::ConnectionReset);
        let io: std::io::Error = Error::DeviceRead(ErrorKind::UnexpectedEof.into()).into();
        assert_eq!(io.kind(), ErrorKind::UnexpectedEof);
    }
}
