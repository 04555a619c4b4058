//! Command line surface.
//!
//! 命令行界面。

use crate::{
    config::{
        Config, InterfaceConfig, LoggingConfig, PostConnectConfig, ReconnectConfig, StatsConfig,
        TransportConfig, TransportKind,
    },
    logging::LEVELS,
};
use clap::{builder::PossibleValuesParser, Parser, ValueEnum};
use std::time::Duration;

/// Transport variant as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    /// Reliable multiplexed channels.
    Reliable,
    /// Raw datagrams to one peer.
    Datagram,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Reliable => TransportKind::Reliable,
            TransportArg::Datagram => TransportKind::Datagram,
        }
    }
}

/// Bridges a local TAP interface to a remote peer.
#[derive(Debug, Parser)]
#[command(name = "tapbridge", version)]
#[command(about = "Bridges a local TAP interface to a remote peer")]
pub struct Cli {
    /// Interface name
    #[arg(short = 'n', long = "name")]
    pub name: String,

    /// Local port number
    #[arg(short = 'p', long = "port", default_value_t = 0)]
    pub port: u16,

    /// Remote address to connect to (host:port); makes this end the initiator
    #[arg(short = 'a', long = "addr")]
    pub remote: Option<String>,

    /// Transport variant
    #[arg(long, value_enum, default_value_t = TransportArg::Reliable)]
    pub transport: TransportArg,

    /// Log level
    #[arg(long, default_value = "connect", value_parser = PossibleValuesParser::new(LEVELS))]
    pub loglevel: String,

    /// Extra log filter directives, e.g. tapbridge::relay=trace
    #[arg(long)]
    pub logfilter: Option<String>,

    /// Print statistics periodically
    #[arg(long)]
    pub stat: bool,

    /// Seconds between two statistics reports
    #[arg(long, default_value_t = 10)]
    pub stat_interval: u64,

    /// Start the hotkey menu on stdin
    #[arg(long)]
    pub hotkey: bool,

    /// Post connection command
    #[arg(long = "pc")]
    pub post_connect: Option<String>,

    /// Append the MTU to the post connection command
    #[arg(long = "pc-mtu")]
    pub post_connect_mtu: bool,

    /// Maximum payload carried by one frame
    #[arg(long, alias = "datalen", default_value_t = 1500,
          value_parser = clap::value_parser!(u16).range(68..))]
    pub mtu: u16,

    /// Pause between reconnect attempts, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub reconnect_delay_ms: u64,
}

impl Cli {
    /// Resolves the parsed flags into a [`Config`].
    ///
    /// 将解析后的参数解析为 [`Config`]。
    pub fn into_config(self) -> Config {
        Config {
            interface: InterfaceConfig {
                name: self.name,
                mtu: usize::from(self.mtu),
            },
            transport: TransportConfig {
                kind: self.transport.into(),
                port: self.port,
                remote: self.remote.filter(|r| !r.trim().is_empty()),
                ..TransportConfig::default()
            },
            reconnect: ReconnectConfig {
                retry_delay: Duration::from_millis(self.reconnect_delay_ms),
            },
            post_connect: PostConnectConfig {
                command: self.post_connect.filter(|c| !c.trim().is_empty()),
                append_mtu: self.post_connect_mtu,
            },
            logging: LoggingConfig {
                level: self.loglevel,
                filter: self.logfilter,
            },
            stats: StatsConfig {
                enabled: self.stat,
                interval: Duration::from_secs(self.stat_interval.max(1)),
            },
            hotkey: self.hotkey,
        }
    }
}
