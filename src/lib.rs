#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The root of the layer-2 tunnel library.
//! 二层隧道库的根。
//!
//! A tunnel bridges a local TAP device to a remote peer over either a reliable
//! multiplexed channel transport or a plain datagram socket. The [`relay`]
//! module moves frames in both directions, the [`gate`] sequences startup,
//! and the [`supervisor`] keeps an initiating endpoint connected.

pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod gate;
pub mod handler;
pub mod hook;
pub mod hotkey;
pub mod logging;
pub mod relay;
pub mod signal;
pub mod stats;
pub mod supervisor;
pub mod transport;
pub mod tunnel;

pub use config::Config;
pub use error::{Error, Result};
pub use tunnel::Tunnel;
