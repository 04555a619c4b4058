//! Builds every component from a [`Config`] and runs them.
//!
//! 根据 [`Config`] 构建所有组件并运行它们。
//!
//! Startup order:
//!
//! 1. the device and the transport are constructed concurrently; either
//!    failing aborts startup,
//! 2. both are installed into the relay (order does not matter, the relay
//!    loops wait on each other through the readiness gate),
//! 3. the post-connect command runs once,
//! 4. an initiating reliable endpoint starts its reconnect supervisor,
//! 5. optional statistics reporter and hotkey menu start.

use crate::{
    config::{Config, TransportKind},
    device::{Interface, TapDevice},
    error::{Error, Result},
    hook::PostConnect,
    hotkey,
    relay::Relay,
    stats::{self, RelayStats},
    supervisor::{ReconnectSupervisor, SessionState, SupervisorHandle},
    transport::{ChannelOptions, ChannelTransport, DatagramTransport, Transport},
};
use std::{net::SocketAddr, sync::Arc};
use tokio::task::JoinHandle;
use tracing::{error, info};

enum Engine<I: Interface> {
    Reliable(Relay<I, ChannelTransport>),
    Datagram(Relay<I, DatagramTransport>),
}

/// A running tunnel endpoint.
///
/// 正在运行的隧道端点。
pub struct Tunnel<I: Interface = TapDevice> {
    engine: Engine<I>,
    local_addr: SocketAddr,
    stats: Arc<RelayStats>,
    supervisor: Option<SupervisorHandle>,
    background: Vec<JoinHandle<()>>,
}

impl Tunnel<TapDevice> {
    /// Starts a tunnel on a real TAP device.
    ///
    /// 在真实的 TAP 设备上启动隧道。
    pub async fn start(config: Config) -> Result<Self> {
        let interface = config.interface.clone();
        Self::start_with(config, async move { TapDevice::create(&interface) }).await
    }
}

impl<I: Interface> Tunnel<I> {
    /// Starts a tunnel on whatever device `device` resolves to.
    ///
    /// 在 `device` 解析得到的设备上启动隧道。
    pub async fn start_with<F>(config: Config, device: F) -> Result<Self>
    where
        F: Future<Output = Result<I>>,
    {
        let stats = Arc::new(RelayStats::new());
        let capacity = config.interface.frame_capacity();
        let port = config.transport.port;

        let (engine, local_addr, supervisor) = match config.transport.kind {
            TransportKind::Reliable => {
                let options = ChannelOptions {
                    inbound_queue: config.transport.inbound_queue,
                    ..ChannelOptions::default()
                };
                let (device, transport) =
                    tokio::try_join!(device, ChannelTransport::listen(port, options))?;
                let transport = Arc::new(transport);
                let relay = Relay::new(capacity, stats.clone());
                let local_addr = assemble(&relay, device, transport.clone())?;
                fire_post_connect(&config).await;

                let supervisor = config.transport.remote.as_ref().map(|remote| {
                    ReconnectSupervisor::new(
                        transport,
                        remote.clone(),
                        &config.reconnect,
                        stats.clone(),
                    )
                    .spawn()
                });
                (Engine::Reliable(relay), local_addr, supervisor)
            }
            TransportKind::Datagram => {
                let remote = config.transport.remote.as_deref();
                let (device, transport) =
                    tokio::try_join!(device, DatagramTransport::bind(port, remote))?;
                let relay = Relay::new(capacity, stats.clone());
                let local_addr = assemble(&relay, device, Arc::new(transport))?;
                fire_post_connect(&config).await;
                (Engine::Datagram(relay), local_addr, None)
            }
        };

        let mut background = Vec::new();
        if config.stats.enabled {
            background.push(stats::spawn_reporter(stats.clone(), config.stats.interval));
        }
        if config.hotkey {
            background.push(hotkey::spawn_stdin(stats.clone()));
        }

        info!(
            interface = %config.interface.name,
            addr = %local_addr,
            remote = ?config.transport.remote,
            "tunnel started"
        );
        Ok(Self {
            engine,
            local_addr,
            stats,
            supervisor,
            background,
        })
    }

    /// Runs until the relay hits a fatal error, then returns that error.
    ///
    /// 运行直到中继遇到致命错误，然后返回该错误。
    pub async fn run(&self) -> Error {
        match &self.engine {
            Engine::Reliable(relay) => relay.run().await,
            Engine::Datagram(relay) => relay.run().await,
        }
    }

    /// Waits until the transport has somewhere to send frames.
    pub async fn destination_known(&self) {
        match &self.engine {
            Engine::Reliable(relay) => {
                relay.gate().destination_known().await;
            }
            Engine::Datagram(relay) => {
                relay.gate().destination_known().await;
            }
        }
    }

    /// The address the transport is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The relay counters.
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// The reconnect supervisor's state, on an initiating reliable endpoint.
    pub fn session_state(&self) -> Option<SessionState> {
        self.supervisor.as_ref().map(SupervisorHandle::state)
    }
}

impl<I: Interface> Drop for Tunnel<I> {
    fn drop(&mut self) {
        for task in self.background.drain(..) {
            task.abort();
        }
    }
}

/// Installs both sides into `relay` and returns the transport's local address.
fn assemble<I: Interface, T: Transport>(
    relay: &Relay<I, T>,
    device: I,
    transport: Arc<T>,
) -> Result<SocketAddr> {
    let local_addr = transport.local_addr()?;
    relay.install_transport(transport);
    relay.install_device(Arc::new(device));
    Ok(local_addr)
}

async fn fire_post_connect(config: &Config) {
    let Some(command) = config.post_connect.command.as_deref() else {
        return;
    };
    let mtu = config.interface.mtu.to_string();
    let trailing = config.post_connect.append_mtu.then_some(mtu.as_str());
    match PostConnect::parse(command, trailing) {
        Ok(hook) => hook.fire_and_log().await,
        Err(e) => error!(error = %e, "can't parse post connection command"),
    }
}
