//! Keeps an initiating endpoint connected.
//!
//! 保持发起端的连接。
//!
//! The supervisor cycles `Disconnected → Connecting → Connected` for the whole
//! life of the process. Each session gets a fresh [`SessionWatch`] attached in
//! front of the transport's handlers; the first failure event of that session
//! trips the watch and the supervisor connects again.

use crate::{
    config::ReconnectConfig,
    handler::{ChannelEvent, Disposition, InboundHandler},
    signal::OnceSignal,
    stats::RelayStats,
    transport::Connector,
};
use std::{fmt, sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

/// Where the supervisor is in its cycle.
///
/// 监督器在其循环中所处的位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Single-slot failure signal for one session.
///
/// Never consumes an event, so packets keep flowing to the relay.
///
/// 单个会话的单槽失败信号。从不消费事件，因此数据包会继续流向中继。
#[derive(Debug, Default)]
pub struct SessionWatch {
    failed: OnceSignal<()>,
}

impl SessionWatch {
    /// Creates an untripped watch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the session reported a failure.
    pub fn is_tripped(&self) -> bool {
        self.failed.is_set()
    }

    /// Waits for the session to fail.
    pub async fn tripped(&self) {
        self.failed.wait().await;
    }
}

impl InboundHandler for SessionWatch {
    fn handle(&self, event: &ChannelEvent) -> Disposition {
        if let ChannelEvent::Failed { channel, error, .. } = event {
            if self.failed.set(()) {
                debug!(%channel, %error, "session failure signaled");
            }
        }
        Disposition::Pass
    }
}

/// Reconnects to `remote` forever.
///
/// 永远重连到 `remote`。
pub struct ReconnectSupervisor<C> {
    connector: Arc<C>,
    remote: String,
    retry_delay: Duration,
    stats: Arc<RelayStats>,
    state: watch::Sender<SessionState>,
}

impl<C: Connector> ReconnectSupervisor<C> {
    /// Creates a supervisor in the `Disconnected` state.
    pub fn new(
        connector: Arc<C>,
        remote: impl Into<String>,
        config: &ReconnectConfig,
        stats: Arc<RelayStats>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            connector,
            remote: remote.into(),
            retry_delay: config.retry_delay,
            stats,
            state,
        }
    }

    /// The current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Runs the supervisor on its own task.
    ///
    /// 在独立任务上运行监督器。
    pub fn spawn(self) -> SupervisorHandle {
        let state = self.state.subscribe();
        let task = tokio::spawn(async move { self.run().await });
        SupervisorHandle { state, task }
    }

    /// Drives the connect cycle. Never returns.
    ///
    /// 驱动连接循环。永不返回。
    pub async fn run(&self) {
        let mut ever_connected = false;
        let mut failures_in_a_row: u64 = 0;

        loop {
            self.state.send_replace(SessionState::Connecting);
            self.stats.record_connect_attempt();

            let watch = Arc::new(SessionWatch::new());
            match self.connector.connect(&self.remote, watch.clone()).await {
                Ok(channel) => {
                    self.state.send_replace(SessionState::Connected);
                    if ever_connected {
                        self.stats.record_reconnect();
                        info!(
                            remote = %self.remote,
                            %channel,
                            after = failures_in_a_row,
                            "reconnected"
                        );
                    } else {
                        info!(remote = %self.remote, %channel, "connected");
                    }
                    ever_connected = true;
                    failures_in_a_row = 0;

                    watch.tripped().await;
                    self.state.send_replace(SessionState::Disconnected);
                    info!(remote = %self.remote, %channel, "session lost, reconnecting");
                }
                Err(error) => {
                    self.state.send_replace(SessionState::Disconnected);
                    failures_in_a_row += 1;
                    if failures_in_a_row == 1 {
                        warn!(remote = %self.remote, %error, "connect failed, retrying");
                    } else {
                        debug!(
                            remote = %self.remote,
                            %error,
                            attempt = failures_in_a_row,
                            "connect failed, retrying"
                        );
                    }
                    if self.retry_delay.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
    }
}

impl<C> fmt::Debug for ReconnectSupervisor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectSupervisor")
            .field("remote", &self.remote)
            .field("retry_delay", &self.retry_delay)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

/// A running supervisor. Dropping the handle stops it.
///
/// 正在运行的监督器。丢弃句柄即停止它。
#[derive(Debug)]
pub struct SupervisorHandle {
    state: watch::Receiver<SessionState>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// The current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Waits until the supervisor enters `target`.
    pub async fn wait_for(&mut self, target: SessionState) {
        // The sender lives in the task, which outlives any wait unless aborted.
        let _ = self.state.wait_for(|state| *state == target).await;
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
