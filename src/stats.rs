//! Relay counters and the periodic statistics reporter.
//!
//! 中继计数器与周期性统计报告。

use crate::transport::Delivery;
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing::info;

/// Counters shared by the relay loops and the reconnect supervisor.
///
/// 中继循环与重连监督器共享的计数器。
#[derive(Debug, Default)]
pub struct RelayStats {
    frames_out: AtomicU64,
    bytes_out: AtomicU64,
    frames_in: AtomicU64,
    bytes_in: AtomicU64,
    inbound_errors: AtomicU64,
    peer_write_errors: AtomicU64,
    connect_attempts: AtomicU64,
    reconnects: AtomicU64,
}

/// A point-in-time copy of [`RelayStats`].
///
/// [`RelayStats`] 的某一时刻副本。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames read from the device and handed to the transport.
    pub frames_out: u64,
    /// Bytes of those frames.
    pub bytes_out: u64,
    /// Payloads received from the transport and written into the device.
    pub frames_in: u64,
    /// Bytes of those payloads.
    pub bytes_in: u64,
    /// Inbound transport events that were discarded.
    pub inbound_errors: u64,
    /// Per-destination send failures.
    pub peer_write_errors: u64,
    /// Connect attempts made by the supervisor.
    pub connect_attempts: u64,
    /// Sessions re-established after a failure.
    pub reconnects: u64,
}

impl RelayStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one frame forwarded towards the transport.
    pub fn record_outbound(&self, bytes: usize, delivery: Delivery) {
        self.frames_out.fetch_add(1, Ordering::Relaxed);
        self.bytes_out.fetch_add(bytes as u64, Ordering::Relaxed);
        self.peer_write_errors
            .fetch_add(delivery.failed as u64, Ordering::Relaxed);
    }

    /// Records one payload written into the device.
    pub fn record_inbound(&self, bytes: usize) {
        self.frames_in.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Records one discarded inbound event.
    pub fn record_inbound_error(&self) {
        self.inbound_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one connect attempt.
    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a session coming back after a failure.
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_out: self.frames_out.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            frames_in: self.frames_in.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            inbound_errors: self.inbound_errors.load(Ordering::Relaxed),
            peer_write_errors: self.peer_write_errors.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "out {} frames/{} bytes, in {} frames/{} bytes, inbound errors {}, \
             peer write errors {}, connect attempts {}, reconnects {}",
            self.frames_out,
            self.bytes_out,
            self.frames_in,
            self.bytes_in,
            self.inbound_errors,
            self.peer_write_errors,
            self.connect_attempts,
            self.reconnects,
        )
    }
}

/// Logs a snapshot at `info` every `interval`, starting one interval from now.
///
/// 每隔 `interval` 以 `info` 级别记录一次快照。
pub fn spawn_reporter(stats: Arc<RelayStats>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let snapshot = stats.snapshot();
            info!(
                frames_out = snapshot.frames_out,
                frames_in = snapshot.frames_in,
                inbound_errors = snapshot.inbound_errors,
                peer_write_errors = snapshot.peer_write_errors,
                "statistics: {snapshot}"
            );
        }
    })
}
