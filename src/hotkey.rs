//! Interactive hotkeys on standard input.
//!
//! 标准输入上的交互式热键。

use crate::{error::Result, stats::RelayStats};
use std::sync::Arc;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    task::JoinHandle,
};
use tracing::debug;

const HELP: &str = "hotkeys:\n  s  show statistics\n  h  show this help\n";

/// Reads one command per line from `input` and answers on `output` until
/// `input` ends.
///
/// 从 `input` 每行读取一个命令并在 `output` 上应答，直到 `input` 结束。
pub async fn run_hotkeys<R, W>(input: R, stats: &RelayStats, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let reply = match line.trim() {
            "" => continue,
            "s" => format!("{}\n", stats.snapshot()),
            "h" | "?" => HELP.to_string(),
            other => format!("unknown hotkey {other:?}, press h for help\n"),
        };
        output.write_all(reply.as_bytes()).await?;
        output.flush().await?;
    }
    debug!("hotkey input closed");
    Ok(())
}

/// Serves hotkeys on the process's stdin and stdout.
pub fn spawn_stdin(stats: Arc<RelayStats>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let input = BufReader::new(tokio::io::stdin());
        if let Err(e) = run_hotkeys(input, &stats, tokio::io::stdout()).await {
            debug!(error = %e, "hotkey reader stopped");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Delivery;

    async fn session(input: &str, stats: &RelayStats) -> String {
        let mut out = Vec::new();
        run_hotkeys(input.as_bytes(), stats, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn s_prints_statistics() {
        let stats = RelayStats::new();
        stats.record_outbound(42, Delivery::default());
        let out = session("s\n", &stats).await;
        assert!(out.contains("out 1 frames/42 bytes"), "{out}");
    }

    #[tokio::test]
    async fn help_and_unknown_keys() {
        let stats = RelayStats::new();
        let out = session("h\n?\n\nx\n", &stats).await;
        assert_eq!(out.matches("show statistics").count(), 2);
        assert!(out.contains("unknown hotkey \"x\""));
    }

    #[tokio::test]
    async fn end_of_input_ends_the_session() {
        let stats = RelayStats::new();
        assert_eq!(session("", &stats).await, "");
    }
}
