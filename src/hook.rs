//! The post-connect command.
//!
//! 连接后命令。
//!
//! A single shell-free command line, split on whitespace into a program and
//! its arguments, run once after the transport is up. Failures are logged and
//! otherwise ignored.

use crate::error::{Error, Result};
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{debug, error, info};

/// A parsed post-connect command.
///
/// 已解析的连接后命令。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostConnect {
    program: String,
    args: Vec<String>,
}

/// What the command printed and how it exited.
#[derive(Debug, Clone)]
pub struct HookOutput {
    pub status: ExitStatus,
    /// Standard output followed by standard error.
    pub combined: String,
}

impl PostConnect {
    /// Splits `command`, with `trailing` appended as the last argument.
    ///
    /// 拆分 `command`，并将 `trailing` 作为最后一个参数追加。
    pub fn parse(command: &str, trailing: Option<&str>) -> Result<Self> {
        let mut words = command
            .split_whitespace()
            .chain(trailing.into_iter().flat_map(str::split_whitespace))
            .map(str::to_string);
        let program = words.next().ok_or(Error::EmptyCommand)?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    /// The program to run.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Its arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Runs the command to completion and captures its output.
    ///
    /// 运行命令直至完成并捕获其输出。
    pub async fn fire(&self) -> Result<HookOutput> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await?;
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(HookOutput {
            status: output.status,
            combined,
        })
    }

    /// Runs the command and logs the outcome. Never fails.
    ///
    /// 运行命令并记录结果。永不失败。
    pub async fn fire_and_log(&self) {
        info!(program = %self.program, args = ?self.args, "running post connection command");
        match self.fire().await {
            Ok(output) if output.status.success() => {
                debug!(output = %output.combined.trim_end(), "post connection command done");
            }
            Ok(output) => {
                error!(
                    status = %output.status,
                    output = %output.combined.trim_end(),
                    "post connection command failed"
                );
            }
            Err(e) => error!(
                program = %self.program,
                error = %e,
                "can't execute post connection command"
            ),
        }
    }
}
