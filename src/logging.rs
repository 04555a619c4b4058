//! Log filter construction and subscriber setup.
//!
//! 日志过滤器构建与订阅者初始化。

use crate::config::LoggingConfig;
use tracing::warn;
use tracing_subscriber::{filter::Directive, prelude::*, EnvFilter};

/// Level names accepted by `--loglevel`.
pub const LEVELS: [&str; 7] = ["none", "error", "warn", "info", "connect", "debug", "trace"];

/// Maps a level name to an `EnvFilter` directive.
///
/// `connect` is the level connection and reconnect messages are logged at,
/// which is `info`.
///
/// 将级别名称映射为 `EnvFilter` 指令。
pub fn level_directive(level: &str) -> Option<&'static str> {
    let directive = match level.to_ascii_lowercase().as_str() {
        "none" | "off" => "off",
        "error" => "error",
        "warn" | "warning" => "warn",
        "info" | "connect" => "info",
        "debug" => "debug",
        "trace" => "trace",
        _ => return None,
    };
    Some(directive)
}

/// Builds the filter from the configured level and extra directives.
///
/// Returns the filter together with every input it couldn't use, so the
/// caller can report them once logging works.
///
/// 根据配置的级别与额外指令构建过滤器。同时返回无法使用的输入，
/// 以便调用方在日志可用后报告它们。
pub fn build_filter(config: &LoggingConfig) -> (EnvFilter, Vec<String>) {
    let mut rejected = Vec::new();
    let base = level_directive(&config.level).unwrap_or_else(|| {
        rejected.push(format!("level {:?}", config.level));
        "info"
    });

    let mut filter = EnvFilter::new(base);
    let extra = config.filter.as_deref().unwrap_or_default();
    for raw in extra.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        match raw.parse::<Directive>() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(_) => rejected.push(format!("directive {raw:?}")),
        }
    }
    (filter, rejected)
}

/// Installs the global subscriber. `RUST_LOG`, when set and valid, wins over
/// the configuration.
///
/// 安装全局订阅者。设置且有效的 `RUST_LOG` 优先于配置。
pub fn init(config: &LoggingConfig) {
    let (filter, rejected) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, Vec::new()),
        Err(_) => build_filter(config),
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
    for input in rejected {
        warn!("ignoring invalid log {input}");
    }
}
