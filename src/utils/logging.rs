//! # 日志初始化
//!
//! `tracing` 事件输出到 stderr，不与 stdout 上的结果输出混在一起。
//! `RUST_LOG` 优先，未设置时由 `-v` 次数决定级别。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `tracing-subscriber`

use tracing_subscriber::{fmt, EnvFilter};

/// `-v` 次数对应的默认级别
pub fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// 初始化全局 subscriber，重复调用无效果
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("slabgen={}", level_for(verbose))));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}
