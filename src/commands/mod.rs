//! # 命令执行模块
//!
//! 根据命令行参数选择单条查询或批量模式。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `config.rs`
//! - 子模块: generate, batch

pub mod batch;
pub mod generate;

use crate::cli::Cli;
use crate::config::Settings;
use crate::error::{Result, SlabgenError};

/// 执行命令
pub fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_cli(&cli);
    tracing::debug!(
        use_mp_api = settings.use_mp_api,
        has_api_key = settings.api_key.is_some(),
        library = ?settings.library,
        timeout_s = settings.timeout.as_secs(),
        "settings loaded"
    );

    match (&cli.batch, &cli.query) {
        (Some(file), _) => batch::execute(&cli, file, &settings),
        (None, Some(query)) => generate::execute(&cli, query, &settings),
        (None, None) => Err(SlabgenError::InvalidArgument(
            "a query or --batch FILE is required".to_string(),
        )),
    }
}
