//! # 运行配置
//!
//! 由命令行参数、环境变量与 `.env` 文件组装的进程级配置，在启动时构建一次，
//! 显式传给数据源选择器。
//!
//! | 配置项            | 参数              | 环境变量                          | 默认值                              |
//! |-------------------|-------------------|-----------------------------------|-------------------------------------|
//! | API key           | `--mp-api-key`    | `MP_API_KEY`，其次 `MAPI_KEY`     | 无                                  |
//! | API 地址          | `--mp-endpoint`   | `MP_API_ENDPOINT`                 | `https://api.materialsproject.org`  |
//! | 本地结构库        | `--library`       | `SLABGEN_LIBRARY`                 | 无                                  |
//! | 检索超时（秒）    | `--timeout`       | `SLABGEN_TIMEOUT`                 | 30                                  |
//! | 禁用 MP           | `--no-mp-api`     |                                   | false                               |
//!
//! ## 依赖关系
//! - 被 `commands/`, `sources/mod.rs` 使用
//! - 使用 `cli/mod.rs`

use crate::cli::Cli;
use crate::sources::materials_project::MpConfig;
use std::path::PathBuf;
use std::time::Duration;

/// 旧版 API key 环境变量
pub const LEGACY_API_KEY_VAR: &str = "MAPI_KEY";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub library: Option<PathBuf>,
    pub timeout: Duration,
    pub use_mp_api: bool,
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Self {
        Settings {
            api_key: pick_api_key(
                cli.mp_api_key.clone(),
                std::env::var(LEGACY_API_KEY_VAR).ok(),
            ),
            endpoint: cli.mp_endpoint.clone(),
            library: cli.library.clone(),
            timeout: Duration::from_secs(cli.timeout),
            use_mp_api: !cli.no_mp_api,
        }
    }

    pub fn mp_config(&self) -> MpConfig {
        MpConfig {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
        }
    }
}

/// 优先使用参数 / `MP_API_KEY`，其次旧版变量；空白值视为未设置
fn pick_api_key(primary: Option<String>, legacy: Option<String>) -> Option<String> {
    primary
        .into_iter()
        .chain(legacy)
        .map(|k| k.trim().to_string())
        .find(|k| !k.is_empty())
}
