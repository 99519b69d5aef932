//! # slabgen - 由自然语言描述生成晶体表面板模型
//!
//! 将一句描述（如 `"Si (111) 6 layers 15 Å vacuum 2x2"`）解析为完整的
//! 建模参数，然后依次执行 Fetch → Convert → Build → Save，写出 CIF 与
//! POSCAR 文件。
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── config.rs   (运行配置)
//!   ├── commands/   (单条 / 批量执行)
//!   │     ├── query/     (查询解析)
//!   │     ├── pipeline/  (流水线编排、建模、写出)
//!   │     ├── sources/   (体相结构检索)
//!   │     ├── parsers/   (POSCAR / CIF 读写)
//!   │     └── models/    (数据模型)
//!   ├── batch/      (并行执行)
//!   ├── utils/      (输出、进度条、日志)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod config;
mod error;
mod models;
mod parsers;
mod pipeline;
mod query;
mod sources;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    // .env 中的变量不覆盖已有环境变量
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    utils::logging::init(cli.verbose);

    if let Err(e) = commands::run(cli) {
        utils::output::print_error(&e.to_string());
        std::process::exit(1);
    }
}
