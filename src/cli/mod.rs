//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数。单条查询作为位置参数传入，或用 `--batch`
//! 从文件读取多条查询。
//!
//! ## 依赖关系
//! - 被 `main.rs`, `config.rs`, `commands/` 使用
//! - 使用 `pipeline/builder.rs` 的 `Thickness`

use crate::pipeline::Thickness;
use crate::sources::materials_project::DEFAULT_ENDPOINT;
use clap::Parser;
use std::path::PathBuf;

/// slabgen - 由自然语言描述生成晶体表面板模型
#[derive(Parser, Debug)]
#[command(name = "slabgen")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Generate crystal surface slabs from natural-language queries", long_about = None)]
#[command(after_help = "Example:\n  slabgen \"Si (111) 6 layers 15 Å vacuum 2x2\" -o slabs_out")]
pub struct Cli {
    /// Slab description, e.g. "Si (111) 6 layers 15 Å vacuum 2x2" or "mp-149 (100)"
    #[arg(required_unless_present = "batch", conflicts_with = "batch")]
    pub query: Option<String>,

    /// Output directory for CIF and POSCAR files
    #[arg(short, long, default_value = "slabs_out")]
    pub output_dir: PathBuf,

    /// Target slab thickness in Å (e.g. 12.5) or in d_hkl units (e.g. 1.5d); overrides the layer count
    #[arg(long)]
    pub thickness: Option<Thickness>,

    /// Materials Project API key
    #[arg(long, env = "MP_API_KEY", hide_env_values = true)]
    pub mp_api_key: Option<String>,

    /// Materials Project API endpoint
    #[arg(long, env = "MP_API_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub mp_endpoint: String,

    /// Do not use the Materials Project API (local library only)
    #[arg(long, default_value_t = false)]
    pub no_mp_api: bool,

    /// Local structure library directory (<key>.vasp, <key>.poscar or POSCAR_<key>)
    #[arg(long, env = "SLABGEN_LIBRARY")]
    pub library: Option<PathBuf>,

    /// Structure retrieval timeout in seconds (at least 1)
    #[arg(
        long,
        env = "SLABGEN_TIMEOUT",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// Parse the query and show the parameters without fetching or writing anything
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// File with one query per line ('#' starts a comment)
    #[arg(short, long)]
    pub batch: Option<PathBuf>,

    /// Number of parallel jobs in batch mode (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Increase log verbosity (-v: info, -vv: debug, -vvv: trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
