//! # 结构文件格式模块
//!
//! POSCAR 读写与 CIF 输出。
//!
//! ## 依赖关系
//! - 被 `sources/library.rs`, `pipeline/artifacts.rs` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: poscar, cif

pub mod cif;
pub mod poscar;

use crate::error::StructureFileError;
use crate::models::Crystal;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// 读取结构文件的错误
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Format(#[from] StructureFileError),
}

/// 解析 POSCAR/CONTCAR 文件
pub fn parse_poscar_file(path: &Path) -> Result<Crystal, ReadError> {
    let content = fs::read_to_string(path)?;
    Ok(poscar::parse_poscar_content(
        &content,
        &path.display().to_string(),
    )?)
}
