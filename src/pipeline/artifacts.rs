//! # 输出文件写入
//!
//! `ArtifactWriter` 把表面板写成 CIF 与 POSCAR。默认实现直接写到给定路径；
//! 原子性（临时文件 + 重命名）由 `pipeline/mod.rs` 负责。
//!
//! ## 依赖关系
//! - 被 `pipeline/mod.rs` 使用
//! - 使用 `parsers/cif.rs`, `parsers/poscar.rs`

use crate::error::PipelineError;
use crate::models::SlabModel;
use crate::parsers::{cif, poscar};
use std::fs;
use std::path::Path;

/// 输出文件写入器
pub trait ArtifactWriter: Send + Sync {
    fn write_cif(&self, slab: &SlabModel, path: &Path) -> Result<(), PipelineError>;
    fn write_poscar(&self, slab: &SlabModel, path: &Path) -> Result<(), PipelineError>;
}

/// 写入文件系统
#[derive(Debug, Default, Clone, Copy)]
pub struct FileWriter;

fn write(path: &Path, content: String) -> Result<(), PipelineError> {
    fs::write(path, content).map_err(|e| PipelineError::IoError {
        path: path.display().to_string(),
        source: e,
    })
}

impl ArtifactWriter for FileWriter {
    fn write_cif(&self, slab: &SlabModel, path: &Path) -> Result<(), PipelineError> {
        write(path, cif::to_cif_string(&slab.crystal))
    }

    fn write_poscar(&self, slab: &SlabModel, path: &Path) -> Result<(), PipelineError> {
        write(path, poscar::to_poscar_string(&slab.crystal))
    }
}
