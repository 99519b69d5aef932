//! # 流水线阶段数据模型
//!
//! 各阶段之间传递的值：体相结构 → 原子模型 → 表面板模型 → 输出文件路径。
//! 阶段产物创建后不再被修改。
//!
//! ## 依赖关系
//! - 被 `sources/`, `pipeline/`, `parsers/` 使用
//! - 使用 `models/structure.rs`, `models/query.rs`

use super::query::{MillerIndex, Supercell};
use super::structure::{Crystal, Lattice};
use std::path::PathBuf;

/// 检索得到的体相结构
#[derive(Debug, Clone, PartialEq)]
pub struct BulkStructure {
    /// 数据源中的材料 ID（本地结构库可能没有）
    pub material_id: Option<String>,
    /// 约化化学式
    pub formula: String,
    pub crystal: Crystal,
}

/// 笛卡尔坐标原子模型
#[derive(Debug, Clone, PartialEq)]
pub struct AtomModel {
    pub cell: Lattice,
    pub symbols: Vec<String>,
    /// 笛卡尔坐标 (Å)
    pub positions: Vec<[f64; 3]>,
}

impl AtomModel {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// 表面板构建参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlabSpec {
    pub miller: MillerIndex,
    pub layers: u32,
    pub vacuum: f64,
    pub supercell: Supercell,
}

/// 构建完成的表面板
#[derive(Debug, Clone, PartialEq)]
pub struct SlabModel {
    pub spec: SlabSpec,
    /// 分数坐标表示，第三轴垂直于表面
    pub crystal: Crystal,
}

/// 输出文件路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub cif: PathBuf,
    pub poscar: PathBuf,
}
