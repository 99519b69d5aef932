//! # 体相结构 → 原子模型
//!
//! 将检索得到的体相结构（分数坐标）转换为笛卡尔坐标原子模型。
//!
//! ## 依赖关系
//! - 被 `pipeline/mod.rs` 使用
//! - 使用 `models/pipeline.rs`

use crate::error::PipelineError;
use crate::models::{AtomModel, BulkStructure};

/// 最小晶胞体积 (Å³)
const MIN_VOLUME: f64 = 1e-6;

/// 结构转换器
pub trait StructureConverter: Send + Sync {
    fn to_atom_model(&self, bulk: &BulkStructure) -> Result<AtomModel, PipelineError>;
}

/// 默认转换器：分数坐标 → 笛卡尔坐标
#[derive(Debug, Default, Clone, Copy)]
pub struct CartesianConverter;

impl StructureConverter for CartesianConverter {
    fn to_atom_model(&self, bulk: &BulkStructure) -> Result<AtomModel, PipelineError> {
        let crystal = &bulk.crystal;
        if crystal.atoms.is_empty() {
            return Err(PipelineError::ConversionFailed(format!(
                "structure {} has no atoms",
                crystal.name
            )));
        }

        let volume = crystal.lattice.volume();
        if !volume.is_finite() || volume.abs() < MIN_VOLUME {
            return Err(PipelineError::ConversionFailed(format!(
                "structure {} has a degenerate cell (volume {:.3e} Å³)",
                crystal.name, volume
            )));
        }

        let mut symbols = Vec::with_capacity(crystal.atoms.len());
        let mut positions = Vec::with_capacity(crystal.atoms.len());
        for atom in &crystal.atoms {
            if atom.position.iter().any(|x| !x.is_finite()) {
                return Err(PipelineError::ConversionFailed(format!(
                    "non-finite coordinate for {} in {}",
                    atom.element, crystal.name
                )));
            }
            symbols.push(atom.element.clone());
            positions.push(crystal.lattice.frac_to_cart(atom.position));
        }

        Ok(AtomModel {
            cell: crystal.lattice.clone(),
            symbols,
            positions,
        })
    }
}
