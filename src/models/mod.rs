//! # 数据模型模块
//!
//! 定义查询参数、晶体结构与流水线阶段产物的数据模型。
//!
//! ## 依赖关系
//! - 被 `query/`, `sources/`, `pipeline/`, `parsers/` 使用
//! - 子模块: query, structure, pipeline

pub mod pipeline;
pub mod query;
pub mod structure;

pub use pipeline::{ArtifactPaths, AtomModel, BulkStructure, SlabModel, SlabSpec};
pub use query::{MaterialRef, MillerIndex, ParsedQuery, Supercell};
pub use structure::{Atom, Crystal, Lattice};
