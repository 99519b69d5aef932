//! # 统一错误处理模块
//!
//! 定义 slabgen 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 错误分类
//! - `ParseError`: 查询解析阶段（任何流水线阶段开始之前）
//! - `ResolutionError`: 结构检索阶段（Fetching）
//! - `PipelineError`: 转换 / 建模 / 保存阶段
//! - `RunFailure`: 流水线终止状态，携带出错阶段与原因
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use std::fmt;
use thiserror::Error;

/// 查询中的参数字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Material,
    Miller,
    Layers,
    Vacuum,
    Supercell,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Material => write!(f, "material"),
            Field::Miller => write!(f, "Miller index"),
            Field::Layers => write!(f, "layer count"),
            Field::Vacuum => write!(f, "vacuum thickness"),
            Field::Supercell => write!(f, "supercell"),
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 解析错误
// ─────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Missing required field: {field} ({hint})")]
    MissingRequiredField { field: Field, hint: &'static str },

    #[error("Invalid value for {field}: '{token}' ({reason})")]
    InvalidValue {
        field: Field,
        token: String,
        reason: String,
    },

    #[error("Ambiguous {field}: found {}", .candidates.iter().map(|c| format!("'{}'", c)).collect::<Vec<_>>().join(", "))]
    AmbiguousMatch {
        field: Field,
        candidates: Vec<String>,
    },
}

impl ParseError {
    /// 出错的字段
    pub fn field(&self) -> Field {
        match self {
            ParseError::MissingRequiredField { field, .. }
            | ParseError::InvalidValue { field, .. }
            | ParseError::AmbiguousMatch { field, .. } => *field,
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 结构检索错误
// ─────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("Material not found: {query}")]
    MaterialNotFound { query: String },

    #[error("Structure source '{source_name}' unavailable: {reason}")]
    IntegrationUnavailable { source_name: String, reason: String },

    #[error("Structure retrieval for {query} timed out after {seconds}s")]
    RetrievalTimeout { query: String, seconds: u64 },
}

// ─────────────────────────────────────────────────────────────
// 流水线错误
// ─────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Slab construction failed: {0}")]
    GeometryError(String),

    #[error("I/O error on {path}: {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Converting,
    Building,
    Saving,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetching => write!(f, "fetching"),
            Stage::Converting => write!(f, "converting"),
            Stage::Building => write!(f, "building"),
            Stage::Saving => write!(f, "saving"),
        }
    }
}

/// 阶段失败原因
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// 流水线终止于 `Failed(stage, cause)`
#[derive(Error, Debug)]
#[error("Pipeline failed while {stage}: {cause}")]
pub struct RunFailure {
    pub stage: Stage,
    #[source]
    pub cause: StageError,
}

// ─────────────────────────────────────────────────────────────
// 结构文件错误
// ─────────────────────────────────────────────────────────────

/// 结构文件（POSCAR 等）解析失败
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to parse {format} file: {path} ({reason})")]
pub struct StructureFileError {
    pub format: String,
    pub path: String,
    pub reason: String,
}

// ─────────────────────────────────────────────────────────────
// 顶层错误
// ─────────────────────────────────────────────────────────────

/// slabgen 统一错误类型
#[derive(Error, Debug)]
pub enum SlabgenError {
    #[error("Could not parse query: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Failed(#[from] RunFailure),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to read file: {path} ({source})")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path} ({source})")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("{failed} of {total} queries failed")]
    BatchFailed { failed: usize, total: usize },
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, SlabgenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_message_lists_candidates() {
        let err = ParseError::AmbiguousMatch {
            field: Field::Layers,
            candidates: vec!["6 layers".to_string(), "layers 8".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Ambiguous layer count: found '6 layers', 'layers 8'"
        );
        assert_eq!(err.field(), Field::Layers);
    }

    #[test]
    fn test_run_failure_names_stage() {
        let failure = RunFailure {
            stage: Stage::Fetching,
            cause: ResolutionError::MaterialNotFound {
                query: "formula 'Xx'".to_string(),
            }
            .into(),
        };
        let msg = SlabgenError::from(failure).to_string();
        assert!(msg.contains("while fetching"));
        assert!(msg.contains("Material not found: formula 'Xx'"));
    }
}
