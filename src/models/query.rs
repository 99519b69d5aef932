//! # 查询参数数据模型
//!
//! 自然语言查询解析后的结构化参数。`ParsedQuery` 一经校验即不可变。
//!
//! ## 依赖关系
//! - 由 `query/` 构建
//! - 被 `sources/`, `pipeline/` 使用

use std::fmt;

pub const DEFAULT_LAYERS: u32 = 6;
pub const DEFAULT_VACUUM: f64 = 15.0;
pub const DEFAULT_SUPERCELL: Supercell = Supercell(1, 1);

/// 材料标识：化学式或 Materials Project ID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MaterialRef {
    /// 化学式，区分大小写，如 `GaAs`
    Formula(String),
    /// Materials Project ID，小写，如 `mp-149`
    MpId(String),
}

impl MaterialRef {
    pub fn as_str(&self) -> &str {
        match self {
            MaterialRef::Formula(s) | MaterialRef::MpId(s) => s,
        }
    }
}

impl fmt::Display for MaterialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Miller 指数 (h, k, l)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MillerIndex(pub i32, pub i32, pub i32);

impl MillerIndex {
    pub fn as_array(&self) -> [i32; 3] {
        [self.0, self.1, self.2]
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0 && self.1 == 0 && self.2 == 0
    }
}

impl fmt::Display for MillerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.0, self.1, self.2)
    }
}

/// 面内超胞倍数 (nx, ny)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Supercell(pub u32, pub u32);

impl fmt::Display for Supercell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.0, self.1)
    }
}

/// 校验后的查询参数
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub material: MaterialRef,
    pub miller: MillerIndex,
    pub layers: u32,
    /// 真空层厚度 (Å)
    pub vacuum: f64,
    pub supercell: Supercell,
}

impl ParsedQuery {
    /// 替换层数（`--thickness` 换算后使用）
    pub fn with_layers(&self, layers: u32) -> Self {
        ParsedQuery {
            layers,
            ..self.clone()
        }
    }
}
