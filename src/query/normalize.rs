//! # 查询文本规范化
//!
//! 统一乘号 / 埃符号 / 分隔符写法并折叠空白。同时保留两份文本：
//! - `original`: 保留大小写，用于化学式提取（`Si` ≠ `si`）
//! - `folded`:   ASCII 小写，用于其余字段的大小写无关匹配
//!
//! 两份文本的字节偏移完全一致，因此任何一份上得到的 span 都可以直接
//! 用于另一份。
//!
//! ## 依赖关系
//! - 被 `query/extract.rs` 使用
//! - 无外部模块依赖

use std::ops::Range;

/// 规范化后的查询文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    original: String,
    folded: String,
}

impl NormalizedText {
    /// 保留大小写的文本
    pub fn original(&self) -> &str {
        &self.original
    }

    /// 小写文本
    pub fn folded(&self) -> &str {
        &self.folded
    }

    /// span 对应的原始片段（用于错误信息）
    pub fn token(&self, span: &Range<usize>) -> &str {
        &self.original[span.clone()]
    }
}

/// 规范化查询文本，永不失败
pub fn normalize(text: &str) -> NormalizedText {
    let mut original = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.chars() {
        let mapped = match ch {
            '×' | '✕' | '⨯' => 'x',
            // U+00C5 LATIN CAPITAL A WITH RING, U+212B ANGSTROM SIGN
            'Å' | 'Å' => 'A',
            'å' => 'a',
            ',' | ';' | '_' => ' ',
            c => c,
        };

        if mapped.is_whitespace() {
            pending_space = !original.is_empty();
            continue;
        }
        if pending_space {
            original.push(' ');
            pending_space = false;
        }
        original.push(mapped);
    }

    // to_ascii_lowercase 不改变字节长度
    let folded = original.to_ascii_lowercase();
    NormalizedText { original, folded }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyphs_are_canonicalized() {
        let text = normalize("Si (111)  2×2, 15 Å vacuum");
        assert_eq!(text.original(), "Si (111) 2x2 15 A vacuum");
        assert_eq!(text.folded(), "si (111) 2x2 15 a vacuum");
    }

    #[test]
    fn test_uppercase_x_folds_to_x() {
        let text = normalize("GaAs 3X2");
        assert_eq!(text.original(), "GaAs 3X2");
        assert_eq!(text.folded(), "gaas 3x2");
    }

    #[test]
    fn test_offsets_align_between_copies() {
        let text = normalize("  Ångström Si\t(1,1,-1)\n");
        assert_eq!(text.original().len(), text.folded().len());
        assert_eq!(text.original(), "Angström Si (1 1 -1)");
        assert_eq!(text.token(&(10..12)), "Si");
    }

    #[test]
    fn test_underscores_split_canonical_names() {
        let text = normalize("Si_111_6L_15A_2x2");
        assert_eq!(text.folded(), "si 111 6l 15a 2x2");
    }

    #[test]
    fn test_empty_input() {
        assert!(normalize("").original().is_empty());
        assert!(normalize(" \t\n ").folded().is_empty());
    }
}
