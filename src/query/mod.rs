//! # 查询解析模块
//!
//! 将自然语言查询转换为校验后的 `ParsedQuery`：
//! 原始文本 → 规范化文本 → 各字段提取结果 → 默认值与校验。
//!
//! 解析错误在任何流水线阶段开始之前返回，无副作用。
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 子模块: normalize, elements, extract, validate

pub mod elements;
pub mod extract;
pub mod normalize;
pub mod validate;

use crate::error::ParseError;
use crate::models::ParsedQuery;
use extract::{
    Claims, Extraction, FieldExtractor, LayersExtractor, MaterialExtractor, MillerExtractor,
    SupercellExtractor, VacuumExtractor,
};
use normalize::NormalizedText;

/// 解析查询字符串
pub fn parse_query(text: &str) -> Result<ParsedQuery, ParseError> {
    let text = normalize::normalize(text);
    let mut claims = Claims::default();

    // 固定优先级: Material → Miller → Layers → Vacuum → Supercell
    let material = claim(MaterialExtractor, &text, &mut claims)?;
    let miller = claim(MillerExtractor, &text, &mut claims)?;
    let layers = claim(LayersExtractor, &text, &mut claims)?;
    let vacuum = claim(VacuumExtractor, &text, &mut claims)?;
    let supercell = claim(SupercellExtractor, &text, &mut claims)?;

    let query = validate::build(material, miller, layers, vacuum, supercell)?;
    tracing::debug!(?query, "parsed query");
    Ok(query)
}

fn claim<E: FieldExtractor>(
    extractor: E,
    text: &NormalizedText,
    claims: &mut Claims,
) -> Result<Extraction<E::Value>, ParseError> {
    let extraction = extractor.extract(text, claims)?;
    if let Some(span) = extraction.span() {
        claims.claim(span.clone());
    }
    Ok(extraction)
}
