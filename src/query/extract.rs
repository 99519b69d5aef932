//! # 字段提取器
//!
//! 五个相互独立的提取规则：材料、Miller 指数、层数、真空层、超胞。
//! 每个提取器在规范化文本上用自己的模式集扫描，返回带 span 的候选值
//! 或 `Absent`。
//!
//! ## 占用规则
//! 提取器按固定优先级执行（Material → Miller → Layers → Vacuum → Supercell），
//! 已被先前提取器占用的 span 不会再被后续提取器匹配。同一提取器内部，
//! 先出现的模式优先，与之重叠的后续候选被忽略。同一字段出现多个不同的
//! 值时报 `AmbiguousMatch`，而不是猜测。
//!
//! ## 依赖关系
//! - 被 `query/mod.rs` 使用
//! - 使用 `query/normalize.rs`, `query/elements.rs`

use super::elements::{is_formula, is_formula_shaped};
use super::normalize::NormalizedText;
use crate::error::{Field, ParseError};
use crate::models::{MaterialRef, MillerIndex};

use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::LazyLock;

/// 不参与化学式识别的常见词（小写比较）
const STOPWORDS: &[&str] = &[
    "create", "make", "build", "generate", "a", "an", "the", "with", "and", "for", "surface",
    "slab", "supercell", "vacuum", "layers", "layer", "repeat", "of", "to",
];

const MAX_FORMULA_LEN: usize = 20;

// ─────────────────────────────────────────────────────────────
// 提取结果
// ─────────────────────────────────────────────────────────────

/// 一次成功匹配
#[derive(Debug, Clone, PartialEq)]
pub struct Match<T> {
    pub value: T,
    pub span: Range<usize>,
    /// 原文片段
    pub token: String,
}

/// 单个字段的提取结果
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<T> {
    Found(Match<T>),
    Absent,
}

impl<T> Extraction<T> {
    pub fn span(&self) -> Option<&Range<usize>> {
        match self {
            Extraction::Found(m) => Some(&m.span),
            Extraction::Absent => None,
        }
    }
}

/// 已被占用的文本区间
#[derive(Debug, Default)]
pub struct Claims {
    spans: Vec<Range<usize>>,
}

impl Claims {
    pub fn overlaps(&self, span: &Range<usize>) -> bool {
        self.spans
            .iter()
            .any(|s| s.start < span.end && span.start < s.end)
    }

    pub fn claim(&mut self, span: Range<usize>) {
        self.spans.push(span);
    }
}

/// 字段提取能力
pub trait FieldExtractor {
    type Value;

    const FIELD: Field;

    fn extract(
        &self,
        text: &NormalizedText,
        claims: &Claims,
    ) -> Result<Extraction<Self::Value>, ParseError>;
}

/// 候选收集器：跳过已占用区间以及与本字段先前候选重叠的区间
struct Candidates<'a, T> {
    text: &'a NormalizedText,
    claims: &'a Claims,
    found: Vec<Match<T>>,
}

impl<'a, T: PartialEq> Candidates<'a, T> {
    fn new(text: &'a NormalizedText, claims: &'a Claims) -> Self {
        Candidates {
            text,
            claims,
            found: Vec::new(),
        }
    }

    fn is_free(&self, span: &Range<usize>) -> bool {
        !self.claims.overlaps(span)
            && !self
                .found
                .iter()
                .any(|m| m.span.start < span.end && span.start < m.span.end)
    }

    fn push(&mut self, value: T, span: Range<usize>) {
        let token = self.text.token(&span).to_string();
        self.found.push(Match { value, span, token });
    }

    fn is_empty(&self) -> bool {
        self.found.is_empty()
    }

    /// 所有候选值相同则返回第一个，否则报歧义
    fn resolve(self, field: Field) -> Result<Extraction<T>, ParseError> {
        let mut found = self.found.into_iter();
        let Some(first) = found.next() else {
            return Ok(Extraction::Absent);
        };

        let conflicting: Vec<Match<T>> = found.filter(|m| m.value != first.value).collect();
        if conflicting.is_empty() {
            Ok(Extraction::Found(first))
        } else {
            let mut candidates = vec![first.token];
            for m in conflicting {
                if !candidates.contains(&m.token) {
                    candidates.push(m.token);
                }
            }
            Err(ParseError::AmbiguousMatch { field, candidates })
        }
    }
}

fn full_span(caps: &Captures<'_>) -> Range<usize> {
    caps.get(0).map(|m| m.range()).unwrap_or(0..0)
}

fn group<'t>(caps: &Captures<'t>, i: usize) -> &'t str {
    caps.get(i).map(|m| m.as_str()).unwrap_or("")
}

fn invalid(field: Field, token: &str, reason: &str) -> ParseError {
    ParseError::InvalidValue {
        field,
        token: token.to_string(),
        reason: reason.to_string(),
    }
}

/// 解析整数字面量，小数或溢出视为非法
fn parse_count(field: Field, literal: &str, token: &str) -> Result<i64, ParseError> {
    if literal.contains('.') {
        return Err(invalid(field, token, "expected a whole number"));
    }
    literal
        .parse::<i64>()
        .map_err(|_| invalid(field, token, "number out of range"))
}

// ─────────────────────────────────────────────────────────────
// Material
// ─────────────────────────────────────────────────────────────

static MP_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bmp-\d+\b").unwrap());
static WORD_BEFORE_PAREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z][A-Za-z0-9]*)\s*\(").unwrap());
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Za-z][A-Za-z0-9]*\b").unwrap());

/// 材料标识：MP ID 优先，其次括号前的化学式，最后全文扫描化学式
pub struct MaterialExtractor;

impl MaterialExtractor {
    fn formula_candidate(token: &str) -> bool {
        Self::plausible(token) && is_formula(token)
    }

    /// 括号前的位置足够明确，只要求化学式语法，未知元素留给检索阶段报告
    fn shaped_candidate(token: &str) -> bool {
        Self::plausible(token) && is_formula_shaped(token)
    }

    fn plausible(token: &str) -> bool {
        token.len() <= MAX_FORMULA_LEN && !STOPWORDS.contains(&token.to_ascii_lowercase().as_str())
    }
}

impl FieldExtractor for MaterialExtractor {
    type Value = MaterialRef;

    const FIELD: Field = Field::Material;

    fn extract(
        &self,
        text: &NormalizedText,
        claims: &Claims,
    ) -> Result<Extraction<MaterialRef>, ParseError> {
        // 1. MP ID（大小写无关）
        let mut ids = Candidates::new(text, claims);
        for m in MP_ID.find_iter(text.folded()) {
            if ids.is_free(&m.range()) {
                ids.push(MaterialRef::MpId(m.as_str().to_string()), m.range());
            }
        }
        if !ids.is_empty() {
            return ids.resolve(Self::FIELD);
        }

        // 2. 紧邻 "(" 之前的化学式，如 "Si (111)"
        let mut before_paren = Candidates::new(text, claims);
        for caps in WORD_BEFORE_PAREN.captures_iter(text.original()) {
            let Some(word) = caps.get(1) else { continue };
            if Self::shaped_candidate(word.as_str()) && before_paren.is_free(&word.range()) {
                before_paren.push(MaterialRef::Formula(word.as_str().to_string()), word.range());
            }
        }
        if !before_paren.is_empty() {
            return before_paren.resolve(Self::FIELD);
        }

        // 3. 全文扫描大写开头的 token
        let mut scanned = Candidates::new(text, claims);
        for word in WORD.find_iter(text.original()) {
            let token = word.as_str();
            let starts_upper = token.chars().next().is_some_and(|c| c.is_ascii_uppercase());
            if starts_upper && Self::formula_candidate(token) && scanned.is_free(&word.range()) {
                scanned.push(MaterialRef::Formula(token.to_string()), word.range());
            }
        }
        scanned.resolve(Self::FIELD)
    }
}

// ─────────────────────────────────────────────────────────────
// Miller index
// ─────────────────────────────────────────────────────────────

static PAREN_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*([-\d\s]+?)\s*\)").unwrap());
static BARE_TRIPLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{3}\b").unwrap());

/// Miller 指数
///
/// 接受 `(1 1 1)`、`(1,1,-1)`、`(111)`；仅当没有括号形式时才接受裸写的
/// 三位数 `111`。紧凑形式（括号内或裸写）每一位对应一个指数，无法表达负数。
pub struct MillerExtractor;

impl MillerExtractor {
    fn from_digits(token: &str) -> Option<MillerIndex> {
        let digits: Vec<i32> = token
            .chars()
            .map(|c| c.to_digit(10).map(|d| d as i32))
            .collect::<Option<Vec<_>>>()?;
        match digits.as_slice() {
            [h, k, l] => Some(MillerIndex(*h, *k, *l)),
            _ => None,
        }
    }

    fn from_group(inner: &str) -> Option<MillerIndex> {
        let parts: Vec<&str> = inner.split_whitespace().collect();
        match parts.as_slice() {
            [h, k, l] => Some(MillerIndex(h.parse().ok()?, k.parse().ok()?, l.parse().ok()?)),
            [compact] if compact.len() == 3 => Self::from_digits(compact),
            _ => None,
        }
    }

    /// 裸写三位数不能紧挨小数点或负号，如 `12.125`、`mp-149`
    fn is_standalone(folded: &str, span: &Range<usize>) -> bool {
        let bytes = folded.as_bytes();
        let before = span.start.checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(span.end).copied();
        let after_next = bytes.get(span.end + 1).copied();

        let decimal_after = after == Some(b'.') && after_next.is_some_and(|b| b.is_ascii_digit());
        !matches!(before, Some(b'.') | Some(b'-')) && !decimal_after
    }
}

impl FieldExtractor for MillerExtractor {
    type Value = MillerIndex;

    const FIELD: Field = Field::Miller;

    fn extract(
        &self,
        text: &NormalizedText,
        claims: &Claims,
    ) -> Result<Extraction<MillerIndex>, ParseError> {
        let folded = text.folded();

        let mut parenthesized = Candidates::new(text, claims);
        let mut malformed: Option<String> = None;
        for caps in PAREN_GROUP.captures_iter(folded) {
            let span = full_span(&caps);
            if !parenthesized.is_free(&span) {
                continue;
            }
            match Self::from_group(group(&caps, 1)) {
                Some(miller) => parenthesized.push(miller, span),
                None => {
                    malformed.get_or_insert_with(|| text.token(&span).to_string());
                }
            }
        }
        if !parenthesized.is_empty() {
            return parenthesized.resolve(Self::FIELD);
        }

        let mut bare = Candidates::new(text, claims);
        for m in BARE_TRIPLE.find_iter(folded) {
            let span = m.range();
            if !Self::is_standalone(folded, &span) || !bare.is_free(&span) {
                continue;
            }
            if let Some(miller) = Self::from_digits(m.as_str()) {
                bare.push(miller, span);
            }
        }
        if !bare.is_empty() {
            return bare.resolve(Self::FIELD);
        }

        match malformed {
            Some(token) => Err(invalid(
                Self::FIELD,
                &token,
                "expected three integer indices such as (1 1 1) or (1,1,-1)",
            )),
            None => Ok(Extraction::Absent),
        }
    }
}

// ─────────────────────────────────────────────────────────────
// Layers
// ─────────────────────────────────────────────────────────────

static LAYERS_AFTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*layers?\b").unwrap());
static LAYERS_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\blayers?\s*(?:of\s+|=\s*|:\s*)?(-?\d+(?:\.\d+)?)").unwrap()
});
static LAYERS_COMPACT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d+)l\b").unwrap());

/// 层数：`6 layers`、`layers 6`，以及规范文件名中的 `6L`
pub struct LayersExtractor;

impl LayersExtractor {
    /// `vacuum 15 layers 6` 中的 15 属于 vacuum，`2x2 layers` 中的 2 属于超胞
    fn owned_by_sibling(folded: &str, start: usize) -> bool {
        let previous_word = folded[..start].trim_end().rsplit(' ').next().unwrap_or("");
        let factor = previous_word
            .strip_suffix('x')
            .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()));
        factor || matches!(previous_word, "vacuum" | "repeat" | "supercell")
    }
}

impl FieldExtractor for LayersExtractor {
    /// 原始整数，范围在 `validate` 中检查
    type Value = i64;

    const FIELD: Field = Field::Layers;

    fn extract(&self, text: &NormalizedText, claims: &Claims) -> Result<Extraction<i64>, ParseError> {
        let mut found = Candidates::new(text, claims);
        let patterns = [
            (&*LAYERS_AFTER, true),
            (&*LAYERS_BEFORE, false),
            (&*LAYERS_COMPACT, true),
        ];
        for (pattern, number_first) in patterns {
            for caps in pattern.captures_iter(text.folded()) {
                let span = full_span(&caps);
                if !found.is_free(&span)
                    || (number_first && Self::owned_by_sibling(text.folded(), span.start))
                {
                    continue;
                }
                let value = parse_count(Self::FIELD, group(&caps, 1), text.token(&span))?;
                found.push(value, span);
            }
        }
        found.resolve(Self::FIELD)
    }
}

// ─────────────────────────────────────────────────────────────
// Vacuum
// ─────────────────────────────────────────────────────────────

static VACUUM_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-?\d+(?:\.\d+)?)\s*(?:angstroms?|a)\s*(?:of\s+)?vacuum\b").unwrap()
});
static VACUUM_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bvacuum\s*(?:of\s+|=\s*|:\s*)?(-?\d+(?:\.\d+)?)").unwrap()
});
static VACUUM_COMPACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+(?:\.\d+)?)a\b").unwrap());

/// 真空层厚度 (Å)：`15 Å vacuum`、`vacuum 15`，以及规范文件名中的 `15A`
pub struct VacuumExtractor;

impl FieldExtractor for VacuumExtractor {
    type Value = f64;

    const FIELD: Field = Field::Vacuum;

    fn extract(&self, text: &NormalizedText, claims: &Claims) -> Result<Extraction<f64>, ParseError> {
        let mut found = Candidates::new(text, claims);
        for pattern in [&*VACUUM_AFTER, &*VACUUM_BEFORE, &*VACUUM_COMPACT] {
            for caps in pattern.captures_iter(text.folded()) {
                let span = full_span(&caps);
                if !found.is_free(&span) {
                    continue;
                }
                let value: f64 = group(&caps, 1)
                    .parse()
                    .map_err(|_| invalid(Self::FIELD, text.token(&span), "not a number"))?;
                found.push(value, span);
            }
        }
        found.resolve(Self::FIELD)
    }
}

// ─────────────────────────────────────────────────────────────
// Supercell
// ─────────────────────────────────────────────────────────────

static SUPERCELL_TIMES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*x\s*(\d+)").unwrap());
static SUPERCELL_REPEAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:repeat|supercell)\s+(\d+)\s+(\d+)\b").unwrap());

/// 面内超胞：`2x2`（× 已规范化为 x）或 `repeat 2 3`
pub struct SupercellExtractor;

impl FieldExtractor for SupercellExtractor {
    type Value = (i64, i64);

    const FIELD: Field = Field::Supercell;

    fn extract(
        &self,
        text: &NormalizedText,
        claims: &Claims,
    ) -> Result<Extraction<(i64, i64)>, ParseError> {
        let mut found = Candidates::new(text, claims);
        for pattern in [&*SUPERCELL_TIMES, &*SUPERCELL_REPEAT] {
            for caps in pattern.captures_iter(text.folded()) {
                let span = full_span(&caps);
                if !found.is_free(&span) {
                    continue;
                }
                let token = text.token(&span);
                let nx = parse_count(Self::FIELD, group(&caps, 1), token)?;
                let ny = parse_count(Self::FIELD, group(&caps, 2), token)?;
                found.push((nx, ny), span);
            }
        }
        found.resolve(Self::FIELD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::normalize::normalize;

    fn run<E: FieldExtractor>(extractor: E, input: &str) -> Result<Extraction<E::Value>, ParseError> {
        extractor.extract(&normalize(input), &Claims::default())
    }

    fn value<T>(extraction: Extraction<T>) -> Option<T> {
        match extraction {
            Extraction::Found(m) => Some(m.value),
            Extraction::Absent => None,
        }
    }

    #[test]
    fn test_material_mp_id_wins_over_formula() {
        let found = value(run(MaterialExtractor, "MP-149 Si (100)").unwrap());
        assert_eq!(found, Some(MaterialRef::MpId("mp-149".to_string())));
    }

    #[test]
    fn test_material_before_paren() {
        let found = value(run(MaterialExtractor, "Make a GaAs (110) slab").unwrap());
        assert_eq!(found, Some(MaterialRef::Formula("GaAs".to_string())));
    }

    #[test]
    fn test_material_scan_ignores_units_and_stopwords() {
        let found = value(run(MaterialExtractor, "Slab of SrTiO3 with 15 A vacuum").unwrap());
        assert_eq!(found, Some(MaterialRef::Formula("SrTiO3".to_string())));
    }

    #[test]
    fn test_material_unknown_element_before_paren() {
        let found = value(run(MaterialExtractor, "Xx (111)").unwrap());
        assert_eq!(found, Some(MaterialRef::Formula("Xx".to_string())));
        assert_eq!(value(run(MaterialExtractor, "Xx 111").unwrap()), None);
    }

    #[test]
    fn test_material_is_case_sensitive() {
        assert_eq!(value(run(MaterialExtractor, "si (111)").unwrap()), None);
    }

    #[test]
    fn test_material_conflicting_formulas_are_ambiguous() {
        let err = run(MaterialExtractor, "Si or Ge 111").unwrap_err();
        assert_eq!(
            err,
            ParseError::AmbiguousMatch {
                field: Field::Material,
                candidates: vec!["Si".to_string(), "Ge".to_string()],
            }
        );
    }

    #[test]
    fn test_miller_forms() {
        for (input, expected) in [
            ("(1 1 1)", MillerIndex(1, 1, 1)),
            ("(1,1,-1)", MillerIndex(1, 1, -1)),
            ("( 1, 0, 0 )", MillerIndex(1, 0, 0)),
            ("(110)", MillerIndex(1, 1, 0)),
            ("Si 211 surface", MillerIndex(2, 1, 1)),
            ("(2 -1 10)", MillerIndex(2, -1, 10)),
        ] {
            assert_eq!(value(run(MillerExtractor, input).unwrap()), Some(expected), "{}", input);
        }
    }

    #[test]
    fn test_miller_bare_form_skips_decimals() {
        assert_eq!(value(run(MillerExtractor, "Si 12.125 A vacuum").unwrap()), None);
    }

    #[test]
    fn test_miller_malformed_group_reports_token() {
        let err = run(MillerExtractor, "Si (1 1) slab").unwrap_err();
        match err {
            ParseError::InvalidValue { field, token, .. } => {
                assert_eq!(field, Field::Miller);
                assert_eq!(token, "(1 1)");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_miller_parenthesized_takes_precedence_over_bare() {
        let found = value(run(MillerExtractor, "Si (111) 100 layers").unwrap());
        assert_eq!(found, Some(MillerIndex(1, 1, 1)));
    }

    #[test]
    fn test_miller_two_groups_are_ambiguous() {
        let err = run(MillerExtractor, "Si (111) or (100)").unwrap_err();
        assert!(matches!(err, ParseError::AmbiguousMatch { field: Field::Miller, .. }));
    }

    #[test]
    fn test_layers_keyword_either_side() {
        assert_eq!(value(run(LayersExtractor, "8 layers").unwrap()), Some(8));
        assert_eq!(value(run(LayersExtractor, "layers 8").unwrap()), Some(8));
        assert_eq!(value(run(LayersExtractor, "1 layer").unwrap()), Some(1));
        assert_eq!(value(run(LayersExtractor, "Si_111_4L").unwrap()), Some(4));
    }

    #[test]
    fn test_layers_following_number_is_not_double_counted() {
        // "layers 8" overlaps the already-accepted "6 layers"
        let found = value(run(LayersExtractor, "6 layers 8 A vacuum").unwrap());
        assert_eq!(found, Some(6));
    }

    #[test]
    fn test_layers_skip_numbers_owned_by_siblings() {
        let found = value(run(LayersExtractor, "vacuum 15 layers 6").unwrap());
        assert_eq!(found, Some(6));
        let found = value(run(LayersExtractor, "2x2 layers 4").unwrap());
        assert_eq!(found, Some(4));
    }

    #[test]
    fn test_layers_conflict_is_ambiguous() {
        let err = run(LayersExtractor, "6 layers, then 8 layers").unwrap_err();
        assert!(matches!(err, ParseError::AmbiguousMatch { field: Field::Layers, .. }));
    }

    #[test]
    fn test_layers_decimal_is_invalid() {
        let err = run(LayersExtractor, "2.5 layers").unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { field: Field::Layers, .. }));
    }

    #[test]
    fn test_vacuum_forms() {
        assert_eq!(value(run(VacuumExtractor, "15 Å vacuum").unwrap()), Some(15.0));
        assert_eq!(value(run(VacuumExtractor, "12.5 A vacuum").unwrap()), Some(12.5));
        assert_eq!(value(run(VacuumExtractor, "vacuum 20").unwrap()), Some(20.0));
        assert_eq!(value(run(VacuumExtractor, "vacuum of 7.5").unwrap()), Some(7.5));
        assert_eq!(value(run(VacuumExtractor, "10 angstrom vacuum").unwrap()), Some(10.0));
        assert_eq!(value(run(VacuumExtractor, "vacuum -3").unwrap()), Some(-3.0));
        assert_eq!(value(run(VacuumExtractor, "Si_111_6L_12.5A").unwrap()), Some(12.5));
    }

    #[test]
    fn test_supercell_forms() {
        assert_eq!(value(run(SupercellExtractor, "2x3").unwrap()), Some((2, 3)));
        assert_eq!(value(run(SupercellExtractor, "2 × 2").unwrap()), Some((2, 2)));
        assert_eq!(value(run(SupercellExtractor, "3X1").unwrap()), Some((3, 1)));
        assert_eq!(value(run(SupercellExtractor, "repeat 2 4").unwrap()), Some((2, 4)));
        assert_eq!(value(run(SupercellExtractor, "2x2x1").unwrap()), Some((2, 2)));
        assert_eq!(value(run(SupercellExtractor, "Si (111)").unwrap()), None);
    }

    #[test]
    fn test_claimed_span_is_skipped() {
        let text = normalize("mp-149 6 layers");
        let mut claims = Claims::default();
        claims.claim(0..6);
        // "149" belongs to the MP ID
        let found = MillerExtractor.extract(&text, &claims).unwrap();
        assert_eq!(found, Extraction::Absent);
    }
}
