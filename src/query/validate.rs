//! # 默认值填充与校验
//!
//! 将五个字段的提取结果组装为 `ParsedQuery`：
//! - Material / Miller 缺失 → `MissingRequiredField`
//! - 越界值（如 `0 layers`、负真空层、`(0 0 0)`）→ `InvalidValue`
//! - 其余缺失字段使用默认值：6 层、15 Å 真空、1x1 超胞
//!
//! ## 依赖关系
//! - 被 `query/mod.rs` 使用
//! - 使用 `query/extract.rs` 的 `Extraction`

use super::extract::{Extraction, Match};
use crate::error::{Field, ParseError};
use crate::models::query::{DEFAULT_LAYERS, DEFAULT_SUPERCELL, DEFAULT_VACUUM};
use crate::models::{MaterialRef, MillerIndex, ParsedQuery, Supercell};

/// 组装并校验查询参数，无副作用
pub fn build(
    material: Extraction<MaterialRef>,
    miller: Extraction<MillerIndex>,
    layers: Extraction<i64>,
    vacuum: Extraction<f64>,
    supercell: Extraction<(i64, i64)>,
) -> Result<ParsedQuery, ParseError> {
    let material = match material {
        Extraction::Found(m) => m.value,
        Extraction::Absent => {
            return Err(ParseError::MissingRequiredField {
                field: Field::Material,
                hint: "include a chemical formula such as Si or SrTiO3, or an MP ID such as mp-149",
            })
        }
    };

    let miller = match miller {
        Extraction::Found(m) if m.value.is_zero() => {
            return Err(invalid(Field::Miller, &m, "indices cannot all be zero"))
        }
        Extraction::Found(m) => m.value,
        Extraction::Absent => {
            return Err(ParseError::MissingRequiredField {
                field: Field::Miller,
                hint: "include a Miller index such as (1 1 1) or (1,1,-1)",
            })
        }
    };

    let layers = match layers {
        Extraction::Found(m) => {
            if m.value < 1 {
                return Err(invalid(Field::Layers, &m, "must be at least 1"));
            }
            u32::try_from(m.value).map_err(|_| invalid(Field::Layers, &m, "too many layers"))?
        }
        Extraction::Absent => DEFAULT_LAYERS,
    };

    let vacuum = match vacuum {
        Extraction::Found(m) => {
            if !m.value.is_finite() || m.value < 0.0 {
                return Err(invalid(Field::Vacuum, &m, "must be a non-negative length"));
            }
            m.value
        }
        Extraction::Absent => DEFAULT_VACUUM,
    };

    let supercell = match supercell {
        Extraction::Found(m) => {
            let (nx, ny) = m.value;
            if nx < 1 || ny < 1 {
                return Err(invalid(Field::Supercell, &m, "factors must be at least 1"));
            }
            let nx = u32::try_from(nx).map_err(|_| invalid(Field::Supercell, &m, "too large"))?;
            let ny = u32::try_from(ny).map_err(|_| invalid(Field::Supercell, &m, "too large"))?;
            Supercell(nx, ny)
        }
        Extraction::Absent => DEFAULT_SUPERCELL,
    };

    Ok(ParsedQuery {
        material,
        miller,
        layers,
        vacuum,
        supercell,
    })
}

fn invalid<T>(field: Field, m: &Match<T>, reason: &str) -> ParseError {
    ParseError::InvalidValue {
        field,
        token: m.token.clone(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found<T>(value: T, token: &str) -> Extraction<T> {
        Extraction::Found(Match {
            value,
            span: 0..token.len(),
            token: token.to_string(),
        })
    }

    fn si() -> Extraction<MaterialRef> {
        found(MaterialRef::Formula("Si".to_string()), "Si")
    }

    fn m111() -> Extraction<MillerIndex> {
        found(MillerIndex(1, 1, 1), "(111)")
    }

    #[test]
    fn test_defaults_applied() {
        let q = build(si(), m111(), Extraction::Absent, Extraction::Absent, Extraction::Absent)
            .unwrap();
        assert_eq!(q.layers, 6);
        assert_eq!(q.vacuum, 15.0);
        assert_eq!(q.supercell, Supercell(1, 1));
    }

    #[test]
    fn test_minimums_accepted() {
        let q = build(
            si(),
            m111(),
            found(1, "1 layer"),
            found(0.0, "vacuum 0"),
            found((1, 1), "1x1"),
        )
        .unwrap();
        assert_eq!(q.layers, 1);
        assert_eq!(q.vacuum, 0.0);
        assert_eq!(q.supercell, Supercell(1, 1));
    }

    #[test]
    fn test_zero_layers_rejected() {
        let err = build(si(), m111(), found(0, "0 layers"), Extraction::Absent, Extraction::Absent)
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidValue {
                field: Field::Layers,
                token: "0 layers".to_string(),
                reason: "must be at least 1".to_string(),
            }
        );
    }

    #[test]
    fn test_negative_vacuum_rejected() {
        let err = build(si(), m111(), Extraction::Absent, found(-2.0, "vacuum -2"), Extraction::Absent)
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { field: Field::Vacuum, .. }));
    }

    #[test]
    fn test_zero_supercell_rejected() {
        let err = build(si(), m111(), Extraction::Absent, Extraction::Absent, found((0, 2), "0x2"))
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { field: Field::Supercell, .. }));
    }

    #[test]
    fn test_zero_miller_rejected() {
        let err = build(
            si(),
            found(MillerIndex(0, 0, 0), "(000)"),
            Extraction::Absent,
            Extraction::Absent,
            Extraction::Absent,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { field: Field::Miller, .. }));
    }

    #[test]
    fn test_missing_required_fields() {
        let err = build(Extraction::Absent, m111(), Extraction::Absent, Extraction::Absent, Extraction::Absent)
            .unwrap_err();
        assert_eq!(err.field(), Field::Material);

        let err = build(si(), Extraction::Absent, Extraction::Absent, Extraction::Absent, Extraction::Absent)
            .unwrap_err();
        assert!(matches!(
            err,
            ParseError::MissingRequiredField { field: Field::Miller, .. }
        ));
    }
}
