//! # 输出文件命名
//!
//! 由 `ParsedQuery` 确定性地生成输出文件名：
//! ```text
//! <material>_<hkl>_<layers>L_<vacuum>A_<nx>x<ny>.cif
//! POSCAR_<material>_<hkl>_<layers>L_<vacuum>A_<nx>x<ny>
//! ```
//! - `<hkl>`: 紧凑形式，负数前置 `-`，如 `(1,1,-1)` → `11-1`；任一分量
//!   超过一位数时用 `.` 连接，如 `(1,10,1)` → `1.10.1`
//! - `<vacuum>`: 最短十进制表示，如 `15`、`12.5`
//!
//! ## 依赖关系
//! - 被 `pipeline/mod.rs`, `commands/` 使用
//! - 使用 `models/query.rs`

use crate::models::{MillerIndex, ParsedQuery};

/// CIF 与 POSCAR 文件名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactNames {
    pub stem: String,
    pub cif: String,
    pub poscar: String,
}

/// 生成输出文件名
pub fn name(query: &ParsedQuery) -> ArtifactNames {
    let stem = format!(
        "{}_{}_{}L_{}A_{}",
        sanitize(query.material.as_str()),
        compact_hkl(query.miller),
        query.layers,
        query.vacuum,
        query.supercell
    );

    ArtifactNames {
        cif: format!("{}.cif", stem),
        poscar: format!("POSCAR_{}", stem),
        stem,
    }
}

/// Miller 指数紧凑形式
pub fn compact_hkl(miller: MillerIndex) -> String {
    let parts = miller.as_array().map(|i| i.to_string());
    if miller.as_array().iter().all(|i| i.abs() < 10) {
        parts.concat()
    } else {
        parts.join(".")
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MaterialRef, Supercell};
    use crate::query::parse_query;
    use std::collections::HashSet;

    fn query(material: MaterialRef, miller: MillerIndex, layers: u32, vacuum: f64, sc: Supercell) -> ParsedQuery {
        ParsedQuery {
            material,
            miller,
            layers,
            vacuum,
            supercell: sc,
        }
    }

    #[test]
    fn test_name_format() {
        let names = name(&parse_query("Si (111) 6 layers 15 Å vacuum 2x2").unwrap());
        assert_eq!(names.cif, "Si_111_6L_15A_2x2.cif");
        assert_eq!(names.poscar, "POSCAR_Si_111_6L_15A_2x2");
    }

    #[test]
    fn test_name_mp_id_and_fractional_vacuum() {
        let names = name(&parse_query("mp-149 (100) 8 layers 12.5 A vacuum").unwrap());
        assert_eq!(names.stem, "mp-149_100_8L_12.5A_1x1");
    }

    #[test]
    fn test_negative_components() {
        assert_eq!(compact_hkl(MillerIndex(1, 1, -1)), "11-1");
        assert_eq!(compact_hkl(MillerIndex(-1, 0, 2)), "-102");
        assert_eq!(compact_hkl(MillerIndex(1, 10, 1)), "1.10.1");
        assert_eq!(compact_hkl(MillerIndex(11, 0, 1)), "11.0.1");
    }

    #[test]
    fn test_names_are_injective_over_corpus() {
        let formula = |s: &str| MaterialRef::Formula(s.to_string());
        let mut queries = Vec::new();
        for material in [formula("Si"), formula("GaAs"), MaterialRef::MpId("mp-149".to_string())] {
            for miller in [
                MillerIndex(1, 1, 1),
                MillerIndex(1, 1, -1),
                MillerIndex(1, 0, 0),
                MillerIndex(1, 11, 1),
                MillerIndex(11, 1, 1),
            ] {
                for layers in [1, 6, 12] {
                    for vacuum in [0.0, 1.5, 15.0, 15.5] {
                        for sc in [Supercell(1, 1), Supercell(2, 1), Supercell(1, 2), Supercell(12, 1)] {
                            queries.push(query(material.clone(), miller, layers, vacuum, sc));
                        }
                    }
                }
            }
        }

        let names: HashSet<String> = queries.iter().map(|q| name(q).stem).collect();
        assert_eq!(names.len(), queries.len());
    }

    #[test]
    fn test_canonical_name_reparses_to_same_query() {
        for text in [
            "Si (111) 6 layers 15 Å vacuum 2x2",
            "mp-149 (100) 8 layers 12.5 A vacuum",
            "GaAs (110) 1 layer 0 A vacuum 3x1",
            "SrTiO3 (001)",
        ] {
            let parsed = parse_query(text).unwrap();
            let reparsed = parse_query(&name(&parsed).stem).unwrap();
            assert_eq!(reparsed, parsed, "{}", text);
        }
    }
}
