//! # 元素符号与化学式校验
//!
//! 化学式语法：由若干元素组组成，每组为一个大写字母、可选的一个小写字母、
//! 可选的计数（正整数）。`is_formula` 还要求每个元素组是真实的元素符号；
//! `is_formula_shaped` 只检查语法，用于位置明确的 token（如紧邻 `(` 之前）。
//!
//! ## 依赖关系
//! - 被 `query/extract.rs` 使用
//! - 无外部模块依赖

/// 周期表元素符号 (Z = 1..118)
const ELEMENTS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// 是否为元素符号
pub fn is_element(symbol: &str) -> bool {
    ELEMENTS.contains(&symbol)
}

/// 化学式 token 是否合法，如 `Si`, `GaAs`, `SrTiO3`, `Al2O3`
pub fn is_formula(token: &str) -> bool {
    element_groups(token).is_some_and(|symbols| symbols.iter().all(|s| is_element(s)))
}

/// 只检查语法、不查元素表，如 `Xx2` 合法
pub fn is_formula_shaped(token: &str) -> bool {
    element_groups(token).is_some()
}

/// 按语法拆分元素组，返回各组的元素符号
fn element_groups(token: &str) -> Option<Vec<&str>> {
    let bytes = token.as_bytes();
    if bytes.is_empty() {
        return None;
    }

    let mut symbols = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_uppercase() {
            return None;
        }
        let start = i;
        i += 1;
        if i < bytes.len() && bytes[i].is_ascii_lowercase() {
            i += 1;
        }
        symbols.push(&token[start..i]);

        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i > digits_start && bytes[digits_start] == b'0' {
            return None;
        }
    }

    Some(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_formulas() {
        for f in ["Si", "GaAs", "SrTiO3", "Al2O3", "NaCl", "I", "W", "Fe2O3"] {
            assert!(is_formula(f), "{} should be a formula", f);
        }
    }

    #[test]
    fn test_invalid_formulas() {
        for f in ["", "A", "si", "Xx", "Create", "Slab", "2Si", "Si0", "GaAsq", "Qz"] {
            assert!(!is_formula(f), "{} should not be a formula", f);
        }
    }

    #[test]
    fn test_element_table() {
        assert_eq!(ELEMENTS.len(), 118);
        assert!(is_element("Og"));
        assert!(!is_element("A"));
    }

    #[test]
    fn test_formula_shape_without_element_table() {
        assert!(is_formula_shaped("Xx"));
        assert!(is_formula_shaped("Qz2O"));
        assert!(!is_formula("Xx"));
        assert!(!is_formula_shaped("xX"));
        assert!(!is_formula_shaped("Xx02"));
    }
}
