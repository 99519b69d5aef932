//! # CIF 输出
//!
//! 以 P1 对称性写出晶体结构，原子使用分数坐标。
//!
//! ## 依赖关系
//! - 被 `pipeline/artifacts.rs` 使用
//! - 使用 `models/structure.rs`

use crate::models::Crystal;

/// 转换为 CIF 格式字符串
pub fn to_cif_string(crystal: &Crystal) -> String {
    let (a, b, c, alpha, beta, gamma) = crystal.lattice.parameters();

    let mut result = String::new();
    result.push_str(&format!("data_{}\n", crystal.name.replace(char::is_whitespace, "_")));
    result.push_str("_symmetry_space_group_name_H-M    'P 1'\n");
    result.push_str("_symmetry_Int_Tables_number       1\n");
    result.push_str(&format!("_chemical_formula_sum    '{}'\n\n", crystal.formula()));

    result.push_str(&format!("_cell_length_a    {:.6}\n", a));
    result.push_str(&format!("_cell_length_b    {:.6}\n", b));
    result.push_str(&format!("_cell_length_c    {:.6}\n", c));
    result.push_str(&format!("_cell_angle_alpha {:.4}\n", alpha));
    result.push_str(&format!("_cell_angle_beta  {:.4}\n", beta));
    result.push_str(&format!("_cell_angle_gamma {:.4}\n", gamma));
    result.push_str(&format!("_cell_volume      {:.6}\n\n", crystal.lattice.volume().abs()));

    result.push_str("loop_\n");
    result.push_str(" _symmetry_equiv_pos_as_xyz\n");
    result.push_str("  'x, y, z'\n\n");

    result.push_str("loop_\n");
    result.push_str("_atom_site_label\n");
    result.push_str("_atom_site_type_symbol\n");
    result.push_str("_atom_site_fract_x\n");
    result.push_str("_atom_site_fract_y\n");
    result.push_str("_atom_site_fract_z\n");
    result.push_str("_atom_site_occupancy\n");

    for (i, atom) in crystal.atoms.iter().enumerate() {
        result.push_str(&format!(
            "{}{} {} {:.10} {:.10} {:.10} 1.0\n",
            atom.element,
            i + 1,
            atom.element,
            atom.position[0],
            atom.position[1],
            atom.position[2]
        ));
    }

    result
}
