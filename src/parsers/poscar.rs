//! # VASP POSCAR 格式
//!
//! 读取本地结构库中的 POSCAR/CONTCAR 文件，并把表面板写成 VASP 5 POSCAR。
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (VASP 5+)
//! n1 n2 ...              # number of atoms per element
//! Selective dynamics     # optional
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1               # atom positions
//! ...
//! ```
//! 本地结构库需要元素符号行，VASP 4 格式（只有原子数行）会被拒绝。
//!
//! ## 依赖关系
//! - 被 `sources/library.rs`, `pipeline/artifacts.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::StructureFileError;
use crate::models::{Atom, Crystal, Lattice};

type Result<T> = std::result::Result<T, StructureFileError>;

fn error(path: &str, reason: impl Into<String>) -> StructureFileError {
    StructureFileError {
        format: "poscar".to_string(),
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// 从字符串内容解析 POSCAR 格式
///
/// `path` 仅用于错误信息，同时作为注释行为空时的结构名。
pub fn parse_poscar_content(content: &str, path: &str) -> Result<Crystal> {
    let lines: Vec<&str> = content.lines().collect();

    if lines.len() < 8 {
        return Err(error(path, "File too short"));
    }

    // Line 0: Comment/name
    let name = match lines[0].trim() {
        "" => path.to_string(),
        comment => comment.to_string(),
    };

    // Line 1: Scaling factor; 负值表示目标体积（VASP 约定）
    let scale: f64 = lines[1]
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| error(path, "Invalid scaling factor at line 2"))?;

    // Lines 2-4: Lattice vectors
    let mut matrix = [[0.0; 3]; 3];
    for (i, row) in matrix.iter_mut().enumerate() {
        let parts: Vec<f64> = lines[2 + i]
            .split_whitespace()
            .take(3)
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(error(path, format!("Invalid lattice vector at line {}", 3 + i)));
        }
        *row = [parts[0], parts[1], parts[2]];
    }
    let factor = if scale < 0.0 {
        let volume = Lattice::from_vectors(matrix).volume().abs();
        if volume < 1e-10 {
            return Err(error(path, "Degenerate lattice"));
        }
        (-scale / volume).cbrt()
    } else {
        scale
    };
    for row in matrix.iter_mut() {
        *row = row.map(|x| x * factor);
    }
    let lattice = Lattice::from_vectors(matrix);

    // Line 5: Element symbols, Line 6: counts
    let elements: Vec<String> = lines[5].split_whitespace().map(|s| s.to_string()).collect();
    if elements.is_empty() || elements[0].parse::<i64>().is_ok() {
        return Err(error(path, "Missing element symbol line (VASP 5 format required)"));
    }
    let counts: Vec<usize> = lines[6]
        .split_whitespace()
        .map(|s| s.parse())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| error(path, "Invalid atom counts at line 7"))?;
    if counts.len() != elements.len() {
        return Err(error(
            path,
            format!("{} element symbols but {} atom counts", elements.len(), counts.len()),
        ));
    }

    // Check for "Selective dynamics" line
    let mut coord_line = 7;
    if lines[coord_line].trim().to_lowercase().starts_with('s') {
        coord_line += 1;
    }
    if lines.len() <= coord_line {
        return Err(error(path, "Missing coordinate type line"));
    }

    let coord_type = lines[coord_line].trim().to_lowercase();
    let is_cartesian = coord_type.starts_with('c') || coord_type.starts_with('k');

    // Parse atom positions
    let total: usize = counts.iter().sum();
    let mut atoms: Vec<Atom> = Vec::with_capacity(total);
    let mut position_lines = lines[coord_line + 1..].iter();

    for (elem, &count) in elements.iter().zip(counts.iter()) {
        for _ in 0..count {
            let parts: Vec<f64> = position_lines
                .next()
                .map(|line| {
                    line.split_whitespace()
                        .take(3)
                        .filter_map(|s| s.parse().ok())
                        .collect()
                })
                .unwrap_or_default();
            if parts.len() < 3 {
                return Err(error(
                    path,
                    format!("Expected {} atom positions, found {}", total, atoms.len()),
                ));
            }

            let raw = [parts[0], parts[1], parts[2]];
            let position = if is_cartesian {
                lattice
                    .cart_to_frac(raw.map(|x| x * factor))
                    .ok_or_else(|| error(path, "Degenerate lattice"))?
            } else {
                raw
            };
            atoms.push(Atom::new(elem.clone(), position));
        }
    }

    Ok(Crystal::new(name, lattice, atoms))
}

/// 将 Crystal 转换为 POSCAR 格式字符串
pub fn to_poscar_string(crystal: &Crystal) -> String {
    // 按首次出现顺序分组
    let mut elem_order: Vec<&str> = Vec::new();
    for atom in &crystal.atoms {
        if !elem_order.contains(&atom.element.as_str()) {
            elem_order.push(&atom.element);
        }
    }

    let mut result = String::new();

    result.push_str(&format!("{}\n", crystal.name));
    result.push_str("1.0\n");

    for row in &crystal.lattice.matrix {
        result.push_str(&format!(
            "  {:16.10}  {:16.10}  {:16.10}\n",
            row[0], row[1], row[2]
        ));
    }

    let counts: Vec<String> = elem_order
        .iter()
        .map(|e| crystal.atoms.iter().filter(|a| a.element == *e).count().to_string())
        .collect();
    result.push_str(&format!("   {}\n", elem_order.join("   ")));
    result.push_str(&format!("   {}\n", counts.join("   ")));

    result.push_str("Direct\n");

    for elem in &elem_order {
        for atom in crystal.atoms.iter().filter(|a| a.element == *elem) {
            let pos = atom.position;
            result.push_str(&format!(
                "  {:16.10}  {:16.10}  {:16.10}\n",
                pos[0], pos[1], pos[2]
            ));
        }
    }

    result
}
