//! # 晶体结构数据模型
//!
//! 定义统一的晶体结构表示：体相结构、原子模型与表面板模型都建立在
//! `Lattice` / `Atom` / `Crystal` 之上。
//!
//! ## 依赖关系
//! - 被 `sources/`, `pipeline/`, `parsers/` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 晶格参数表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let [a_vec, b_vec, c_vec] = self.matrix;

        let a = norm(a_vec);
        let b = norm(b_vec);
        let c = norm(c_vec);

        let alpha = (dot(b_vec, c_vec) / (b * c)).acos().to_degrees();
        let beta = (dot(a_vec, c_vec) / (a * c)).acos().to_degrees();
        let gamma = (dot(a_vec, b_vec) / (a * b)).acos().to_degrees();

        (a, b, c, alpha, beta, gamma)
    }

    /// 计算晶格体积（带符号）
    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.matrix;
        dot(a, cross(b, c))
    }

    /// 倒格子矩阵（不含 2π），行向量 a*, b*, c*
    pub fn reciprocal(&self) -> Option<[[f64; 3]; 3]> {
        let vol = self.volume();
        if vol.abs() < 1e-10 {
            return None;
        }
        let [a, b, c] = self.matrix;
        Some([
            scale(cross(b, c), 1.0 / vol),
            scale(cross(c, a), 1.0 / vol),
            scale(cross(a, b), 1.0 / vol),
        ])
    }

    /// 晶面间距 d_hkl (Å)
    pub fn d_spacing(&self, hkl: [i32; 3]) -> Option<f64> {
        let rec = self.reciprocal()?;
        let g = [0, 1, 2].map(|j| {
            hkl[0] as f64 * rec[0][j] + hkl[1] as f64 * rec[1][j] + hkl[2] as f64 * rec[2][j]
        });
        let g_norm = norm(g);
        if g_norm < 1e-12 {
            None
        } else {
            Some(1.0 / g_norm)
        }
    }

    /// 分数坐标转笛卡尔坐标
    pub fn frac_to_cart(&self, frac: [f64; 3]) -> [f64; 3] {
        let m = self.matrix;
        [0, 1, 2].map(|j| frac[0] * m[0][j] + frac[1] * m[1][j] + frac[2] * m[2][j])
    }

    /// 笛卡尔坐标转分数坐标，奇异晶格返回 None
    pub fn cart_to_frac(&self, cart: [f64; 3]) -> Option<[f64; 3]> {
        let rec = self.reciprocal()?;
        // frac_i = cart · rec_i
        Some([dot(cart, rec[0]), dot(cart, rec[1]), dot(cart, rec[2])])
    }
}

/// 原子信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// 元素符号
    pub element: String,

    /// 分数坐标 [x, y, z]
    pub position: [f64; 3],
}

impl Atom {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            element: element.into(),
            position,
        }
    }
}

/// 晶体结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crystal {
    /// 结构名称
    pub name: String,

    /// 晶格
    pub lattice: Lattice,

    /// 原子列表（分数坐标）
    pub atoms: Vec<Atom>,
}

impl Crystal {
    pub fn new(name: impl Into<String>, lattice: Lattice, atoms: Vec<Atom>) -> Self {
        Crystal {
            name: name.into(),
            lattice,
            atoms,
        }
    }

    /// 计算化学式（按元素字母序）
    pub fn formula(&self) -> String {
        render_formula(&self.element_counts(), 1)
    }

    /// 约化化学式，如 Si8 -> Si, Ga4As4 -> AsGa
    pub fn reduced_formula(&self) -> String {
        let counts = self.element_counts();
        let divisor = counts.values().copied().fold(0, gcd);
        render_formula(&counts, divisor.max(1))
    }

    fn element_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for atom in &self.atoms {
            *counts.entry(atom.element.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

fn render_formula(counts: &BTreeMap<&str, usize>, divisor: usize) -> String {
    counts
        .iter()
        .map(|(el, count)| {
            let n = count / divisor;
            if n == 1 {
                el.to_string()
            } else {
                format!("{}{}", el, n)
            }
        })
        .collect::<Vec<_>>()
        .join("")
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

// ─────────────────────────────────────────────────────────────
// 向量工具
// ─────────────────────────────────────────────────────────────

pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

pub(crate) fn scale(a: [f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}
