//! # 表面板构建
//!
//! 由笛卡尔原子模型、Miller 指数、层数与真空层厚度构建表面板：
//! 1. 由 Miller 指数构造整数表面基矢（扩展欧几里得算法，行列式为 ±1）
//! 2. 将原子坐标换算到新基矢下并折回晶胞
//! 3. 沿第三轴堆叠 `layers` 个单元
//! 4. 第三轴正交化到表面法向，并旋转到标准取向（a 沿 x，c 沿 z）
//! 5. 沿 z 添加真空层并居中：c = layers × d_hkl + vacuum
//! 6. 面内超胞复制
//!
//! 表面板原子数（体相原子数 × 层数 × 超胞）上限为 `MAX_SLAB_ATOMS`，
//! 超出时返回 `GeometryError`。
//!
//! ## 依赖关系
//! - 被 `pipeline/mod.rs` 使用
//! - 使用 `models/structure.rs` 的晶格与向量工具

use crate::error::PipelineError;
use crate::models::structure::{cross, dot, norm, scale};
use crate::models::{Atom, AtomModel, Crystal, Lattice, MillerIndex, SlabModel, SlabSpec};
use std::fmt;
use std::str::FromStr;

const TOL: f64 = 1e-10;

/// 表面板原子数上限
pub const MAX_SLAB_ATOMS: usize = 1_000_000;

/// 表面板构建器
pub trait SlabBuilder: Send + Sync {
    fn build_surface(&self, model: &AtomModel, spec: &SlabSpec) -> Result<SlabModel, PipelineError>;
}

// ─────────────────────────────────────────────────────────────
// 厚度
// ─────────────────────────────────────────────────────────────

/// `--thickness` 指定的厚度：埃，或 d_hkl 的倍数（如 `1.5d`）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Thickness {
    Angstrom(f64),
    Spacings(f64),
}

impl Thickness {
    /// 换算为层数：max(1, ceil(thickness / d_hkl))
    pub fn layers(&self, d_hkl: f64) -> u32 {
        let n = match *self {
            Thickness::Angstrom(t) => (t / d_hkl - 1e-9).ceil(),
            Thickness::Spacings(factor) => (factor - 1e-9).ceil(),
        };
        n.clamp(1.0, u32::MAX as f64) as u32
    }
}

impl FromStr for Thickness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let (number, spacings) = match s.strip_suffix('d') {
            Some(rest) => (rest.trim(), true),
            None => (s.trim_end_matches(['a', 'Å', 'å', '\u{212B}']).trim(), false),
        };

        let value: f64 = number.parse().map_err(|_| {
            format!(
                "could not parse thickness '{}'; use Å (e.g. 7.5) or '<factor>d' (e.g. 1.5d)",
                s
            )
        })?;
        if !value.is_finite() || value <= 0.0 {
            return Err(format!("thickness must be positive, got '{}'", s));
        }

        Ok(if spacings {
            Thickness::Spacings(value)
        } else {
            Thickness::Angstrom(value)
        })
    }
}

impl fmt::Display for Thickness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Thickness::Angstrom(t) => write!(f, "{} Å", t),
            Thickness::Spacings(factor) => write!(f, "{} d_hkl", factor),
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 整数表面基矢
// ─────────────────────────────────────────────────────────────

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// 向下取整的整数除法
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

/// 扩展欧几里得：返回 (x, y) 使 a·x + b·y = gcd(a, b)
fn ext_gcd(a: i64, b: i64) -> (i64, i64) {
    if b == 0 {
        (1, 0)
    } else if a % b == 0 {
        (0, 1)
    } else {
        let q = floor_div(a, b);
        let (x, y) = ext_gcd(b, a - q * b);
        (y, x - y * q)
    }
}

/// Miller 指数除以公约数，如 (2 2 2) → (1 1 1)
pub fn reduce_miller(miller: MillerIndex) -> MillerIndex {
    let [h, k, l] = miller.as_array().map(i64::from);
    let g = gcd(gcd(h, k), l).max(1);
    MillerIndex((h / g) as i32, (k / g) as i32, (l / g) as i32)
}

/// 表面基矢（以体相晶格向量为单位的整数矩阵，行向量 c1, c2, c3）
///
/// c1、c2 位于 (hkl) 面内，c3 为堆叠方向。`lattice` 用于在等价的面内基中
/// 选取夹角最接近 90° 的一组。
pub fn surface_basis(lattice: &Lattice, miller: MillerIndex) -> Result<[[i64; 3]; 3], PipelineError> {
    let [h, k, l] = miller.as_array().map(i64::from);
    let zeros = [h, k, l].iter().filter(|&&i| i == 0).count();

    match zeros {
        3 => {
            return Err(PipelineError::GeometryError(
                "Miller indices cannot all be zero".to_string(),
            ))
        }
        2 if h != 0 => return Ok([[0, 1, 0], [0, 0, 1], [1, 0, 0]]),
        2 if k != 0 => return Ok([[0, 0, 1], [1, 0, 0], [0, 1, 0]]),
        2 => return Ok([[1, 0, 0], [0, 1, 0], [0, 0, 1]]),
        _ => {}
    }

    let (mut p, mut q) = ext_gcd(k, l);
    let [a1, a2, a3] = lattice.matrix;
    let (hf, kf, lf) = (h as f64, k as f64, l as f64);

    let lin = |x: f64, u: [f64; 3], y: f64, v: [f64; 3]| -> [f64; 3] {
        [0, 1, 2].map(|i| x * u[i] + y * v[i])
    };
    let ka1_ha2 = lin(kf, a1, -hf, a2);
    let la1_ha3 = lin(lf, a1, -hf, a3);
    let la2_ka3 = lin(lf, a2, -kf, a3);

    // c1·c2 = k1 + i·k2，取使之最小的 i
    let k1 = dot(lin(p as f64, ka1_ha2, q as f64, la1_ha3), la2_ka3);
    let k2 = dot(lin(lf, ka1_ha2, -kf, la1_ha3), la2_ka3);
    if k2.abs() > TOL {
        let i = -(k1 / k2).round_ties_even() as i64;
        p += i * l;
        q -= i * k;
    }

    let (a, b) = ext_gcd(p * k + q * l, h);
    let g = gcd(l, k);
    Ok([
        [p * k + q * l, -p * h, -q * h],
        [0, l / g, -k / g],
        [b, a * p, a * q],
    ])
}

// ─────────────────────────────────────────────────────────────
// 构建器
// ─────────────────────────────────────────────────────────────

/// 默认构建器
#[derive(Debug, Default, Clone, Copy)]
pub struct SurfaceBuilder;

impl SurfaceBuilder {
    fn geometry_error(msg: impl Into<String>) -> PipelineError {
        PipelineError::GeometryError(msg.into())
    }
}

impl SlabBuilder for SurfaceBuilder {
    fn build_surface(&self, model: &AtomModel, spec: &SlabSpec) -> Result<SlabModel, PipelineError> {
        if model.is_empty() {
            return Err(Self::geometry_error("atom model has no atoms"));
        }
        if spec.layers == 0 {
            return Err(Self::geometry_error("layer count must be at least 1"));
        }
        if spec.supercell.0 == 0 || spec.supercell.1 == 0 {
            return Err(Self::geometry_error("supercell factors must be at least 1"));
        }
        let total = slab_atom_count(model.len(), spec).ok_or_else(|| {
            Self::geometry_error(format!(
                "slab too large: {} atoms x {} layers x {} supercell exceeds {} atoms",
                model.len(),
                spec.layers,
                spec.supercell,
                MAX_SLAB_ATOMS
            ))
        })?;

        let miller = reduce_miller(spec.miller);
        if miller != spec.miller {
            tracing::debug!(from = %spec.miller, to = %miller, "reduced Miller index");
        }

        // 1. 表面基矢与新晶胞
        let basis = surface_basis(&model.cell, miller)?;
        let basis_f = basis.map(|row| row.map(|x| x as f64));
        let cell = multiply(basis_f, model.cell.matrix);

        // 2. 原子换算到新基矢：s = f · B⁻¹
        let basis_lattice = Lattice::from_vectors(basis_f);
        let mut frac = Vec::with_capacity(model.len());
        for position in &model.positions {
            let f = model
                .cell
                .cart_to_frac(*position)
                .ok_or_else(|| Self::geometry_error("degenerate bulk cell"))?;
            let s = basis_lattice
                .cart_to_frac(f)
                .ok_or_else(|| Self::geometry_error("degenerate surface basis"))?;
            frac.push(s.map(|x| x - (x + TOL).floor()));
        }

        // 3. 堆叠
        let layers = spec.layers as usize;
        let (nx, ny) = (spec.supercell.0 as usize, spec.supercell.1 as usize);
        let mut symbols = Vec::with_capacity(total / (nx * ny));
        let mut stacked = Vec::with_capacity(total / (nx * ny));
        for n in 0..layers {
            for (symbol, s) in model.symbols.iter().zip(&frac) {
                symbols.push(symbol.clone());
                stacked.push([s[0], s[1], (s[2] + n as f64) / layers as f64]);
            }
        }
        let [c1, c2, c3] = cell;
        let c3 = scale(c3, layers as f64);
        let stacked_cell = Lattice::from_vectors([c1, c2, c3]);

        // 4. 第三轴正交化（保持笛卡尔坐标），再旋转到标准取向（保持分数坐标）
        let normal = cross(c1, c2);
        let area2 = dot(normal, normal);
        if area2 < TOL {
            return Err(Self::geometry_error("surface basis vectors are collinear"));
        }
        let c3_orth = scale(normal, dot(c3, normal) / area2);
        let orth_cell = Lattice::from_vectors([c1, c2, c3_orth]);

        let mut positions = Vec::with_capacity(stacked.len());
        for s in &stacked {
            let s = orth_cell
                .cart_to_frac(stacked_cell.frac_to_cart(*s))
                .ok_or_else(|| Self::geometry_error("degenerate slab cell"))?;
            positions.push([wrap(s[0]), wrap(s[1]), s[2]]);
        }

        let a = norm(c1);
        let bx = dot(c1, c2) / a;
        let by = (dot(c2, c2) - bx * bx).max(0.0).sqrt();
        let height = norm(c3_orth);

        // 5. 真空层与居中
        let c = height + spec.vacuum;
        let zs: Vec<f64> = positions.iter().map(|s| s[2] * height).collect();
        let z_min = zs.iter().copied().fold(f64::INFINITY, f64::min);
        let z_max = zs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let shift = (c - (z_max - z_min)) / 2.0 - z_min;
        for (s, z) in positions.iter_mut().zip(&zs) {
            s[2] = (z + shift) / c;
        }

        // 6. 面内超胞
        let mut atoms = Vec::with_capacity(total);
        for i in 0..nx {
            for j in 0..ny {
                for (symbol, s) in symbols.iter().zip(&positions) {
                    atoms.push(Atom::new(
                        symbol.clone(),
                        [(s[0] + i as f64) / nx as f64, (s[1] + j as f64) / ny as f64, s[2]],
                    ));
                }
            }
        }

        let lattice = Lattice::from_vectors([
            [a * nx as f64, 0.0, 0.0],
            [bx * ny as f64, by * ny as f64, 0.0],
            [0.0, 0.0, c],
        ]);

        let mut crystal = Crystal::new(String::new(), lattice, atoms);
        crystal.name = format!("{} {} slab", crystal.reduced_formula(), spec.miller);

        tracing::debug!(
            atoms = crystal.atoms.len(),
            height,
            c,
            "slab built"
        );

        Ok(SlabModel {
            spec: *spec,
            crystal,
        })
    }
}

/// 折回 [0, 1)
fn wrap(x: f64) -> f64 {
    let w = x - x.floor();
    if w >= 1.0 - TOL {
        0.0
    } else {
        w
    }
}

/// 行向量矩阵乘法 A · B
fn multiply(a: [[f64; 3]; 3], b: [[f64; 3]; 3]) -> [[f64; 3]; 3] {
    a.map(|row| [0, 1, 2].map(|j| row[0] * b[0][j] + row[1] * b[1][j] + row[2] * b[2][j]))
}

/// 表面板原子数；溢出或超过上限时为 `None`
fn slab_atom_count(bulk_atoms: usize, spec: &SlabSpec) -> Option<usize> {
    bulk_atoms
        .checked_mul(spec.layers as usize)?
        .checked_mul(spec.supercell.0 as usize)?
        .checked_mul(spec.supercell.1 as usize)
        .filter(|&n| n <= MAX_SLAB_ATOMS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Supercell;
    use crate::sources::testing::silicon;

    fn si_model() -> AtomModel {
        let bulk = silicon();
        let lattice = bulk.crystal.lattice.clone();
        AtomModel {
            symbols: bulk.crystal.atoms.iter().map(|a| a.element.clone()).collect(),
            positions: bulk
                .crystal
                .atoms
                .iter()
                .map(|a| lattice.frac_to_cart(a.position))
                .collect(),
            cell: lattice,
        }
    }

    fn spec(miller: MillerIndex, layers: u32, vacuum: f64, supercell: Supercell) -> SlabSpec {
        SlabSpec {
            miller,
            layers,
            vacuum,
            supercell,
        }
    }

    fn det(m: [[i64; 3]; 3]) -> i64 {
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    #[test]
    fn test_ext_gcd() {
        for (a, b) in [(1, 1), (3, 5), (-4, 6), (12, -8), (7, 0), (0, 3)] {
            let (x, y) = ext_gcd(a, b);
            assert_eq!((a * x + b * y).abs(), gcd(a, b), "ext_gcd({}, {})", a, b);
        }
    }

    #[test]
    fn test_surface_basis_is_unimodular_and_in_plane() {
        let lattice = si_model().cell;
        for miller in [
            MillerIndex(1, 0, 0),
            MillerIndex(0, 1, 0),
            MillerIndex(1, 1, 0),
            MillerIndex(1, 1, 1),
            MillerIndex(1, 1, -1),
            MillerIndex(2, 1, 3),
            MillerIndex(0, 1, -2),
        ] {
            let basis = surface_basis(&lattice, miller).unwrap();
            assert_eq!(det(basis).abs(), 1, "{}", miller);

            let [h, k, l] = miller.as_array().map(i64::from);
            for row in &basis[..2] {
                assert_eq!(row[0] * h + row[1] * k + row[2] * l, 0, "{}", miller);
            }
        }
    }

    #[test]
    fn test_surface_basis_rejects_zero() {
        let lattice = si_model().cell;
        assert!(surface_basis(&lattice, MillerIndex(0, 0, 0)).is_err());
    }

    #[test]
    fn test_reduce_miller() {
        assert_eq!(reduce_miller(MillerIndex(2, 2, 2)), MillerIndex(1, 1, 1));
        assert_eq!(reduce_miller(MillerIndex(0, 0, -3)), MillerIndex(0, 0, -1));
        assert_eq!(reduce_miller(MillerIndex(1, 2, 0)), MillerIndex(1, 2, 0));
    }

    #[test]
    fn test_si_100_slab() {
        let slab = SurfaceBuilder
            .build_surface(&si_model(), &spec(MillerIndex(1, 0, 0), 2, 10.0, Supercell(1, 1)))
            .unwrap();
        let (a, b, c, alpha, beta, gamma) = slab.crystal.lattice.parameters();

        assert_eq!(slab.crystal.atoms.len(), 16);
        assert!((a - 5.43).abs() < 1e-9);
        assert!((b - 5.43).abs() < 1e-9);
        assert!((c - (2.0 * 5.43 + 10.0)).abs() < 1e-9);
        assert!((alpha - 90.0).abs() < 1e-6);
        assert!((beta - 90.0).abs() < 1e-6);
        assert!((gamma - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_si_111_slab_is_centred_with_normal_c_axis() {
        let slab = SurfaceBuilder
            .build_surface(&si_model(), &spec(MillerIndex(1, 1, 1), 3, 15.0, Supercell(1, 1)))
            .unwrap();
        let m = slab.crystal.lattice.matrix;
        let d111 = 5.43 / 3f64.sqrt();

        assert_eq!(slab.crystal.atoms.len(), 24);
        assert_eq!(m[2][0], 0.0);
        assert_eq!(m[2][1], 0.0);
        assert!((m[2][2] - (3.0 * d111 + 15.0)).abs() < 1e-6);

        let zs: Vec<f64> = slab.crystal.atoms.iter().map(|a| a.position[2]).collect();
        let lo = zs.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = zs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!((lo + hi - 1.0).abs() < 1e-9);
        assert!(slab.crystal.atoms.iter().all(|a| (0.0..1.0).contains(&a.position[0])));
    }

    #[test]
    fn test_supercell_repeats_in_plane() {
        let base = SurfaceBuilder
            .build_surface(&si_model(), &spec(MillerIndex(1, 1, 0), 2, 12.0, Supercell(1, 1)))
            .unwrap();
        let big = SurfaceBuilder
            .build_surface(&si_model(), &spec(MillerIndex(1, 1, 0), 2, 12.0, Supercell(2, 3)))
            .unwrap();

        assert_eq!(big.crystal.atoms.len(), base.crystal.atoms.len() * 6);
        let (a0, b0, c0, _, _, _) = base.crystal.lattice.parameters();
        let (a1, b1, c1, _, _, _) = big.crystal.lattice.parameters();
        assert!((a1 - 2.0 * a0).abs() < 1e-9);
        assert!((b1 - 3.0 * b0).abs() < 1e-9);
        assert!((c1 - c0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_vacuum_keeps_periodic_height() {
        let slab = SurfaceBuilder
            .build_surface(&si_model(), &spec(MillerIndex(0, 0, 1), 1, 0.0, Supercell(1, 1)))
            .unwrap();
        let (_, _, c, _, _, _) = slab.crystal.lattice.parameters();
        assert!((c - 5.43).abs() < 1e-9);
    }

    #[test]
    fn test_oversized_slab_is_rejected() {
        let query = crate::query::parse_query("Si (100) 1 layer 4294967295x4294967295").unwrap();
        let huge = spec(query.miller, query.layers, query.vacuum, query.supercell);
        let err = SurfaceBuilder.build_surface(&si_model(), &huge).unwrap_err();
        match err {
            PipelineError::GeometryError(msg) => assert!(msg.contains("slab too large")),
            other => panic!("unexpected error: {:?}", other),
        }

        let too_many_layers = spec(MillerIndex(1, 0, 0), u32::MAX, 15.0, Supercell(1, 1));
        assert!(SurfaceBuilder.build_surface(&si_model(), &too_many_layers).is_err());
    }

    #[test]
    fn test_slab_atom_count_limit() {
        let at_limit = spec(MillerIndex(1, 0, 0), 125, 15.0, Supercell(1000, 1));
        assert_eq!(slab_atom_count(8, &at_limit), Some(MAX_SLAB_ATOMS));
        let over = spec(MillerIndex(1, 0, 0), 126, 15.0, Supercell(1000, 1));
        assert_eq!(slab_atom_count(8, &over), None);
    }

    #[test]
    fn test_thickness_parse_and_layers() {
        assert_eq!("7.5".parse::<Thickness>(), Ok(Thickness::Angstrom(7.5)));
        assert_eq!("12 A".parse::<Thickness>(), Ok(Thickness::Angstrom(12.0)));
        assert_eq!("12 Å".parse::<Thickness>(), Ok(Thickness::Angstrom(12.0)));
        assert_eq!("1.5d".parse::<Thickness>(), Ok(Thickness::Spacings(1.5)));
        assert!("abc".parse::<Thickness>().is_err());
        assert!("-1".parse::<Thickness>().is_err());
        assert!("0d".parse::<Thickness>().is_err());

        let d = 3.135;
        assert_eq!(Thickness::Angstrom(7.5).layers(d), 3);
        assert_eq!(Thickness::Angstrom(2.0 * d).layers(d), 2);
        assert_eq!(Thickness::Spacings(1.5).layers(d), 2);
        assert_eq!(Thickness::Spacings(2.0).layers(d), 2);
        assert_eq!(Thickness::Spacings(0.2).layers(d), 1);
    }
}
