//! Per-dimension bases: Legendre cell basis, multiwavelet hierarchy and
//! projection of functions onto either.

pub mod legendre;
pub mod wavelet;

pub use legendre::CellBasis;
pub use wavelet::{BasisTransform, WaveletTransform};

use crate::error::{Result, SkError};
use crate::pde::Dimension;

/// L2 projection of `f` onto the cell basis of `dim` at `level`.
///
/// Fails with an assembly error if `f` is not finite at a quadrature point.
pub fn project_cells(
    basis: &CellBasis,
    dim: &Dimension,
    level: usize,
    f: impl Fn(f64) -> f64,
) -> Result<Vec<f64>> {
    let k = basis.degree;
    let n = 1usize << level;
    let h = dim.cell_width(level);
    let scale = 0.5 * h.sqrt();
    let mut out = vec![0.0; n * k];
    for c in 0..n {
        let a = dim.domain_min + c as f64 * h;
        for (q, (&w, &xi)) in basis.weights.iter().zip(&basis.points).enumerate() {
            let x = CellBasis::map(a, h, xi);
            let fx = f(x);
            if !fx.is_finite() {
                return Err(SkError::Assembly(format!(
                    "function on dimension '{}' is not finite at x = {x}",
                    dim.name
                )));
            }
            for p in 0..k {
                out[c * k + p] += scale * w * fx * basis.values[q][p];
            }
        }
    }
    Ok(out)
}

/// L2 projection of `f` onto the hierarchical basis of `dim` at `level`.
pub fn project_hierarchical(
    basis: &CellBasis,
    transform: &impl BasisTransform,
    dim: &Dimension,
    level: usize,
    f: impl Fn(f64) -> f64,
) -> Result<Vec<f64>> {
    let cells = project_cells(basis, dim, level, f)?;
    Ok(transform.to_hierarchical(level, &cells))
}

/// Offset of the 1D hierarchical block `(level, cell)`.
pub fn block_offset(level: u32, cell: u32) -> usize {
    if level == 0 { 0 } else { (1usize << (level - 1)) + cell as usize }
}

/// Number of cells (blocks) on hierarchical level `level`.
pub fn cells_on_level(level: u32) -> u32 {
    if level == 0 { 1 } else { 1 << (level - 1) }
}
