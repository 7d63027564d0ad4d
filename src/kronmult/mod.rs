//! Matrix-free application of `Σ_t ⊗_d A_{t,d}` to an element vector.
//!
//! For a row element `r` and a column element `c`, the coupling block of
//! term group `t` is the Kronecker product of the `degree × degree` blocks
//! `A_{t,d}[block(r_d), block(c_d)]`. It is applied to the column's
//! coefficients by one small matrix product per dimension (a mode product
//! over the `degree^dims` tensor), never forming the product matrix.

use std::ops::Range;

use faer::{Mat, MatRef};

use crate::adapt::ElementSet;
use crate::coefficients::CoefficientCache;
use crate::error::{Result, SkError};

/// Scratch buffers per row element: input copy, ping-pong and accumulator.
const BUFFERS_PER_ROW: usize = 3;

/// Bytes of scratch needed to apply the operator to `rows` elements.
pub fn workspace_required(rows: usize, element_size: usize) -> usize {
    rows.saturating_mul(BUFFERS_PER_ROW)
        .saturating_mul(element_size)
        .saturating_mul(std::mem::size_of::<f64>())
}

pub fn check_workspace(required: usize, available: usize) -> Result<()> {
    if required > available {
        return Err(SkError::ResourceExhaustion { required, available });
    }
    Ok(())
}

/// `out = M ⊙_d t`: contract mode `d` of a `k^n` tensor (dimension 0 slowest).
fn mode_product(m: MatRef<'_, f64>, t: &[f64], out: &mut [f64], k: usize, n: usize, d: usize) {
    let post = k.pow((n - 1 - d) as u32);
    let pre = t.len() / (k * post);
    for a in 0..pre {
        for i in 0..k {
            for b in 0..post {
                let mut s = 0.0;
                for j in 0..k {
                    s += m[(i, j)] * t[(a * k + j) * post + b];
                }
                out[(a * k + i) * post + b] = s;
            }
        }
    }
}

/// Apply `⊗_d blocks[d]` to `x`, accumulating into `y`.
pub fn kron_apply(blocks: &[MatRef<'_, f64>], x: &[f64], y: &mut [f64], scratch: &mut [Vec<f64>; 2]) {
    let k = blocks.first().map_or(1, |b| b.nrows());
    let n = blocks.len();
    let [cur, next] = scratch;
    cur.clear();
    cur.extend_from_slice(x);
    next.resize(x.len(), 0.0);
    for (d, block) in blocks.iter().enumerate() {
        mode_product(*block, cur, next, k, n, d);
        std::mem::swap(cur, next);
    }
    y.iter_mut().zip(cur.iter()).for_each(|(a, b)| *a += b);
}

fn is_zero(block: MatRef<'_, f64>) -> bool {
    (0..block.nrows()).all(|i| (0..block.ncols()).all(|j| block[(i, j)] == 0.0))
}

/// The assembled operator over an element set.
///
/// Construction checks that the scratch needed for the owned rows fits the
/// workspace budget, so applying it cannot fail.
pub struct KronOperator<'a> {
    cache: &'a CoefficientCache,
    elements: &'a ElementSet,
    degree: usize,
    element_size: usize,
    rows: Range<usize>,
}

impl<'a> KronOperator<'a> {
    pub fn new(
        cache: &'a CoefficientCache,
        elements: &'a ElementSet,
        rows: Range<usize>,
        workspace_bytes: usize,
    ) -> Result<Self> {
        let degree = cache.basis().degree;
        let element_size = degree.pow(elements.num_dims() as u32);
        let levels = elements.max_levels();
        if levels.iter().zip(cache.levels()).any(|(have, built)| have > built) {
            return Err(SkError::Assembly(format!(
                "operators built at levels {:?} cannot serve elements up to {levels:?}",
                cache.levels()
            )));
        }
        check_workspace(workspace_required(rows.len(), element_size), workspace_bytes)?;
        Ok(Self { cache, elements, degree, element_size, rows })
    }

    pub fn rows(&self) -> Range<usize> {
        self.rows.clone()
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    fn block(&self, group: usize, dim: usize, row: usize, col: usize) -> MatRef<'_, f64> {
        let k = self.degree;
        self.cache.matrix(group, dim).as_ref().submatrix(row * k, col * k, k, k)
    }

    /// Coupling blocks of one (row, column) pair for term group `t`, or
    /// `None` when one of the factors vanishes.
    fn coupling(&self, t: usize, r: usize, c: usize) -> Option<Vec<MatRef<'_, f64>>> {
        let re = &self.elements.as_slice()[r];
        let ce = &self.elements.as_slice()[c];
        let mut blocks = Vec::with_capacity(re.num_dims());
        for d in 0..re.num_dims() {
            let b = self.block(t, d, re.block(d), ce.block(d));
            if is_zero(b) {
                return None;
            }
            blocks.push(b);
        }
        Some(blocks)
    }

    fn apply_row(&self, r: usize, x: &[f64], y: &mut [f64], scratch: &mut [Vec<f64>; 2]) {
        let k = self.element_size;
        for t in 0..self.cache.num_groups() {
            for c in 0..self.elements.len() {
                if let Some(blocks) = self.coupling(t, r, c) {
                    kron_apply(&blocks, &x[c * k..(c + 1) * k], y, scratch);
                }
            }
        }
    }

    /// Owned rows of `A x`.
    pub fn apply_local(&self, x: &[f64]) -> Vec<f64> {
        let k = self.element_size;
        assert_eq!(x.len(), self.elements.len() * k, "vector does not match the element set");
        let mut y = vec![0.0; self.rows.len() * k];
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            y.par_chunks_mut(k).enumerate().for_each_init(
                || [Vec::with_capacity(k), Vec::with_capacity(k)],
                |scratch, (i, yr)| self.apply_row(self.rows.start + i, x, yr, scratch),
            );
        }
        #[cfg(not(feature = "rayon"))]
        {
            let mut scratch = [Vec::with_capacity(k), Vec::with_capacity(k)];
            for (i, yr) in y.chunks_mut(k).enumerate() {
                self.apply_row(self.rows.start + i, x, yr, &mut scratch);
            }
        }
        y
    }

    /// Owned rows of the explicit operator matrix, row-major.
    pub fn dense_rows(&self) -> Vec<f64> {
        let k = self.element_size;
        let dof = self.elements.len() * k;
        let mut out = vec![0.0; self.rows.len() * k * dof];
        let mut unit = vec![0.0; k];
        let mut col = vec![0.0; k];
        let mut scratch = [Vec::with_capacity(k), Vec::with_capacity(k)];
        for (i, r) in self.rows.clone().enumerate() {
            for t in 0..self.cache.num_groups() {
                for c in 0..self.elements.len() {
                    let Some(blocks) = self.coupling(t, r, c) else { continue };
                    for j in 0..k {
                        unit[j] = 1.0;
                        col.iter_mut().for_each(|v| *v = 0.0);
                        kron_apply(&blocks, &unit, &mut col, &mut scratch);
                        unit[j] = 0.0;
                        for (p, v) in col.iter().enumerate() {
                            out[(i * k + p) * dof + c * k + j] += v;
                        }
                    }
                }
            }
        }
        out
    }
}

/// Dense `Mat` from row-major storage.
pub fn mat_from_rows(rows: &[f64], nrows: usize, ncols: usize) -> Mat<f64> {
    Mat::from_fn(nrows, ncols, |i, j| rows[i * ncols + j])
}
