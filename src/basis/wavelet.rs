//! Orthonormal multiwavelet transform between cell and hierarchical bases.
//!
//! The cell basis at level `L` holds `2^L` blocks of `degree` Legendre
//! coefficients, one per uniform cell. The hierarchical basis holds the same
//! number of blocks: block 0 carries the scaling functions on the whole
//! domain, and level `l ≥ 1` contributes `2^(l-1)` wavelet blocks starting at
//! offset `2^(l-1)`. Both bases are orthonormal, so the transform is an
//! orthogonal matrix and operators move between bases as `W A Wᵀ`.
//!
//! The two-scale filters are computed on the reference interval: `h0`/`h1`
//! expand the parent scaling functions in the left/right child bases, and
//! `g0`/`g1` complete them to an orthonormal basis of the child space.

use faer::Mat;

use super::legendre::{gauss, legendre};

/// Conversion between the cell (nodal) basis and the hierarchical basis.
pub trait BasisTransform {
    /// Basis functions per cell.
    fn degree(&self) -> usize;

    /// Cell coefficients at `level` to hierarchical coefficients.
    fn to_hierarchical(&self, level: usize, cells: &[f64]) -> Vec<f64>;

    /// Hierarchical coefficients at `level` to cell coefficients.
    fn to_cells(&self, level: usize, hierarchical: &[f64]) -> Vec<f64>;

    /// Re-express a cell-basis operator in the hierarchical basis, `W A Wᵀ`.
    fn operator_to_hierarchical(&self, level: usize, op: &Mat<f64>) -> Mat<f64> {
        let n = op.nrows();
        let mut wa = Mat::<f64>::zeros(n, n);
        for j in 0..n {
            let col: Vec<f64> = (0..n).map(|i| op[(i, j)]).collect();
            for (i, v) in self.to_hierarchical(level, &col).into_iter().enumerate() {
                wa[(i, j)] = v;
            }
        }
        let mut out = Mat::<f64>::zeros(n, n);
        for i in 0..n {
            let row: Vec<f64> = (0..n).map(|j| wa[(i, j)]).collect();
            for (j, v) in self.to_hierarchical(level, &row).into_iter().enumerate() {
                out[(i, j)] = v;
            }
        }
        out
    }
}

/// Multiwavelet filters for a given degree.
#[derive(Debug, Clone)]
pub struct WaveletTransform {
    degree: usize,
    h0: Mat<f64>,
    h1: Mat<f64>,
    g0: Mat<f64>,
    g1: Mat<f64>,
}

impl WaveletTransform {
    pub fn new(degree: usize) -> Self {
        assert!(degree > 0, "degree must be positive");
        let k = degree;
        let (weights, points) = gauss(k + 2);
        let norm = |p: usize| ((2 * p + 1) as f64).sqrt();

        // h0[i][j] = ∫_{-1}^{0} φ_i φ^L_j, h1[i][j] = ∫_{0}^{1} φ_i φ^R_j, with the
        // child integrals pulled back to [-1, 1].
        let mut h0 = Mat::<f64>::zeros(k, k);
        let mut h1 = Mat::<f64>::zeros(k, k);
        for (&w, &xi) in weights.iter().zip(&points) {
            let (child, _) = legendre(k, xi);
            let (parent_l, _) = legendre(k, 0.5 * (xi - 1.0));
            let (parent_r, _) = legendre(k, 0.5 * (xi + 1.0));
            for i in 0..k {
                let pi = norm(i) / 2f64.sqrt();
                for j in 0..k {
                    let cj = norm(j) * child[j];
                    h0[(i, j)] += 0.5 * w * pi * parent_l[i] * cj;
                    h1[(i, j)] += 0.5 * w * pi * parent_r[i] * cj;
                }
            }
        }

        // Orthonormal complement of the scaling rows in R^{2k}.
        let mut accepted: Vec<Vec<f64>> = (0..k)
            .map(|i| (0..k).map(|j| h0[(i, j)]).chain((0..k).map(|j| h1[(i, j)])).collect())
            .collect();
        let mut wavelets: Vec<Vec<f64>> = Vec::with_capacity(k);
        for e in 0..2 * k {
            if wavelets.len() == k {
                break;
            }
            let mut v = vec![0.0; 2 * k];
            v[e] = 1.0;
            // two Gram-Schmidt passes
            for _ in 0..2 {
                for b in &accepted {
                    let proj: f64 = v.iter().zip(b).map(|(x, y)| x * y).sum();
                    v.iter_mut().zip(b).for_each(|(x, y)| *x -= proj * y);
                }
            }
            let nrm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
            if nrm > 1e-6 {
                v.iter_mut().for_each(|x| *x /= nrm);
                accepted.push(v.clone());
                wavelets.push(v);
            }
        }
        assert_eq!(wavelets.len(), k, "Internal error: incomplete wavelet basis");
        let g0 = Mat::from_fn(k, k, |i, j| wavelets[i][j]);
        let g1 = Mat::from_fn(k, k, |i, j| wavelets[i][k + j]);

        Self { degree, h0, h1, g0, g1 }
    }

    /// Dense transform matrix at `level` (rows: hierarchical, cols: cells).
    pub fn matrix(&self, level: usize) -> Mat<f64> {
        let n = self.degree << level;
        let mut w = Mat::<f64>::zeros(n, n);
        let mut e = vec![0.0; n];
        for j in 0..n {
            e[j] = 1.0;
            for (i, v) in self.to_hierarchical(level, &e).into_iter().enumerate() {
                w[(i, j)] = v;
            }
            e[j] = 0.0;
        }
        w
    }
}

impl BasisTransform for WaveletTransform {
    fn degree(&self) -> usize {
        self.degree
    }

    fn to_hierarchical(&self, level: usize, cells: &[f64]) -> Vec<f64> {
        let k = self.degree;
        assert_eq!(cells.len(), k << level, "cell vector has the wrong length for level {level}");
        let mut out = vec![0.0; cells.len()];
        let mut s = cells.to_vec();
        for lev in (1..=level).rev() {
            let parents = 1usize << (lev - 1);
            let mut coarse = vec![0.0; parents * k];
            for p in 0..parents {
                let left = &s[2 * p * k..(2 * p + 1) * k];
                let right = &s[(2 * p + 1) * k..(2 * p + 2) * k];
                for i in 0..k {
                    let mut sc = 0.0;
                    let mut dt = 0.0;
                    for j in 0..k {
                        sc += self.h0[(i, j)] * left[j] + self.h1[(i, j)] * right[j];
                        dt += self.g0[(i, j)] * left[j] + self.g1[(i, j)] * right[j];
                    }
                    coarse[p * k + i] = sc;
                    out[(parents + p) * k + i] = dt;
                }
            }
            s = coarse;
        }
        out[..k].copy_from_slice(&s);
        out
    }

    fn to_cells(&self, level: usize, hierarchical: &[f64]) -> Vec<f64> {
        let k = self.degree;
        assert_eq!(
            hierarchical.len(),
            k << level,
            "hierarchical vector has the wrong length for level {level}"
        );
        let mut s = hierarchical[..k].to_vec();
        for lev in 1..=level {
            let parents = 1usize << (lev - 1);
            let mut fine = vec![0.0; 2 * parents * k];
            for p in 0..parents {
                let sp = &s[p * k..(p + 1) * k];
                let d = &hierarchical[(parents + p) * k..(parents + p + 1) * k];
                for j in 0..k {
                    let mut l = 0.0;
                    let mut r = 0.0;
                    for i in 0..k {
                        l += self.h0[(i, j)] * sp[i] + self.g0[(i, j)] * d[i];
                        r += self.h1[(i, j)] * sp[i] + self.g1[(i, j)] * d[i];
                    }
                    fine[2 * p * k + j] = l;
                    fine[(2 * p + 1) * k + j] = r;
                }
            }
            s = fine;
        }
        s
    }
}
