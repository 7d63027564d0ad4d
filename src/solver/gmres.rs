//! Restarted GMRES (Saad §6.4), matrix-free.
//!
//! The operator only needs [`MatVec`]; in the implicit step that product is
//! the distributed Kronecker apply, so every Arnoldi step costs one exchange.
//! Arnoldi uses modified Gram-Schmidt with a second orthogonalization pass,
//! Givens rotations for the least-squares update and back substitution with
//! zero-pivot protection.

use crate::core::traits::{InnerProduct, MatVec};
use crate::error::SkError;
use crate::solver::LinearSolver;
use crate::utils::convergence::{Convergence, SolveStats};
use num_traits::Float;

pub struct GmresSolver<T> {
    /// Number of Arnoldi vectors before restart
    pub restart: usize,
    pub conv: Convergence<T>,
}

impl<T: Float> GmresSolver<T> {
    pub fn new(restart: usize, tol: T, max_iters: usize) -> Self {
        Self { restart: restart.max(1), conv: Convergence { tol, max_iters } }
    }

    /// One Arnoldi step; returns true on happy breakdown.
    fn arnoldi<M>(a: &M, v_basis: &mut Vec<Vec<T>>, h: &mut [Vec<T>], j: usize, epsilon: T) -> bool
    where
        M: MatVec<Vec<T>>,
        (): InnerProduct<Vec<T>, Scalar = T>,
    {
        let ip = ();
        let mut w = vec![T::zero(); v_basis[0].len()];
        a.matvec(&v_basis[j], &mut w);
        for pass in 0..2 {
            for i in 0..=j {
                let hij = ip.dot(&w, &v_basis[i]);
                h[i][j] = if pass == 0 { hij } else { h[i][j] + hij };
                for (wk, vik) in w.iter_mut().zip(&v_basis[i]) {
                    *wk = *wk - hij * *vik;
                }
            }
        }
        h[j + 1][j] = ip.norm(&w);
        if h[j + 1][j].abs() < epsilon {
            return true;
        }
        let inv = T::one() / h[j + 1][j];
        v_basis.push(w.into_iter().map(|wi| wi * inv).collect());
        false
    }

    fn apply_givens(h: &mut [Vec<T>], g: &mut [T], cs: &mut [T], sn: &mut [T], j: usize, epsilon: T) {
        for i in 0..j {
            let temp = cs[i] * h[i][j] + sn[i] * h[i + 1][j];
            h[i + 1][j] = -sn[i] * h[i][j] + cs[i] * h[i + 1][j];
            h[i][j] = temp;
        }
        let (h_kk, h_k1k) = (h[j][j], h[j + 1][j]);
        let r = (h_kk * h_kk + h_k1k * h_k1k).sqrt();
        if r.abs() < epsilon {
            cs[j] = T::one();
            sn[j] = T::zero();
        } else {
            cs[j] = h_kk / r;
            sn[j] = h_k1k / r;
        }
        h[j][j] = cs[j] * h_kk + sn[j] * h_k1k;
        h[j + 1][j] = T::zero();
        let temp = cs[j] * g[j] + sn[j] * g[j + 1];
        g[j + 1] = -sn[j] * g[j] + cs[j] * g[j + 1];
        g[j] = temp;
    }

    fn back_substitution(h: &[Vec<T>], g: &[T], m: usize, epsilon: T) -> Vec<T> {
        let mut y = vec![T::zero(); m];
        for i in (0..m).rev() {
            let mut s = g[i];
            for j in (i + 1)..m {
                s = s - h[i][j] * y[j];
            }
            y[i] = if h[i][i].abs() > epsilon { s / h[i][i] } else { T::zero() };
        }
        y
    }

    fn residual<M: MatVec<Vec<T>>>(a: &M, b: &[T], x: &[T]) -> Vec<T> {
        let mut ax = vec![T::zero(); b.len()];
        a.matvec(&x.to_vec(), &mut ax);
        ax.iter().zip(b).map(|(&axi, &bi)| bi - axi).collect()
    }
}

impl<M, T> LinearSolver<M, Vec<T>> for GmresSolver<T>
where
    M: MatVec<Vec<T>>,
    (): InnerProduct<Vec<T>, Scalar = T>,
    T: Float + From<f64>,
{
    type Error = SkError;
    type Scalar = T;

    /// Returns the stats whether or not the tolerance was reached; callers
    /// decide what non-convergence means.
    fn solve(&mut self, a: &M, b: &Vec<T>, x: &mut Vec<T>) -> Result<SolveStats<T>, SkError> {
        let ip = ();
        let n = b.len();
        x.resize(n, T::zero());
        let epsilon = <T as From<f64>>::from(1e-14);
        let res0 = ip.norm(b);
        if res0 == T::zero() {
            x.iter_mut().for_each(|v| *v = T::zero());
            return Ok(SolveStats { iterations: 0, final_residual: T::zero(), converged: true });
        }
        let mut r = Self::residual(a, b, x);
        let mut beta = ip.norm(&r);
        let mut stats = SolveStats { iterations: 0, final_residual: beta, converged: false };
        if self.conv.check(beta, res0, 0).1.converged {
            stats.converged = true;
            return Ok(stats);
        }

        let mut iteration = 0;
        while iteration < self.conv.max_iters {
            let mut v_basis: Vec<Vec<T>> = Vec::with_capacity(self.restart + 1);
            v_basis.push(r.iter().map(|&ri| ri / beta).collect());
            let mut h = vec![vec![T::zero(); self.restart]; self.restart + 1];
            let mut g = vec![T::zero(); self.restart + 1];
            g[0] = beta;
            let mut cs = vec![T::zero(); self.restart];
            let mut sn = vec![T::zero(); self.restart];
            let mut m = 0;
            for j in 0..self.restart {
                iteration += 1;
                let breakdown = Self::arnoldi(a, &mut v_basis, &mut h, j, epsilon);
                Self::apply_givens(&mut h, &mut g, &mut cs, &mut sn, j, epsilon);
                m = j + 1;
                let (stop, _) = self.conv.check(g[j + 1].abs(), res0, iteration);
                if stop || breakdown {
                    break;
                }
            }
            let y = Self::back_substitution(&h, &g, m, epsilon);
            for (j, yj) in y.iter().enumerate() {
                for (xi, vi) in x.iter_mut().zip(&v_basis[j]) {
                    *xi = *xi + *yj * *vi;
                }
            }
            // true residual, not the Givens estimate
            r = Self::residual(a, b, x);
            beta = ip.norm(&r);
            let (stop, s) = self.conv.check(beta, res0, iteration);
            stats = s;
            if stop || beta < epsilon {
                stats.converged = stats.converged || beta < epsilon;
                break;
            }
        }
        Ok(stats)
    }
}
