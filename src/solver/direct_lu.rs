//! Dense direct solve with a reusable full-pivot LU factorization (faer).

use crate::error::SkError;
use crate::solver::LinearSolver;
use crate::utils::convergence::SolveStats;
use faer::linalg::solvers::{FullPivLu, SolveCore};
use faer::traits::{ComplexField, RealField};
use faer::{Conj, Mat, MatMut};
use num_traits::Float;

/// LU solver that keeps its last factorization for reuse.
pub struct LuSolver<T> {
    factor: Option<FullPivLu<T>>,
    n: usize,
}

impl<T: ComplexField + RealField + Float> LuSolver<T> {
    pub fn new() -> Self {
        LuSolver { factor: None, n: 0 }
    }

    /// Factor `a`, replacing any cached factorization.
    pub fn factor(&mut self, a: &Mat<T>) -> Result<(), SkError> {
        if a.nrows() != a.ncols() {
            return Err(SkError::FactorError(format!(
                "matrix is {}x{}, expected square",
                a.nrows(),
                a.ncols()
            )));
        }
        self.factor = Some(FullPivLu::new(a.as_ref()));
        self.n = a.nrows();
        Ok(())
    }

    /// Dimension of the cached factorization, if any.
    pub fn factored_size(&self) -> Option<usize> {
        self.factor.as_ref().map(|_| self.n)
    }

    /// Solve with the cached factorization.
    pub fn solve_cached(&self, b: &[T], x: &mut [T]) -> Result<(), SkError> {
        let factor = self
            .factor
            .as_ref()
            .ok_or_else(|| SkError::FactorError("no factorization has been computed".into()))?;
        if b.len() != self.n || x.len() != self.n {
            return Err(SkError::FactorError(format!(
                "right-hand side has length {}, factorization is {}x{}",
                b.len(),
                self.n,
                self.n
            )));
        }
        x.clone_from_slice(b);
        let x_mat = MatMut::from_column_major_slice_mut(x, self.n, 1);
        factor.solve_in_place_with_conj(Conj::No, x_mat);
        if x.iter().any(|v| !v.is_finite()) {
            return Err(SkError::FactorError("system matrix is singular".into()));
        }
        Ok(())
    }
}

impl<T: ComplexField + RealField + Float + From<f64>> LinearSolver<Mat<T>, Vec<T>> for LuSolver<T> {
    type Error = SkError;
    type Scalar = T;

    /// Factor and solve; always one "iteration".
    fn solve(&mut self, a: &Mat<T>, b: &Vec<T>, x: &mut Vec<T>) -> Result<SolveStats<T>, SkError> {
        self.factor(a)?;
        x.resize(b.len(), T::zero());
        self.solve_cached(b, x)?;
        Ok(SolveStats { iterations: 1, final_residual: T::zero(), converged: true })
    }
}

impl<T: ComplexField + RealField + Float> Default for LuSolver<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> Mat<f64> {
        Mat::from_fn(3, 3, |i, j| match (i, j) {
            (0, 0) => 2.0,
            (0, 1) => 1.0,
            (0, 2) => 1.0,
            (1, 0) => 1.0,
            (1, 1) => 3.0,
            (1, 2) => 2.0,
            (2, 0) => 1.0,
            _ => 0.0,
        })
    }

    #[test]
    fn lu_solver_solves_dense_system() {
        // true solution: [6, 15, -23]
        let b = vec![4.0, 5.0, 6.0];
        let mut x = vec![0.0; 3];
        let mut solver = LuSolver::<f64>::new();
        let stats = solver.solve(&system(), &b, &mut x).unwrap();
        for (xi, ei) in x.iter().zip([6.0, 15.0, -23.0]) {
            assert!((xi - ei).abs() < 1e-10, "xi = {xi}, expected = {ei}");
        }
        assert!(stats.converged);
    }

    #[test]
    fn cached_factorization_is_reused() {
        let mut solver = LuSolver::<f64>::new();
        assert!(solver.solve_cached(&[1.0; 3], &mut [0.0; 3]).is_err());
        solver.factor(&system()).unwrap();
        assert_eq!(solver.factored_size(), Some(3));
        let mut x = [0.0; 3];
        solver.solve_cached(&[4.0, 5.0, 6.0], &mut x).unwrap();
        assert!((x[2] + 23.0).abs() < 1e-10);
        assert!(solver.solve_cached(&[1.0; 2], &mut [0.0; 2]).is_err());
    }
}
