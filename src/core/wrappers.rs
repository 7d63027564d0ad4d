//! Trait implementations for `faer` matrices and plain vectors.
//!
//! Inner products are sequential: every worker runs the same
//! Krylov iteration on the replicated vector and must reach bit-identical
//! scalars.

use crate::core::traits::{InnerProduct, MatVec};
use faer::Mat;
use num_traits::Float;

impl<T: Float> MatVec<Vec<T>> for Mat<T> {
    fn matvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        assert_eq!(self.nrows(), y.len(), "Output vector y has incorrect length");
        assert_eq!(self.ncols(), x.len(), "Input vector x has incorrect length");
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = (0..self.ncols()).fold(T::zero(), |acc, j| acc + self[(i, j)] * x[j]);
        }
    }
}

impl<T: Float + From<f64>> InnerProduct<Vec<T>> for () {
    type Scalar = T;

    fn dot(&self, x: &Vec<T>, y: &Vec<T>) -> T {
        assert_eq!(x.len(), y.len(), "Vectors must have the same length");
        x.iter().zip(y).fold(T::zero(), |acc, (&a, &b)| acc + a * b)
    }

    fn norm(&self, x: &Vec<T>) -> T {
        self.dot(x, x).sqrt()
    }
}
