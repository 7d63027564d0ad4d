//! Operator traits shared by the solvers.

/// Matrix–vector product: y ← A x.
pub trait MatVec<V> {
    /// Compute y = A · x.
    fn matvec(&self, x: &V, y: &mut V);
}

/// Inner products & norms.
pub trait InnerProduct<V> {
    type Scalar: Copy + PartialOrd + From<f64>;
    fn dot(&self, x: &V, y: &V) -> Self::Scalar;
    /// ‖x‖₂
    fn norm(&self, x: &V) -> Self::Scalar;
}
