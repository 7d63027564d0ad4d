use std::fmt;
use std::sync::Arc;

use super::{Dimension, ScalarFn};

/// What a term does along its owning dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    /// `g f`
    Mass,
    /// `∂x(g f)`, needs a flux policy.
    Grad,
    /// `∂x(g ∂x f)`
    Diffusion,
}

impl OperatorKind {
    pub fn is_flux_type(self) -> bool {
        matches!(self, OperatorKind::Grad)
    }
}

/// Interface value rule for flux-type operators.
///
/// The interface flux is `g·avg(f) + c·|g|/2·(f_L − f_R)`: the wind is the sign
/// of the coefficient `g`, `Upwind` takes the trace from the side `g` blows from
/// and `Downwind` the other one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluxPolicy {
    Upwind,
    Downwind,
    Central,
}

impl FluxPolicy {
    /// The `c` in the interface flux.
    pub fn jump_weight(self) -> f64 {
        match self {
            FluxPolicy::Upwind => 1.0,
            FluxPolicy::Downwind => -1.0,
            FluxPolicy::Central => 0.0,
        }
    }

    /// Weights of the left and right traces for a coefficient of sign `sign`.
    pub fn trace_weights(self, sign: f64) -> (f64, f64) {
        let c = self.jump_weight() * sign;
        (0.5 * (1.0 + c), 0.5 * (1.0 - c))
    }
}

/// One factor of a separable operator, acting along `dimension`.
#[derive(Clone)]
pub struct Term {
    pub name: String,
    pub kind: OperatorKind,
    pub coefficient: ScalarFn,
    pub time_dependent: bool,
    pub flux: Option<FluxPolicy>,
    /// Piecewise-constant table over the owning dimension multiplying `coefficient`.
    pub data: Vec<f64>,
    /// Index of the owning dimension.
    pub dimension: usize,
}

impl Term {
    pub fn new(
        name: impl Into<String>,
        kind: OperatorKind,
        dimension: usize,
        coefficient: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
        flux: Option<FluxPolicy>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            coefficient: Arc::new(coefficient),
            time_dependent: false,
            flux,
            data: Vec::new(),
            dimension,
        }
    }

    pub fn mass(
        name: impl Into<String>,
        dimension: usize,
        coefficient: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, OperatorKind::Mass, dimension, coefficient, None)
    }

    /// Mass term with unit coefficient, i.e. the identity in an orthonormal basis.
    pub fn identity(dimension: usize) -> Self {
        Self::mass("I", dimension, |_, _| 1.0)
    }

    pub fn grad(
        name: impl Into<String>,
        dimension: usize,
        coefficient: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
        flux: FluxPolicy,
    ) -> Self {
        Self::new(name, OperatorKind::Grad, dimension, coefficient, Some(flux))
    }

    pub fn diffusion(
        name: impl Into<String>,
        dimension: usize,
        coefficient: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, OperatorKind::Diffusion, dimension, coefficient, None)
    }

    pub fn time_dependent(mut self) -> Self {
        self.time_dependent = true;
        self
    }

    pub fn with_data(mut self, data: Vec<f64>) -> Self {
        self.data = data;
        self
    }

    /// Coefficient at `x`, including the data table multiplier.
    pub fn coefficient_at(&self, dim: &Dimension, x: f64, t: f64) -> f64 {
        let g = (self.coefficient)(x, t);
        if self.data.is_empty() {
            return g;
        }
        let n = self.data.len();
        let s = (x - dim.domain_min) / dim.length();
        let idx = ((s * n as f64).floor().max(0.0) as usize).min(n - 1);
        g * self.data[idx]
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Term")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("time_dependent", &self.time_dependent)
            .field("flux", &self.flux)
            .field("data_len", &self.data.len())
            .field("dimension", &self.dimension)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_weights_follow_the_wind() {
        assert_eq!(FluxPolicy::Upwind.trace_weights(1.0), (1.0, 0.0));
        assert_eq!(FluxPolicy::Upwind.trace_weights(-1.0), (0.0, 1.0));
        assert_eq!(FluxPolicy::Downwind.trace_weights(1.0), (0.0, 1.0));
        assert_eq!(FluxPolicy::Central.trace_weights(-1.0), (0.5, 0.5));
    }

    #[test]
    fn data_table_scales_coefficient() {
        let dim = Dimension::new("x", 0.0, 1.0, 2, 1, |_, _| 0.0);
        let term = Term::mass("m", 0, |_, _| 2.0).with_data(vec![1.0, 3.0]);
        assert_eq!(term.coefficient_at(&dim, 0.25, 0.0), 2.0);
        assert_eq!(term.coefficient_at(&dim, 0.75, 0.0), 6.0);
        assert_eq!(term.coefficient_at(&dim, 1.0, 0.0), 6.0);
    }
}
