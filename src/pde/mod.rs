//! Declarative PDE description.
//!
//! A PDE is described by its dimensions, a term set (one group of per-dimension
//! terms for each separable operator in the right-hand side), additive sources,
//! an optional analytic solution and a stable-timestep rule. Everything here is
//! built once, validated at construction and then only borrowed by the engine.

use std::sync::Arc;

pub mod catalog;
pub mod descriptor;
pub mod dimension;
pub mod term;

pub use descriptor::{Declaration, PdeDescriptor, TermSet};
pub use dimension::{Boundary, BoundaryKind, Dimension};
pub use term::{FluxPolicy, OperatorKind, Term};

/// Function of position and time, `f(x, t)`.
pub type ScalarFn = Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>;
/// Function of time.
pub type TimeFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;
/// Stable timestep for a dimension (before CFL scaling).
pub type DtFn = Arc<dyn Fn(&Dimension) -> f64 + Send + Sync>;

/// A separable function `Π_d s_d(x_d) · T(t)`.
///
/// Used for sources, analytic solutions and prescribed boundary values. The
/// spatial factors take the time as a second argument; sources and boundary
/// values are projected once with `t = 0` and carry their time dependence in
/// `time`, while analytic solutions are evaluated at the requested time.
#[derive(Clone)]
pub struct Separable {
    /// One spatial factor per dimension.
    pub spatial: Vec<ScalarFn>,
    pub time: TimeFn,
}

/// Additive right-hand-side contribution independent of the unknown.
pub type Source = Separable;
/// Analytic solution, when the problem has one.
pub type ExactSolution = Separable;
/// Prescribed value on one edge of a dimension.
pub type BoundaryValue = Separable;

impl Separable {
    pub fn new(spatial: Vec<ScalarFn>, time: TimeFn) -> Self {
        Self { spatial, time }
    }

    pub fn num_dims(&self) -> usize {
        self.spatial.len()
    }
}

impl std::fmt::Debug for Separable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Separable")
            .field("num_dims", &self.spatial.len())
            .finish_non_exhaustive()
    }
}

/// Wrap a time-independent closure as a spatial factor.
pub fn spatial(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> ScalarFn {
    Arc::new(move |x, _| f(x))
}

/// Wrap a closure as a [`TimeFn`].
pub fn temporal(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> TimeFn {
    Arc::new(f)
}

/// Constant coefficient `g(x, t) = value`.
pub fn constant(value: f64) -> ScalarFn {
    Arc::new(move |_, _| value)
}
