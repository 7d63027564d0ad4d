//! Ready-made PDE instances.
//!
//! Each constructor takes optional level/degree overrides for its dimensions
//! and returns a validated [`PdeDescriptor`].

use std::f64::consts::PI;
use std::sync::Arc;

use super::{
    Boundary, Declaration, Dimension, ExactSolution, FluxPolicy, PdeDescriptor, ScalarFn,
    Separable, Source, Term, spatial, temporal,
};
use crate::error::Result;

/// `dt = dx` at the dimension's level.
fn dx_timestep(dim: &Dimension) -> f64 {
    dim.cell_width(dim.level)
}

fn apply_overrides(dim: Dimension, level: Option<usize>, degree: Option<usize>) -> Dimension {
    let dim = match level {
        Some(level) => dim.with_level(level),
        None => dim,
    };
    match degree {
        Some(degree) => dim.with_degree(degree),
        None => dim,
    }
}

// Radiation damping (problem 4.3): df/dt = -d/dz( z(1-z^2) f ).
// The characteristics are z(t) = phi(z0, t); the solution carries the initial
// profile along them with the Jacobian of the map.

fn fp_phi(z: f64, t: f64) -> f64 {
    z * (-t).exp() / (1.0 - ((-2.0 * t).exp() - 1.0) * z * z).sqrt()
}

fn fp_f0(z: f64) -> f64 {
    const SIG: f64 = 0.1;
    const SHIFT: f64 = 0.36;
    (-(z - SHIFT).powi(2) / (SIG * SIG)).exp() + (-(z + SHIFT).powi(2) / (SIG * SIG)).exp()
}

/// Analytic solution of the radiation damping problem.
pub fn fokkerplanck_4p3_solution(z: f64, t: f64) -> f64 {
    let p = fp_phi(z, t);
    (1.0 - p * p) / (1.0 - z * z) * fp_f0(p)
}

/// One-dimensional Fokker–Planck radiation damping term on `[-1, 1]`.
///
/// The advection term is written as `∂z(g f)` with `g = -z(1 - z²)`, so the
/// transport velocity is `-g` and the term declares [`FluxPolicy::Downwind`].
pub fn fokkerplanck_1d_4p3(level: Option<usize>, degree: Option<usize>) -> Result<PdeDescriptor> {
    let dim = Dimension::new("x", -1.0, 1.0, 2, 2, |z, _| fokkerplanck_4p3_solution(z, 0.0))
        .with_boundaries(Boundary::dirichlet(), Boundary::dirichlet());
    let dim = apply_overrides(dim, level, degree);

    let term = Term::grad("d_dx", 0, |z, _| -z * (1.0 - z * z), FluxPolicy::Downwind);

    let solution: ScalarFn = Arc::new(fokkerplanck_4p3_solution);
    let exact = ExactSolution::new(vec![solution], temporal(|_| 1.0));

    PdeDescriptor::new(
        Declaration {
            num_dims: 1,
            num_terms: 1,
            num_sources: 0,
            do_poisson_solve: false,
            has_analytic_soln: true,
        },
        vec![dim],
        vec![vec![term]],
        vec![],
        Some(exact),
        dx_timestep,
    )
}

/// Periodic advection `df/dt = -df/dx + s` on `[-1, 1]` with manufactured sources.
///
/// The analytic solution is `cos(πx) cos(t)`.
pub fn continuity_1d(level: Option<usize>, degree: Option<usize>) -> Result<PdeDescriptor> {
    let dim = Dimension::new("x", -1.0, 1.0, 2, 2, |x, _| (PI * x).cos())
        .with_boundaries(Boundary::periodic(), Boundary::periodic());
    let dim = apply_overrides(dim, level, degree);

    let term = Term::grad("d_dx", 0, |_, _| -1.0, FluxPolicy::Downwind);

    let sources: Vec<Source> = vec![
        Separable::new(vec![spatial(|x| (PI * x).cos())], temporal(|t| -t.sin())),
        Separable::new(vec![spatial(|x| (PI * x).sin())], temporal(|t| -PI * t.cos())),
    ];
    let exact = ExactSolution::new(vec![spatial(|x| (PI * x).cos())], temporal(f64::cos));

    PdeDescriptor::new(
        Declaration {
            num_dims: 1,
            num_terms: 1,
            num_sources: 2,
            do_poisson_solve: false,
            has_analytic_soln: true,
        },
        vec![dim],
        vec![vec![term]],
        sources,
        Some(exact),
        dx_timestep,
    )
}
