//! Shared PDE builders for the integration tests.
#![allow(dead_code)]

use std::f64::consts::PI;

use sparsekron::pde::{Boundary, Separable, constant, spatial, temporal};
use sparsekron::{Declaration, Dimension, FluxPolicy, PdeDescriptor, Term};

/// 2D periodic transport `f_t = -f_x - f_y` on `[-1, 1]²` at the given level.
pub fn advection_2d(level: usize, degree: usize) -> PdeDescriptor {
    let dim = |name: &str| {
        Dimension::new(name, -1.0, 1.0, level, degree, |x, _| (PI * x).cos())
            .with_boundaries(Boundary::periodic(), Boundary::periodic())
    };
    PdeDescriptor::new(
        Declaration {
            num_dims: 2,
            num_terms: 2,
            num_sources: 0,
            do_poisson_solve: false,
            has_analytic_soln: false,
        },
        vec![dim("x"), dim("y")],
        vec![
            vec![Term::grad("d_dx", 0, |_, _| -1.0, FluxPolicy::Downwind), Term::identity(1)],
            vec![Term::identity(0), Term::grad("d_dy", 1, |_, _| -1.0, FluxPolicy::Downwind)],
        ],
        vec![],
        None,
        |d| d.cell_width(d.level),
    )
    .unwrap()
}

/// Periodic heat equation `f_t = f_xx` with solution `cos(πx) e^{-π² t}`.
pub fn heat_1d(level: usize, degree: usize) -> PdeDescriptor {
    let dim = Dimension::new("x", -1.0, 1.0, level, degree, |x, _| (PI * x).cos())
        .with_boundaries(Boundary::periodic(), Boundary::periodic());
    PdeDescriptor::new(
        Declaration {
            num_dims: 1,
            num_terms: 1,
            num_sources: 0,
            do_poisson_solve: false,
            has_analytic_soln: true,
        },
        vec![dim],
        vec![vec![Term::diffusion("d2_dx2", 0, |_, _| 1.0)]],
        vec![],
        Some(Separable::new(vec![spatial(|x| (PI * x).cos())], temporal(|t| (-PI * PI * t).exp()))),
        |d| d.cell_width(d.level).powi(2),
    )
    .unwrap()
}

/// Inflow problem `f_t = -f_x` on `[0, 1]` with `f(0, t) = 1` and `f(x, 0) = 1`,
/// whose exact solution stays at one.
pub fn inflow_1d(level: usize) -> PdeDescriptor {
    let one = || Separable::new(vec![constant(1.0)], temporal(|_| 1.0));
    let dim = Dimension::new("x", 0.0, 1.0, level, 2, |_, _| 1.0)
        .with_boundaries(Boundary::dirichlet().with_value(one()), Boundary::dirichlet());
    PdeDescriptor::new(
        Declaration {
            num_dims: 1,
            num_terms: 1,
            num_sources: 0,
            do_poisson_solve: false,
            has_analytic_soln: true,
        },
        vec![dim],
        vec![vec![Term::grad("d_dx", 0, |_, _| -1.0, FluxPolicy::Downwind)]],
        vec![],
        Some(one()),
        |d| d.cell_width(d.level),
    )
    .unwrap()
}

pub fn l2(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

pub fn norm(a: &[f64]) -> f64 {
    a.iter().map(|x| x * x).sum::<f64>().sqrt()
}
