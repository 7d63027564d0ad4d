//! Per-step diagnostics with a logger installed.

use std::f64::consts::PI;
use std::sync::Arc;

use log::LevelFilter;
use simple_logger::SimpleLogger;
use sparsekron::pde::{Boundary, ScalarFn, Separable, temporal};
use sparsekron::{
    Declaration, Dimension, FluxPolicy, Options, PdeDescriptor, Simulation, SkError, Term,
};

/// Periodic transport whose analytic solution stops being finite after `t = 0`.
fn transport_with_broken_solution() -> PdeDescriptor {
    let dim = Dimension::new("x", -1.0, 1.0, 3, 2, |x, _| (PI * x).cos())
        .with_boundaries(Boundary::periodic(), Boundary::periodic());
    let profile: ScalarFn =
        Arc::new(|x: f64, t: f64| if t > 0.0 { f64::NAN } else { (PI * x).cos() });
    let exact = Separable::new(vec![profile], temporal(|_| 1.0));
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
        Some(exact),
        |d| d.cell_width(d.level),
    )
    .unwrap()
}

#[test]
fn failing_error_diagnostic_does_not_fail_a_committed_step() {
    SimpleLogger::new().with_level(LevelFilter::Info).init().unwrap();
    assert!(log::log_enabled!(log::Level::Info));

    let mut sim = Simulation::serial(transport_with_broken_solution(), Options::default()).unwrap();
    let dt = sim.dt();
    sim.advance().unwrap();
    assert_eq!(sim.steps(), 1);
    assert_eq!(sim.time(), dt);
    assert!(sim.solution().iter().all(|v| v.is_finite()));

    // the diagnostic itself still reports the problem when asked directly
    assert!(matches!(sim.solution_error(), Err(SkError::Assembly(_))));

    let summary = sim.run(3.0 * dt, 10).unwrap();
    assert_eq!(summary.steps, 2);
    assert_eq!(sim.steps(), 3);
}
