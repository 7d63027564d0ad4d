//! End-to-end time advance against analytic solutions.

mod common;

use approx::assert_abs_diff_eq;
use sparsekron::pde::catalog::{continuity_1d, fokkerplanck_1d_4p3};
use sparsekron::{Options, Simulation, SkError, SolverChoice, TimeMethod};

fn implicit(solver: SolverChoice) -> Options {
    Options::default().with_time_method(TimeMethod::Implicit).with_solver(solver)
}

fn relative_error_at(level: usize, t_end: f64) -> f64 {
    let pde = continuity_1d(Some(level), Some(2)).unwrap();
    let mut sim = Simulation::serial(pde, Options::default().with_dt(1e-3)).unwrap();
    sim.run(t_end, usize::MAX).unwrap();
    sim.solution_error().unwrap().unwrap().relative
}

/// Each halving of the cell width cuts the error by about `2^degree`.
#[test]
fn explicit_transport_converges_under_refinement() {
    let errors: Vec<f64> = (4..=6).map(|level| relative_error_at(level, 0.1)).collect();
    assert!(errors[0] < 0.05, "coarse error {}", errors[0]);
    for pair in errors.windows(2) {
        let ratio = pair[0] / pair[1];
        assert!(ratio > 3.4, "ratio {ratio} ({} / {})", pair[0], pair[1]);
    }
}

/// One explicit step of the radiation damping problem does not amplify the
/// solution, on the catalog grid (level 2, degree 2, `dt = 0.5 * cfl`) and on
/// a finer one.
#[test]
fn fokkerplanck_step_is_stable() {
    for (level, degree) in [(None, None), (Some(4), Some(3))] {
        let pde = fokkerplanck_1d_4p3(level, degree).unwrap();
        let mut sim = Simulation::serial(pde, Options::default()).unwrap();
        if level.is_none() {
            assert_abs_diff_eq!(sim.dt(), 0.5 * 0.01, epsilon = 1e-15);
        }
        let before = common::norm(sim.solution());
        sim.advance().unwrap();
        let after = common::norm(sim.solution());
        assert!(after.is_finite());
        assert!(after <= 1.05 * before, "{after} > 1.05 * {before}");
        let err = sim.solution_error().unwrap().unwrap();
        assert!(err.relative < 5e-2, "relative error {}", err.relative);
    }
}

fn run_to(level: usize, degree: usize, options: Options, t_end: f64) -> (Vec<f64>, f64) {
    let pde = continuity_1d(Some(level), Some(degree)).unwrap();
    let mut sim = Simulation::serial(pde, options).unwrap();
    sim.run(t_end, usize::MAX).unwrap();
    let err = sim.solution_error().unwrap().unwrap().relative;
    (sim.solution().to_vec(), err)
}

/// Backward Euler and RK3 agree with each other and with the analytic
/// solution for a small `dt`.
#[test]
fn implicit_agrees_with_explicit() {
    let direct = implicit(SolverChoice::Direct).with_dt(1e-3);
    let (rk3, rk3_err) = run_to(4, 2, Options::default().with_dt(1e-3), 0.02);
    let (euler, euler_err) = run_to(4, 2, direct, 0.02);
    let diff = common::l2(&rk3, &euler) / common::norm(&rk3);
    assert!(diff < 1e-3, "relative difference {diff}");
    assert!(rk3_err < 2e-2, "explicit error {rk3_err}");
    assert!(euler_err < 2e-2, "implicit error {euler_err}");
}

/// Halving `dt` roughly halves the backward Euler error once the grid is
/// fine enough for the time error to dominate.
#[test]
fn implicit_error_is_first_order_in_dt() {
    let (_, coarse) = run_to(5, 3, implicit(SolverChoice::Direct).with_dt(2e-2), 0.4);
    let (_, fine) = run_to(5, 3, implicit(SolverChoice::Direct).with_dt(1e-2), 0.4);
    let ratio = coarse / fine;
    assert!(coarse < 0.1, "coarse error {coarse}");
    assert!((1.6..2.5).contains(&ratio), "ratio {ratio} ({coarse} / {fine})");
}

/// Reusing the cached factorization gives the same steps when nothing changed.
#[test]
fn cached_factorization_matches_rebuilt() {
    let pde = continuity_1d(Some(3), Some(2)).unwrap();
    let options = implicit(SolverChoice::Direct).with_dt(1e-2);
    let mut rebuilt = Simulation::serial(pde.clone(), options.clone()).unwrap();
    let mut cached = Simulation::serial(pde, options).unwrap();
    for i in 0..5 {
        rebuilt.step(true).unwrap();
        cached.step(i == 0).unwrap();
    }
    for (a, b) in rebuilt.solution().iter().zip(cached.solution()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-13);
    }
    assert_eq!(cached.implicit_system().last_stats().unwrap().iterations, 1);
}

/// GMRES on the matrix-free operator reproduces the direct solve.
#[test]
fn iterative_matches_direct() {
    let run = |solver: SolverChoice| {
        let pde = continuity_1d(Some(4), Some(3)).unwrap();
        let mut options = implicit(solver).with_dt(5e-3);
        options.solver_tolerance = 1e-13;
        let mut sim = Simulation::serial(pde, options).unwrap();
        sim.run(0.05, usize::MAX).unwrap();
        sim.solution().to_vec()
    };
    let direct = run(SolverChoice::Direct);
    let iterative = run(SolverChoice::Iterative);
    for (a, b) in direct.iter().zip(&iterative) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-9);
    }
}

/// An iteration budget too small for the tolerance is a divergence, and the
/// failed step changes nothing.
#[test]
fn gmres_budget_exhaustion_is_divergence() {
    let pde = continuity_1d(Some(4), Some(2)).unwrap();
    let mut options = implicit(SolverChoice::Iterative).with_dt(1e-2);
    options.solver_max_iterations = 1;
    options.solver_tolerance = 1e-15;
    let mut sim = Simulation::serial(pde, options).unwrap();
    let before = sim.solution().to_vec();
    let err = sim.advance().unwrap_err();
    assert!(matches!(err, SkError::SolverDivergence { iterations: 1, .. }), "{err:?}");
    assert_eq!(sim.solution(), &before[..]);
    assert_eq!(sim.steps(), 0);
    assert_eq!(sim.time(), 0.0);
    let stats = sim.implicit_system().last_stats().unwrap();
    assert!(!stats.converged);
}

/// Implicit diffusion decays at the analytic rate.
#[test]
fn implicit_heat_equation_tracks_decay() {
    let pde = common::heat_1d(4, 2);
    let mut sim = Simulation::serial(pde, implicit(SolverChoice::Direct).with_dt(1e-3)).unwrap();
    let summary = sim.run(0.1, usize::MAX).unwrap();
    assert_eq!(summary.steps, 100);
    let err = sim.solution_error().unwrap().unwrap();
    assert!(err.relative < 0.02, "relative error {}", err.relative);
}

/// A prescribed inflow value that matches the initial state keeps it steady.
#[test]
fn dirichlet_inflow_holds_steady_state() {
    for options in [Options::default(), implicit(SolverChoice::Direct).with_dt(1e-2)] {
        let mut sim = Simulation::serial(common::inflow_1d(3), options).unwrap();
        for _ in 0..20 {
            sim.advance().unwrap();
        }
        let err = sim.solution_error().unwrap().unwrap();
        assert!(err.absolute < 1e-10, "absolute error {}", err.absolute);
    }
}
